//! Value coercion to the declared type of the target column.

use rust_decimal::Decimal;

use crate::core::schema::ColumnDescriptor;
use crate::core::value::{Batch, Row, SqlValue};
use crate::reconcile::normalize_type;

/// Coerce every row of `batch` to `columns`, which lists the target column
/// of each value position.
pub fn coerce_batch(batch: Batch, columns: &[ColumnDescriptor]) -> Result<Batch, String> {
    let types: Vec<String> = columns.iter().map(|c| normalize_type(&c.data_type)).collect();

    let rows = batch
        .rows
        .into_iter()
        .map(|row| {
            if row.len() != columns.len() {
                return Err(format!(
                    "source row has {} values for {} target columns",
                    row.len(),
                    columns.len()
                ));
            }
            row.into_iter()
                .zip(columns.iter().zip(&types))
                .map(|(value, (column, ty))| {
                    coerce_value(value, ty).map_err(|e| format!("column {}: {}", column.name, e))
                })
                .collect::<Result<Row, String>>()
        })
        .collect::<Result<Vec<Row>, String>>()?;

    Ok(Batch::new(rows))
}

/// Convert `value` for a column whose normalized type is `target`.
///
/// Only the widenings accepted by [`crate::reconcile::type_accepts`] change
/// the value: integer to a wider integer or numeric, and float4 to float8.
/// Anything else already has the target's representation and passes through.
pub fn coerce_value(value: SqlValue, target: &str) -> Result<SqlValue, String> {
    let coerced = match (target, value) {
        (_, SqlValue::Null) => SqlValue::Null,

        (_, SqlValue::Raw { type_name, bytes }) => {
            if normalize_type(&type_name) != target {
                return Err(format!("cannot convert {} value to {}", type_name, target));
            }
            SqlValue::Raw { type_name, bytes }
        }

        ("int4", SqlValue::I16(i)) => SqlValue::I32(i32::from(i)),
        ("int8", SqlValue::I16(i)) => SqlValue::I64(i64::from(i)),
        ("int8", SqlValue::I32(i)) => SqlValue::I64(i64::from(i)),

        ("numeric", SqlValue::I16(i)) => SqlValue::Decimal(Decimal::from(i)),
        ("numeric", SqlValue::I32(i)) => SqlValue::Decimal(Decimal::from(i)),
        ("numeric", SqlValue::I64(i)) => SqlValue::Decimal(Decimal::from(i)),

        ("float8", SqlValue::F32(f)) => SqlValue::F64(f64::from(f)),

        (_, other) => other,
    };
    Ok(coerced)
}
