//! PostgreSQL target writer implementation.
//!
//! Chunks are loaded with binary `COPY ... FROM STDIN`, one transaction per
//! chunk, so a committed chunk is never rolled back by a later failure.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, Timelike};
use futures::SinkExt;
use rust_decimal::Decimal;
use tracing::debug;

use super::connection::PgDatabase;
use crate::core::schema::{ColumnDescriptor, DdlStatement, TableRef};
use crate::core::traits::{Dialect, TargetWriter};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

const PGCOPY_SIGNATURE: &[u8] = b"PGCOPY\n\xff\r\n\0";

/// 2000-01-01 00:00:00 UTC as Unix microseconds.
const PG_EPOCH_MICROS: i64 = 946_684_800_000_000;

/// 2000-01-01 as days from 0001-01-01 (CE).
const PG_EPOCH_DAYS_FROM_CE: i32 = 730_120;

const JSONB_VERSION: u8 = 1;

#[async_trait]
impl TargetWriter for PgDatabase {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn apply_ddl(&self, stmt: &DdlStatement) -> Result<()> {
        let sql = self.dialect.render_ddl(stmt);
        debug!("Executing DDL on {}: {}", self.endpoint(), sql);
        let client = self.acquire("applying DDL").await?;
        client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn write_chunk(
        &self,
        table: &TableRef,
        columns: &[ColumnDescriptor],
        batch: Batch,
    ) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let row_count = batch.len() as u64;
        let data = encode_copy_data(columns, &batch.rows)
            .map_err(|msg| MigrateError::transfer(table.to_string(), 0, msg))?;
        let copy_sql = self.dialect.copy_in(table, columns);

        let mut client = self.acquire("writing chunk").await?;
        let tx = client.transaction().await?;
        let sink = tx.copy_in(copy_sql.as_str()).await?;
        futures::pin_mut!(sink);
        sink.send(data).await?;
        let written = sink.as_mut().finish().await?;
        tx.commit().await?;

        debug!("Committed {} rows into {}", written, table);
        Ok(row_count)
    }
}

/// Full binary COPY payload: header, tuples and trailer.
fn encode_copy_data(
    columns: &[ColumnDescriptor],
    rows: &[Row],
) -> std::result::Result<Bytes, String> {
    let field_count = i16::try_from(columns.len())
        .map_err(|_| format!("{} columns exceed the COPY field limit", columns.len()))?;

    let mut buf = BytesMut::with_capacity(rows.len() * 64 + 32);
    buf.put_slice(PGCOPY_SIGNATURE);
    buf.put_i32(0); // flags
    buf.put_i32(0); // header extension length

    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(format!(
                "row {} has {} values but {} columns are being written",
                row_idx,
                row.len(),
                columns.len()
            ));
        }
        buf.put_i16(field_count);
        for (value, column) in row.iter().zip(columns) {
            encode_value(&mut buf, value, &column.data_type)
                .map_err(|e| format!("column {}: {}", column.name, e))?;
        }
    }

    buf.put_i16(-1);
    Ok(buf.freeze())
}

/// Append one length-prefixed field in binary format for a column of
/// `target_type`.
fn encode_value(
    buf: &mut BytesMut,
    value: &SqlValue,
    target_type: &str,
) -> std::result::Result<(), String> {
    match value {
        SqlValue::Null => buf.put_i32(-1),
        SqlValue::Bool(b) => {
            buf.put_i32(1);
            buf.put_u8(u8::from(*b));
        }
        SqlValue::I16(i) => {
            buf.put_i32(2);
            buf.put_i16(*i);
        }
        SqlValue::I32(i) => {
            buf.put_i32(4);
            buf.put_i32(*i);
        }
        SqlValue::I64(i) => {
            buf.put_i32(8);
            buf.put_i64(*i);
        }
        SqlValue::F32(f) => {
            buf.put_i32(4);
            buf.put_f32(*f);
        }
        SqlValue::F64(f) => {
            buf.put_i32(8);
            buf.put_f64(*f);
        }
        SqlValue::Text(s) => put_text(buf, s, target_type)?,
        SqlValue::Json(v) => put_text(buf, &v.to_string(), target_type)?,
        SqlValue::Bytes(b) => put_bytes(buf, b)?,
        SqlValue::Uuid(u) => {
            buf.put_i32(16);
            buf.put_slice(u.as_bytes());
        }
        SqlValue::Decimal(d) => encode_numeric(buf, d),
        SqlValue::Timestamp(ts) => {
            buf.put_i32(8);
            buf.put_i64(ts.and_utc().timestamp_micros() - PG_EPOCH_MICROS);
        }
        SqlValue::TimestampTz(ts) => {
            buf.put_i32(8);
            buf.put_i64(ts.timestamp_micros() - PG_EPOCH_MICROS);
        }
        SqlValue::Date(d) => {
            buf.put_i32(4);
            buf.put_i32(d.num_days_from_ce() - PG_EPOCH_DAYS_FROM_CE);
        }
        SqlValue::Time(t) => {
            let micros = i64::from(t.num_seconds_from_midnight()) * 1_000_000
                + i64::from(t.nanosecond() / 1_000);
            buf.put_i32(8);
            buf.put_i64(micros);
        }
        SqlValue::Raw { bytes, .. } => put_bytes(buf, bytes)?,
    }
    Ok(())
}

fn put_len(buf: &mut BytesMut, len: usize) -> std::result::Result<(), String> {
    let len = i32::try_from(len)
        .map_err(|_| format!("value of {} bytes exceeds the COPY field limit", len))?;
    buf.put_i32(len);
    Ok(())
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) -> std::result::Result<(), String> {
    put_len(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

/// jsonb's binary input expects a version byte before the text.
fn put_text(buf: &mut BytesMut, s: &str, target_type: &str) -> std::result::Result<(), String> {
    if target_type.eq_ignore_ascii_case("jsonb") {
        put_len(buf, s.len() + 1)?;
        buf.put_u8(JSONB_VERSION);
        buf.put_slice(s.as_bytes());
        Ok(())
    } else {
        put_bytes(buf, s.as_bytes())
    }
}

/// Encode a Decimal value into PostgreSQL binary NUMERIC format.
///
/// Layout after the length prefix:
/// - ndigits (i16): number of base-10000 digits
/// - weight (i16): power of 10000 of the first digit
/// - sign (i16): 0x0000 positive, 0x4000 negative
/// - dscale (i16): digits after the decimal point
/// - digits (i16[]): base-10000 digits
fn encode_numeric(buf: &mut BytesMut, d: &Decimal) {
    const NUMERIC_POS: i16 = 0x0000;
    const NUMERIC_NEG: i16 = 0x4000;

    let dscale = d.scale() as i16;
    let sign = if d.is_sign_negative() && !d.is_zero() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };

    // Group the decimal text outward from the decimal point.
    let abs_str = d.abs().to_string();
    let (int_part, frac_part) = abs_str.split_once('.').unwrap_or((abs_str.as_str(), ""));

    let int_part = int_part.trim_start_matches('0');
    let int_width = int_part.len().div_ceil(4) * 4;
    let frac_width = frac_part.len().div_ceil(4) * 4;

    let mut digits = group_digits(&format!("{:0>width$}", int_part, width = int_width));
    let mut weight = digits.len() as i16 - 1;
    digits.extend(group_digits(&format!("{:0<width$}", frac_part, width = frac_width)));

    let leading = digits.iter().take_while(|&&g| g == 0).count();
    digits.drain(..leading);
    weight -= leading as i16;
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        weight = 0;
    }

    let ndigits = digits.len() as i16;
    buf.put_i32(8 + i32::from(ndigits) * 2);
    buf.put_i16(ndigits);
    buf.put_i16(weight);
    buf.put_i16(sign);
    buf.put_i16(dscale);
    for digit in digits {
        buf.put_i16(digit);
    }
}

/// Parse a string of ASCII digits, four at a time.
fn group_digits(s: &str) -> Vec<i16> {
    s.as_bytes()
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0i16, |acc, b| acc * 10 + i16::from(b - b'0'))
        })
        .collect()
}
