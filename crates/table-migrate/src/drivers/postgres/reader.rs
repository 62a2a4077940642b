//! PostgreSQL source reader implementation.
//!
//! Rows are streamed through a `NO SCROLL` cursor declared inside a read-only
//! transaction, so at most one chunk is held in memory.

use async_trait::async_trait;
use deadpool_postgres::Object;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row as PgRow;
use tracing::debug;

use super::connection::PgDatabase;
use crate::core::schema::{ColumnDescriptor, SourceQuery};
use crate::core::traits::{Dialect, RowCursor, SourceReader};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

const CURSOR_NAME: &str = "table_migrate_cursor";

#[async_trait]
impl SourceReader for PgDatabase {
    async fn describe_query(&self, sql: &str) -> Result<Vec<ColumnDescriptor>> {
        let sql = self.dialect.render_query(&SourceQuery::Custom {
            sql: sql.to_string(),
        });
        let client = self.acquire("describing query").await?;
        let statement = client.prepare(&sql).await?;

        Ok(statement
            .columns()
            .iter()
            .map(|c| ColumnDescriptor::new(c.name(), c.type_().name()))
            .collect())
    }

    async fn count_rows(&self, query: &SourceQuery) -> Result<u64> {
        let sql = self.dialect.count_query(query);
        let client = self.acquire("counting rows").await?;
        let row = client.query_one(sql.as_str(), &[]).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count.max(0) as u64)
    }

    async fn open_cursor(
        &self,
        query: &SourceQuery,
        fetch_size: usize,
    ) -> Result<Box<dyn RowCursor>> {
        let sql = self.dialect.render_query(query);
        let client = self.acquire("opening cursor").await?;

        client.batch_execute("BEGIN READ ONLY").await?;
        let declare = self.dialect.declare_cursor(CURSOR_NAME, &sql);
        if let Err(e) = client.execute(declare.as_str(), &[]).await {
            // Connection still has an aborted transaction; keep it out of the pool.
            drop(Object::take(client));
            return Err(e.into());
        }
        debug!("Opened cursor: {}", sql);

        Ok(Box::new(PgCursor {
            client: Some(client),
            fetch_sql: self.dialect.fetch_forward(CURSOR_NAME, fetch_size),
            fetch_size,
            exhausted: false,
        }))
    }
}

/// Server-side cursor holding one pooled connection until closed.
struct PgCursor {
    client: Option<Object>,
    fetch_sql: String,
    fetch_size: usize,
    exhausted: bool,
}

#[async_trait]
impl RowCursor for PgCursor {
    async fn fetch(&mut self) -> Result<Option<Batch>> {
        if self.exhausted {
            return Ok(None);
        }
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| MigrateError::pool("cursor is closed", "fetching rows"))?;

        let rows = client.query(self.fetch_sql.as_str(), &[]).await?;
        if rows.len() < self.fetch_size {
            self.exhausted = true;
        }
        if rows.is_empty() {
            return Ok(None);
        }

        let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
        Ok(Some(Batch::new(rows)))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        if let Some(client) = self.client.take() {
            let close_sql = format!("CLOSE {}; COMMIT", CURSOR_NAME);
            if let Err(e) = client.batch_execute(&close_sql).await {
                drop(Object::take(client));
                return Err(e.into());
            }
        }
        Ok(())
    }
}

impl Drop for PgCursor {
    fn drop(&mut self) {
        // Abandoned mid-stream: the transaction is still open, so close the
        // connection instead of handing it back to the pool.
        if let Some(client) = self.client.take() {
            debug!("Discarding connection of unclosed cursor");
            drop(Object::take(client));
        }
    }
}

/// Accepts any type and keeps the binary wire value as-is.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| decode_value(row, idx, column.type_()))
        .collect()
}

/// Decode one column. Types without a dedicated variant, and values the
/// typed decoder rejects (numeric NaN, infinite timestamps), are kept raw.
fn decode_value(row: &PgRow, idx: usize, ty: &Type) -> Result<SqlValue> {
    let decoded = match ty.name() {
        "bool" => typed(row, idx, SqlValue::Bool),
        "int2" => typed(row, idx, SqlValue::I16),
        "int4" => typed(row, idx, SqlValue::I32),
        "int8" => typed(row, idx, SqlValue::I64),
        "float4" => typed(row, idx, SqlValue::F32),
        "float8" => typed(row, idx, SqlValue::F64),
        "text" | "varchar" | "bpchar" | "name" => typed(row, idx, SqlValue::Text),
        "bytea" => typed(row, idx, SqlValue::Bytes),
        "uuid" => typed(row, idx, SqlValue::Uuid),
        "numeric" => typed(row, idx, SqlValue::Decimal),
        "timestamp" => typed(row, idx, SqlValue::Timestamp),
        "timestamptz" => typed(row, idx, SqlValue::TimestampTz),
        "date" => typed(row, idx, SqlValue::Date),
        "time" => typed(row, idx, SqlValue::Time),
        // json keeps its text verbatim (key order, duplicates, whitespace);
        // its binary wire form is the UTF-8 document.
        "json" => typed(row, idx, |RawValue(bytes)| json_text(bytes)),
        "jsonb" => typed(row, idx, SqlValue::Json),
        _ => None,
    };

    match decoded {
        Some(value) => Ok(value),
        None => {
            let raw: Option<RawValue> = row.try_get(idx)?;
            Ok(raw.map_or(SqlValue::Null, |RawValue(bytes)| SqlValue::Raw {
                type_name: ty.name().to_string(),
                bytes,
            }))
        }
    }
}

fn json_text(bytes: Vec<u8>) -> SqlValue {
    match String::from_utf8(bytes) {
        Ok(text) => SqlValue::Text(text),
        Err(e) => SqlValue::Raw {
            type_name: "json".to_string(),
            bytes: e.into_bytes(),
        },
    }
}

fn typed<'a, T, F>(row: &'a PgRow, idx: usize, wrap: F) -> Option<SqlValue>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> SqlValue,
{
    row.try_get::<_, Option<T>>(idx)
        .ok()
        .map(|value| value.map_or(SqlValue::Null, wrap))
}
