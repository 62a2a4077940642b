//! Core traits for database-agnostic data migration.
//!
//! - [`SchemaInspector`]: column and index metadata for a named table
//! - [`SourceReader`]: query metadata, row counts and chunked cursors
//! - [`TargetWriter`]: DDL application and chunk writes
//! - [`Dialect`]: SQL syntax strategy for a database engine

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{ColumnDescriptor, DdlStatement, IndexDescriptor, SourceQuery, TableRef};
use super::value::Batch;

/// Read table metadata from a database catalog.
///
/// Both methods return an empty result, not an error, when the table does
/// not exist.
#[async_trait]
pub trait SchemaInspector: Send + Sync {
    /// Columns in catalog order.
    async fn describe_columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>>;

    /// Indexes on the table, ordered by name.
    async fn describe_indexes(&self, table: &TableRef) -> Result<Vec<IndexDescriptor>>;

    /// Release pooled connections once the run is over.
    fn close(&self) {}
}

/// Read rows from a source database.
#[async_trait]
pub trait SourceReader: SchemaInspector {
    /// Result columns of a query, without executing it.
    async fn describe_query(&self, sql: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Number of rows the query returns.
    async fn count_rows(&self, query: &SourceQuery) -> Result<u64>;

    /// Execute the query behind a server-side cursor.
    ///
    /// The cursor yields batches of exactly `fetch_size` rows; only the last
    /// batch may be smaller.
    async fn open_cursor(&self, query: &SourceQuery, fetch_size: usize)
        -> Result<Box<dyn RowCursor>>;
}

/// Forward-only cursor over a query result.
///
/// Dropping a cursor without calling [`RowCursor::close`] must still release
/// the underlying connection.
#[async_trait]
pub trait RowCursor: Send {
    /// Next batch, or `None` once the result is exhausted.
    async fn fetch(&mut self) -> Result<Option<Batch>>;

    /// Close the cursor and release its connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Write schema and rows to a target database.
#[async_trait]
pub trait TargetWriter: SchemaInspector {
    /// SQL syntax used to render this writer's statements.
    fn dialect(&self) -> &dyn Dialect;

    /// Apply one DDL statement.
    async fn apply_ddl(&self, stmt: &DdlStatement) -> Result<()>;

    /// Insert a batch inside its own transaction and commit it.
    ///
    /// `columns` describes the target columns in the order of the values of
    /// each row. Returns the number of rows written.
    async fn write_chunk(
        &self,
        table: &TableRef,
        columns: &[ColumnDescriptor],
        batch: Batch,
    ) -> Result<u64>;
}

/// SQL syntax strategy for a database engine.
pub trait Dialect: Send + Sync {
    /// Longest identifier the engine keeps without truncation.
    fn max_identifier_len(&self) -> usize;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> String;

    /// Quoted, optionally schema-qualified table name.
    fn qualify(&self, table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_ident(schema),
                self.quote_ident(&table.name)
            ),
            None => self.quote_ident(&table.name),
        }
    }

    /// Full SQL text of a DDL statement.
    fn render_ddl(&self, stmt: &DdlStatement) -> String;

    /// SQL text the source executes for a query.
    fn render_query(&self, query: &SourceQuery) -> String;
}
