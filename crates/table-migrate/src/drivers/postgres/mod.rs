//! PostgreSQL driver.
//!
//! - [`PgDatabase`]: pooled connections to one endpoint; implements
//!   [`SchemaInspector`](crate::core::SchemaInspector),
//!   [`SourceReader`](crate::core::SourceReader) and
//!   [`TargetWriter`](crate::core::TargetWriter)
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL

mod connection;
mod dialect;
mod inspector;
mod reader;
mod writer;

pub use connection::PgDatabase;
pub use dialect::{format_column_type, PostgresDialect};
