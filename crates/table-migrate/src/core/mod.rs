//! Core abstractions for database-agnostic migration.
//!
//! - [`schema`]: table references, column/index descriptors and DDL statements
//! - [`value`]: SQL value representation and row batches
//! - [`traits`]: seams between the migration engine and database drivers
//!
//! The reconciler, transfer engine and index migrator only talk to databases
//! through [`SourceReader`], [`TargetWriter`] and [`Dialect`], so they can be
//! exercised against an in-memory implementation in tests.

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnDescriptor, DdlStatement, IndexDescriptor, SourceQuery, TableRef};
pub use traits::{Dialect, RowCursor, SchemaInspector, SourceReader, TargetWriter};
pub use value::{Batch, Row, SqlValue};
