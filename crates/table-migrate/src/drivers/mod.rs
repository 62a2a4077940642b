//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL source and target
//! - [`common`]: shared utilities (TLS)
//!
//! A driver implements [`SourceReader`](crate::core::SourceReader),
//! [`TargetWriter`](crate::core::TargetWriter) and
//! [`Dialect`](crate::core::Dialect); the migration engine never sees
//! driver types directly.

pub mod common;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
