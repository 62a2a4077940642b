//! Error types for the migration library.

use std::fmt::Display;

use thiserror::Error;

use crate::config::Role;

/// Process exit code for a fully successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Invalid configuration file, table entry or credential.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Source or target database could not be reached.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// The run completed but at least one table failed.
pub const EXIT_TABLE_FAILURES: u8 = 3;
/// File could not be read.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
///
/// `Connection`, `Config` and `Io` abort the whole run. Every other variant
/// is scoped to one table: the orchestrator records it in that table's
/// outcome and moves on.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials rejected or endpoint unreachable.
    #[error("Cannot connect to {role} database: {message}")]
    Connection { role: Role, message: String },

    /// Catalog query failed while describing a table or query.
    #[error("Schema query failed for table {table}: {message}")]
    SchemaQuery { table: String, message: String },

    /// Existing target table cannot receive the source columns.
    #[error("Schema mismatch for table {table}: {details}")]
    SchemaMismatch { table: String, details: String },

    /// CREATE/DROP TABLE statement failed on the target.
    #[error("DDL failed for table {table}: {message}")]
    Ddl { table: String, message: String },

    /// Reading, coercing or writing a chunk failed.
    #[error("Transfer failed for table {table} at chunk {chunk}: {message}")]
    Transfer {
        table: String,
        chunk: usize,
        message: String,
    },

    /// A single index could not be created on the target.
    #[error("Failed to create index {index} on {table}: {message}")]
    IndexCreation {
        table: String,
        index: String,
        message: String,
    },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Raw database error from a driver call.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// One or more tables finished with a failure status.
    #[error("{failed} of {total} tables failed")]
    TablesFailed { failed: usize, total: usize },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn connection(role: Role, message: impl Display) -> Self {
        MigrateError::Connection {
            role,
            message: message.to_string(),
        }
    }

    pub fn schema_query(table: impl Into<String>, cause: impl Display) -> Self {
        MigrateError::SchemaQuery {
            table: table.into(),
            message: cause.to_string(),
        }
    }

    pub fn ddl(table: impl Into<String>, cause: impl Display) -> Self {
        MigrateError::Ddl {
            table: table.into(),
            message: cause.to_string(),
        }
    }

    /// Create a Transfer error for the given zero-based chunk.
    pub fn transfer(table: impl Into<String>, chunk: usize, cause: impl Display) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            chunk,
            message: cause.to_string(),
        }
    }

    pub fn index_creation(
        table: impl Into<String>,
        index: impl Into<String>,
        cause: impl Display,
    ) -> Self {
        MigrateError::IndexCreation {
            table: table.into(),
            index: index.into(),
            message: cause.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            _ => EXIT_TABLE_FAILURES,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
