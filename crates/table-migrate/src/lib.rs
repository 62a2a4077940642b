//! # table-migrate
//!
//! Declarative, chunked table migration between two PostgreSQL databases.
//!
//! For every configured table the library:
//!
//! - **Reconciles** the target schema (create, drop and recreate, or append
//!   when the existing table is compatible)
//! - **Transfers** rows through a server-side cursor, committing one
//!   transaction per chunk on the target
//! - **Rebuilds indexes** on the target once the data transfer succeeded
//!
//! Tables are processed one at a time, in configuration order, and a failure
//! in one table never stops the others.
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_migrate::{Config, Credentials, Orchestrator, Role};
//!
//! #[tokio::main]
//! async fn main() -> table_migrate::Result<()> {
//!     let config = Config::load("config/migration_config.yaml")?;
//!     let source = Credentials::from_env(Role::Source)?;
//!     let target = Credentials::from_env(Role::Target)?;
//!
//!     let orchestrator = Orchestrator::connect(&config, &source, &target).await?;
//!     let report = orchestrator.run(&config.tables).await;
//!     println!("{} of {} tables migrated", report.tables_success, report.tables_total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod indexes;
pub mod orchestrator;
pub mod progress;
pub mod reconcile;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{
    Config, Credentials, ExistingTableBehavior, GlobalSettings, MigrationMode, Role, TableSource,
    TableSpec,
};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    MigrationOutcome, MigrationReport, MigrationStatus, Orchestrator, PlannedTable,
};
pub use progress::{NoopReporter, ProgressReporter, TracingReporter};
pub use reconcile::{ReconcileAction, ReconcileResult};
pub use transfer::BatchResult;
