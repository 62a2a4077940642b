//! Progress reporting passed into the orchestrator.
//!
//! The core never renders UI. It calls a [`ProgressReporter`] at table
//! start, after each committed chunk and once per table outcome; the CLI
//! supplies a progress-bar implementation, tests use [`NoopReporter`].

use tracing::info;

use crate::orchestrator::{MigrationOutcome, MigrationStatus};

/// Observer for per-table and per-chunk progress.
pub trait ProgressReporter: Send + Sync {
    /// Transfer for `table` is about to start. `total` is `None` when the
    /// row count could not be estimated.
    fn on_table_start(&self, _table: &str, _total: Option<u64>) {}

    /// A chunk committed; `rows_so_far` counts all committed rows of `table`.
    fn on_chunk_progress(&self, table: &str, rows_so_far: u64, total: Option<u64>);

    /// Final record for `table`.
    fn on_table_outcome(&self, outcome: &MigrationOutcome);
}

/// Reports progress as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn on_chunk_progress(&self, table: &str, rows_so_far: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => info!(
                "{}: {}/{} rows ({:.1}%)",
                table,
                rows_so_far,
                total,
                rows_so_far as f64 * 100.0 / total as f64
            ),
            _ => info!("{}: {} rows", table, rows_so_far),
        }
    }

    fn on_table_outcome(&self, outcome: &MigrationOutcome) {
        if outcome.status == MigrationStatus::Success {
            info!(
                "{}: done, {} rows, {} indexes",
                outcome.table_name, outcome.rows_migrated, outcome.indexes_migrated
            );
        }
    }
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_chunk_progress(&self, _table: &str, _rows_so_far: u64, _total: Option<u64>) {}

    fn on_table_outcome(&self, _outcome: &MigrationOutcome) {}
}
