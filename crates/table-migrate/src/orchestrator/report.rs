//! Per-table outcomes and the run report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::TableSpec;
use crate::error::Result;
use crate::reconcile::ReconcileAction;

/// Terminal status of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Success,
    /// Reading metadata, a schema mismatch or target DDL failed. Nothing was
    /// transferred.
    SchemaError,
    /// A chunk failed. Earlier chunks stay committed.
    TransferError,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStatus::Success => "success",
            MigrationStatus::SchemaError => "schema_error",
            MigrationStatus::TransferError => "transfer_error",
        };
        f.pad(name)
    }
}

/// Result of migrating one table.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    /// Configured source name.
    pub table_name: String,
    pub target_name: String,
    pub status: MigrationStatus,
    /// Reconcile action taken; `None` when reconciliation failed.
    pub action: Option<ReconcileAction>,
    /// Rows committed on the target, including those of a failed run.
    pub rows_migrated: u64,
    pub indexes_migrated: usize,
    pub indexes_failed: usize,
    /// Error message for a failed table, or index failures for a
    /// successful one.
    pub detail: Option<String>,
    pub duration_seconds: f64,
}

impl MigrationOutcome {
    pub(crate) fn new(spec: &TableSpec) -> Self {
        Self {
            table_name: spec.source_name.clone(),
            target_name: spec.target_name.clone(),
            status: MigrationStatus::Success,
            action: None,
            rows_migrated: 0,
            indexes_migrated: 0,
            indexes_failed: 0,
            detail: None,
            duration_seconds: 0.0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MigrationStatus::Success
    }
}

/// Summary of a whole run, one outcome per configured table in order.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub tables_total: usize,
    pub tables_success: usize,
    pub tables_failed: usize,
    pub rows_migrated: u64,
    pub outcomes: Vec<MigrationOutcome>,
}

impl MigrationReport {
    pub fn new(run_id: String, started_at: DateTime<Utc>, outcomes: Vec<MigrationOutcome>) -> Self {
        let completed_at = Utc::now();
        let duration_seconds =
            (completed_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let tables_success = outcomes.iter().filter(|o| o.is_success()).count();

        Self {
            run_id,
            started_at,
            completed_at,
            duration_seconds,
            tables_total: outcomes.len(),
            tables_success,
            tables_failed: outcomes.len() - tables_success,
            rows_migrated: outcomes.iter().map(|o| o.rows_migrated).sum(),
            outcomes,
        }
    }

    /// True when every table succeeded.
    pub fn is_success(&self) -> bool {
        self.tables_failed == 0
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Dry-run plan for one table.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTable {
    pub table_name: String,
    pub target_name: String,
    pub action: Option<ReconcileAction>,
    /// DDL the run would execute, as SQL text.
    pub ddl: Vec<String>,
    /// Why the table would fail reconciliation.
    pub error: Option<String>,
}
