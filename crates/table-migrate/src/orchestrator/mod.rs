//! Migration orchestrator - main workflow coordinator.
//!
//! Tables run one at a time in configuration order. Each goes through
//! reconcile, DDL, chunked transfer and, when enabled, index rebuild. A
//! failing table is recorded in its [`MigrationOutcome`] and the run moves
//! on to the next one.

mod report;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::TryStreamExt;
use tracing::{debug, error, info, warn};

pub use report::{MigrationOutcome, MigrationReport, MigrationStatus, PlannedTable};

use crate::config::{Config, Credentials, GlobalSettings, TableSpec};
use crate::core::traits::{SourceReader, TargetWriter};
use crate::drivers::postgres::PgDatabase;
use crate::error::{MigrateError, Result};
use crate::indexes;
use crate::progress::{ProgressReporter, TracingReporter};
use crate::reconcile;
use crate::transfer::{self, TransferPlan};

/// Migration orchestrator.
pub struct Orchestrator {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    settings: GlobalSettings,
    reporter: Arc<dyn ProgressReporter>,
}

type TableFailure = (MigrationStatus, MigrateError);

impl Orchestrator {
    /// Create an orchestrator over already opened databases.
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        settings: GlobalSettings,
    ) -> Self {
        Self {
            source,
            target,
            settings,
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Connect to both databases.
    ///
    /// Fails with [`MigrateError::Connection`] before any table is touched
    /// when either side is unreachable or rejects its credentials.
    pub async fn connect(
        config: &Config,
        source: &Credentials,
        target: &Credentials,
    ) -> Result<Self> {
        info!("Connecting to source and target databases");
        let source = PgDatabase::connect(source).await?;
        let target = PgDatabase::connect(target).await?;
        Ok(Self::new(
            Arc::new(source),
            Arc::new(target),
            config.settings.clone(),
        ))
    }

    /// Replace the default [`TracingReporter`].
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Release the connection pools of both databases.
    pub fn close(&self) {
        self.source.close();
        self.target.close();
    }

    /// Migrate every table in order and collect the outcomes.
    pub async fn run(&self, tables: &[TableSpec]) -> MigrationReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting migration run: {} ({} tables)", run_id, tables.len());

        let mut outcomes = Vec::with_capacity(tables.len());
        for spec in tables {
            outcomes.push(self.migrate_table(spec).await);
        }

        let report = MigrationReport::new(run_id, started_at, outcomes);
        info!(
            "Migration finished: {}/{} tables succeeded, {} rows in {:.1}s",
            report.tables_success,
            report.tables_total,
            report.rows_migrated,
            report.duration_seconds
        );
        report
    }

    /// Reconcile every table without changing either database.
    pub async fn plan(&self, tables: &[TableSpec]) -> Vec<PlannedTable> {
        let mut planned = Vec::with_capacity(tables.len());
        for spec in tables {
            let entry =
                match reconcile::reconcile(self.source.as_ref(), self.target.as_ref(), spec).await
                {
                    Ok(result) => PlannedTable {
                        table_name: spec.source_name.clone(),
                        target_name: spec.target_name.clone(),
                        action: Some(result.action),
                        ddl: result
                            .ddl
                            .iter()
                            .map(|stmt| self.target.dialect().render_ddl(stmt))
                            .collect(),
                        error: None,
                    },
                    Err(e) => PlannedTable {
                        table_name: spec.source_name.clone(),
                        target_name: spec.target_name.clone(),
                        action: None,
                        ddl: Vec::new(),
                        error: Some(e.to_string()),
                    },
                };
            planned.push(entry);
        }
        planned
    }

    /// Migrate one table. Never fails: errors end up in the outcome.
    pub async fn migrate_table(&self, spec: &TableSpec) -> MigrationOutcome {
        let started = Instant::now();
        let mut outcome = MigrationOutcome::new(spec);
        info!(
            "{}: migrating into {} ({:?} mode)",
            spec.source_name,
            spec.target_name,
            spec.mode()
        );

        match self.migrate_into(spec, &mut outcome).await {
            Ok(()) => info!(
                "{}: completed ({} rows, {} indexes)",
                spec.source_name, outcome.rows_migrated, outcome.indexes_migrated
            ),
            Err((status, e)) => {
                error!("{}: {} - {}", spec.source_name, status, e);
                outcome.status = status;
                outcome.detail = Some(e.to_string());
            }
        }

        outcome.duration_seconds = started.elapsed().as_secs_f64();
        self.reporter.on_table_outcome(&outcome);
        outcome
    }

    async fn migrate_into(
        &self,
        spec: &TableSpec,
        outcome: &mut MigrationOutcome,
    ) -> std::result::Result<(), TableFailure> {
        let source = self.source.as_ref();
        let target = self.target.as_ref();
        let schema_error = |e| (MigrationStatus::SchemaError, e);

        let reconciled = reconcile::reconcile(source, target, spec)
            .await
            .map_err(schema_error)?;
        outcome.action = Some(reconciled.action);
        reconcile::apply(target, spec, &reconciled)
            .await
            .map_err(schema_error)?;

        let total = transfer::estimate_rows(source, &reconciled.source_query).await;
        self.reporter.on_table_start(&spec.source_name, total);

        let plan = TransferPlan {
            table_name: spec.source_name.clone(),
            target: spec.target_table(),
            query: reconciled.source_query,
            target_columns: reconciled.target_columns,
            chunk_size: spec.resolve_chunk_size(&self.settings),
        };
        let mut batches = Box::pin(transfer::transfer(source, target, &plan));
        while let Some(batch) = batches
            .try_next()
            .await
            .map_err(|e| (MigrationStatus::TransferError, e))?
        {
            outcome.rows_migrated = batch.rows_committed;
            self.reporter
                .on_chunk_progress(&spec.source_name, batch.rows_committed, total);
        }

        if spec.resolve_migrate_indexes(&self.settings) {
            self.rebuild_indexes(spec, outcome).await;
        }
        Ok(())
    }

    /// Index failures are recorded on the outcome but never fail the table.
    async fn rebuild_indexes(&self, spec: &TableSpec, outcome: &mut MigrationOutcome) {
        let source_table = spec.source_table();
        let source_indexes = match self.source.describe_indexes(&source_table).await {
            Ok(indexes) => indexes,
            Err(e) => {
                warn!("{}: cannot read source indexes: {}", spec.source_name, e);
                outcome.detail = Some(format!("source indexes unavailable: {}", e));
                return;
            }
        };
        if source_indexes.is_empty() {
            debug!("{}: no indexes to migrate", spec.source_name);
            return;
        }

        let result = indexes::migrate_indexes(
            self.target.as_ref(),
            &source_indexes,
            &source_table,
            &spec.target_table(),
        )
        .await;

        match result {
            Ok(report) => {
                outcome.indexes_migrated = report.created_count();
                outcome.indexes_failed = report.failed_count();
                if !report.failures.is_empty() {
                    let messages: Vec<String> =
                        report.failures.iter().map(ToString::to_string).collect();
                    outcome.detail = Some(messages.join("; "));
                }
            }
            Err(e) => {
                warn!("{}: index migration skipped: {}", spec.source_name, e);
                outcome.indexes_failed = source_indexes.len();
                outcome.detail = Some(e.to_string());
            }
        }
    }
}
