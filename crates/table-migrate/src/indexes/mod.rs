//! Index recreation on the target after a successful transfer.

use tracing::{debug, info, warn};

use crate::core::schema::{DdlStatement, IndexDescriptor, TableRef};
use crate::core::traits::TargetWriter;
use crate::error::{MigrateError, Result};

/// What happened to each source index.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Target names of the indexes created.
    pub created: Vec<String>,
    /// Source names of indexes left alone (already present or unusable).
    pub skipped: Vec<String>,
    /// One [`MigrateError::IndexCreation`] per failed index.
    pub failures: Vec<MigrateError>,
}

impl IndexReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Create each source index that the target table does not already have.
///
/// An index counts as present when the target has one with the same name and
/// column list, or, for a primary key, when the target already has a primary
/// key. A failed index is recorded in the report and does not stop the
/// remaining ones. Only reading the target catalog can fail the call.
pub async fn migrate_indexes(
    target: &dyn TargetWriter,
    source_indexes: &[IndexDescriptor],
    source_table: &TableRef,
    target_table: &TableRef,
) -> Result<IndexReport> {
    let table_name = target_table.to_string();
    let existing = target
        .describe_indexes(target_table)
        .await
        .map_err(|e| MigrateError::schema_query(&table_name, e))?;
    let columns = target
        .describe_columns(target_table)
        .await
        .map_err(|e| MigrateError::schema_query(&table_name, e))?;
    let has_primary_key = existing.iter().any(|i| i.is_primary);
    let max_len = target.dialect().max_identifier_len();

    let mut report = IndexReport::default();

    for index in source_indexes {
        let mut missing = Vec::new();
        let mut mapped_columns = Vec::with_capacity(index.columns.len());
        for name in &index.columns {
            match columns.iter().find(|c| c.has_name(name)) {
                Some(column) => mapped_columns.push(column.name.clone()),
                None => missing.push(name.as_str()),
            }
        }
        if !missing.is_empty() {
            warn!(
                "{}: skipping index {}, target lacks column(s) {}",
                table_name,
                index.name,
                missing.join(", ")
            );
            report.skipped.push(index.name.clone());
            continue;
        }

        let mapped = IndexDescriptor {
            name: target_index_name(&index.name, &source_table.name, &target_table.name, max_len),
            columns: mapped_columns,
            is_unique: index.is_unique,
            is_primary: index.is_primary,
        };

        if (mapped.is_primary && has_primary_key) || existing.iter().any(|e| e.matches(&mapped)) {
            debug!("{}: index {} already present", table_name, mapped.name);
            report.skipped.push(index.name.clone());
            continue;
        }

        let name = mapped.name.clone();
        let stmt = DdlStatement::CreateIndex {
            table: target_table.clone(),
            index: mapped,
        };
        match target.apply_ddl(&stmt).await {
            Ok(()) => {
                info!("{}: created index {}", table_name, name);
                report.created.push(name);
            }
            Err(e) => {
                let err = MigrateError::index_creation(&table_name, name, e);
                warn!("{}", err);
                report.failures.push(err);
            }
        }
    }

    Ok(report)
}

/// Name of the target copy of an index.
///
/// When the table is renamed, occurrences of the source table name inside
/// the index name (ASCII case-insensitive) become the target table name.
/// The result is cut to `max_len` bytes on a character boundary.
pub fn target_index_name(
    index_name: &str,
    source_table: &str,
    target_table: &str,
    max_len: usize,
) -> String {
    let renamed = if source_table.is_empty() || source_table.eq_ignore_ascii_case(target_table) {
        index_name.to_string()
    } else {
        replace_ignore_ascii_case(index_name, source_table, target_table)
    };
    truncate_identifier(renamed, max_len)
}

fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    // ASCII lowercasing keeps byte offsets, so positions map back to `haystack`.
    let lower = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&needle) {
        let start = pos + found;
        out.push_str(&haystack[pos..start]);
        out.push_str(replacement);
        pos = start + needle.len();
    }
    out.push_str(&haystack[pos..]);
    out
}

fn truncate_identifier(mut name: String, max_len: usize) -> String {
    if name.len() > max_len {
        let mut end = max_len;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}
