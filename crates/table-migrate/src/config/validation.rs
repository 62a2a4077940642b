//! Configuration validation.

use tracing::warn;

use super::{Config, RawConfig, RawTableEntry, TableSource, TableSpec};
use crate::error::{MigrateError, Result};

/// Validate the raw document and convert it into typed table specs.
pub fn validate(raw: RawConfig) -> Result<Config> {
    if raw.tables.is_empty() {
        return Err(MigrateError::Config(
            "at least one entry under 'tables' is required".into(),
        ));
    }
    if raw.settings.default_chunk_size == 0 {
        return Err(MigrateError::Config(
            "settings.default_chunk_size must be at least 1".into(),
        ));
    }

    let tables = raw
        .tables
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| validate_entry(idx, entry))
        .collect::<Result<Vec<_>>>()?;

    Ok(Config {
        tables,
        settings: raw.settings,
    })
}

fn validate_entry(idx: usize, entry: RawTableEntry) -> Result<TableSpec> {
    let name = entry.name.trim().to_string();
    if name.is_empty() {
        return Err(MigrateError::Config(format!(
            "tables[{}].name is required",
            idx
        )));
    }

    if let Some(0) = entry.chunk_size {
        return Err(MigrateError::Config(format!(
            "tables[{}] ({}): chunk_size must be at least 1",
            idx, name
        )));
    }

    let query = entry
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    let source = match entry.mode {
        super::MigrationMode::Full => {
            if query.is_some() {
                warn!(
                    "tables[{}] ({}): 'query' is ignored because mode is 'full'",
                    idx, name
                );
            }
            TableSource::Full
        }
        super::MigrationMode::Custom => match query {
            Some(query) => TableSource::Custom { query },
            None => {
                return Err(MigrateError::Config(format!(
                    "tables[{}] ({}): mode 'custom' requires a non-empty 'query'",
                    idx, name
                )))
            }
        },
    };

    let target_name = entry
        .target_name
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| name.clone());

    Ok(TableSpec {
        source_name: name,
        target_name,
        source,
        chunk_size: entry.chunk_size,
        migrate_indexes: entry.migrate_indexes,
        existing_table_behavior: entry.existing_table_behavior,
    })
}
