//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::core::TableRef;

/// Root configuration structure.
///
/// Built from [`RawConfig`] by validation, so every [`TableSpec`] it holds
/// is already well-formed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tables to migrate, in configuration order.
    pub tables: Vec<TableSpec>,

    /// Defaults applied to tables that do not override them.
    pub settings: GlobalSettings,
}

/// Run-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Rows per chunk when a table sets no `chunk_size` (default: 10000).
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: usize,

    /// Rebuild indexes for tables that set no `migrate_indexes` (default: false).
    #[serde(default)]
    pub migrate_indexes_globally: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_chunk_size: default_chunk_size(),
            migrate_indexes_globally: false,
        }
    }
}

/// Where a table's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Every row and column of the named source table.
    #[default]
    Full,
    /// The result set of a user supplied query.
    Custom,
}

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingTableBehavior {
    /// Drop the target table and create it again from the source columns.
    DropAndRecreate,
    /// Insert into the existing table when its columns are compatible.
    #[default]
    AppendIfCompatible,
}

/// Validated source of a table's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Full,
    Custom { query: String },
}

/// One validated table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Source table name, optionally `schema.table`.
    pub source_name: String,

    /// Target table name. Defaults to `source_name`.
    pub target_name: String,

    pub source: TableSource,

    /// Per-table override of `settings.default_chunk_size`.
    pub chunk_size: Option<usize>,

    /// Per-table override of `settings.migrate_indexes_globally`.
    pub migrate_indexes: Option<bool>,

    pub existing_table_behavior: ExistingTableBehavior,
}

impl TableSpec {
    /// Create a full-table spec with default behavior.
    pub fn full(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            target_name: name.clone(),
            source_name: name,
            source: TableSource::Full,
            chunk_size: None,
            migrate_indexes: None,
            existing_table_behavior: ExistingTableBehavior::default(),
        }
    }

    /// Create a custom-query spec with default behavior.
    pub fn custom(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source: TableSource::Custom {
                query: query.into(),
            },
            ..Self::full(name)
        }
    }

    pub fn with_target_name(mut self, target: impl Into<String>) -> Self {
        self.target_name = target.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_migrate_indexes(mut self, migrate: bool) -> Self {
        self.migrate_indexes = Some(migrate);
        self
    }

    pub fn with_behavior(mut self, behavior: ExistingTableBehavior) -> Self {
        self.existing_table_behavior = behavior;
        self
    }

    pub fn mode(&self) -> MigrationMode {
        match self.source {
            TableSource::Full => MigrationMode::Full,
            TableSource::Custom { .. } => MigrationMode::Custom,
        }
    }

    /// Chunk size after applying the global default.
    pub fn resolve_chunk_size(&self, settings: &GlobalSettings) -> usize {
        self.chunk_size.unwrap_or(settings.default_chunk_size)
    }

    /// Index migration flag after applying the global default.
    pub fn resolve_migrate_indexes(&self, settings: &GlobalSettings) -> bool {
        self.migrate_indexes
            .unwrap_or(settings.migrate_indexes_globally)
    }

    pub fn source_table(&self) -> TableRef {
        TableRef::parse(&self.source_name)
    }

    pub fn target_table(&self) -> TableRef {
        TableRef::parse(&self.target_name)
    }
}

/// YAML document as written by the operator. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub tables: Vec<RawTableEntry>,

    #[serde(default, alias = "migration_settings")]
    pub settings: GlobalSettings,
}

/// One entry of the `tables` list before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTableEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub target_name: Option<String>,

    #[serde(default)]
    pub mode: MigrationMode,

    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub chunk_size: Option<usize>,

    #[serde(default)]
    pub migrate_indexes: Option<bool>,

    #[serde(default)]
    pub existing_table_behavior: ExistingTableBehavior,
}

fn default_chunk_size() -> usize {
    10_000
}
