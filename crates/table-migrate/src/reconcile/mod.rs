//! Target schema reconciliation.
//!
//! [`reconcile`] decides how to prepare the target table for one
//! [`TableSpec`] without touching either database; [`apply`] then runs the
//! planned DDL. Keeping the two apart lets a dry run print the plan.

mod compat;

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

pub use compat::{check_compatible, normalize_type, type_accepts};

use crate::config::{ExistingTableBehavior, TableSource, TableSpec};
use crate::core::schema::{ColumnDescriptor, DdlStatement, SourceQuery};
use crate::core::traits::{SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};

/// How the target table is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Target table absent: create it from the source columns.
    Create,
    /// Target table present: drop it and create it again.
    DropAndRecreate,
    /// Target table present and compatible: insert into it as is.
    Append,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcileAction::Create => "CREATE",
            ReconcileAction::DropAndRecreate => "DROP_AND_RECREATE",
            ReconcileAction::Append => "APPEND",
        };
        f.pad(name)
    }
}

/// Outcome of reconciling one table.
#[derive(Debug, Clone)]
pub struct ReconcileResult {
    pub action: ReconcileAction,
    /// Statements to run on the target, in order. Empty for `Append`.
    pub ddl: Vec<DdlStatement>,
    /// Query the transfer engine runs against the source.
    pub source_query: SourceQuery,
    pub source_columns: Vec<ColumnDescriptor>,
    /// Target column for each source column, in source column order.
    pub target_columns: Vec<ColumnDescriptor>,
}

/// Compare the source and target schema of `spec` and plan the DDL.
///
/// Fails with [`MigrateError::SchemaQuery`] when metadata cannot be read or
/// the source has no columns, and with [`MigrateError::SchemaMismatch`] when
/// an existing target table is not compatible under `append_if_compatible`.
pub async fn reconcile(
    source: &dyn SourceReader,
    target: &dyn TargetWriter,
    spec: &TableSpec,
) -> Result<ReconcileResult> {
    let (source_columns, source_query) = describe_source(source, spec).await?;

    let target_table = spec.target_table();
    let existing = target
        .describe_columns(&target_table)
        .await
        .map_err(|e| MigrateError::schema_query(&spec.target_name, e))?;

    let create = DdlStatement::CreateTable {
        table: target_table.clone(),
        columns: source_columns.clone(),
    };

    let (action, ddl, target_columns) = if existing.is_empty() {
        (ReconcileAction::Create, vec![create], source_columns.clone())
    } else {
        match spec.existing_table_behavior {
            ExistingTableBehavior::DropAndRecreate => (
                ReconcileAction::DropAndRecreate,
                vec![
                    DdlStatement::DropTable {
                        table: target_table.clone(),
                    },
                    create,
                ],
                source_columns.clone(),
            ),
            ExistingTableBehavior::AppendIfCompatible => {
                if let Some(details) = check_compatible(&source_columns, &existing) {
                    return Err(MigrateError::SchemaMismatch {
                        table: spec.target_name.clone(),
                        details,
                    });
                }
                let aligned = align_columns(&source_columns, &existing);
                (ReconcileAction::Append, Vec::new(), aligned)
            }
        }
    };

    debug!(
        "{}: {} with {} source columns",
        spec.source_name,
        action,
        source_columns.len()
    );

    Ok(ReconcileResult {
        action,
        ddl,
        source_query,
        source_columns,
        target_columns,
    })
}

/// Run the planned DDL on the target.
pub async fn apply(
    target: &dyn TargetWriter,
    spec: &TableSpec,
    result: &ReconcileResult,
) -> Result<()> {
    for stmt in &result.ddl {
        target
            .apply_ddl(stmt)
            .await
            .map_err(|e| MigrateError::ddl(&spec.target_name, e))?;
    }
    if !result.ddl.is_empty() {
        info!("{}: target table prepared ({})", spec.target_name, result.action);
    }
    Ok(())
}

async fn describe_source(
    source: &dyn SourceReader,
    spec: &TableSpec,
) -> Result<(Vec<ColumnDescriptor>, SourceQuery)> {
    match &spec.source {
        TableSource::Full => {
            let table = spec.source_table();
            let columns = source
                .describe_columns(&table)
                .await
                .map_err(|e| MigrateError::schema_query(&spec.source_name, e))?;
            if columns.is_empty() {
                return Err(MigrateError::schema_query(
                    &spec.source_name,
                    "source table does not exist or has no columns",
                ));
            }
            let query = SourceQuery::Table {
                table,
                columns: columns.clone(),
            };
            Ok((columns, query))
        }
        TableSource::Custom { query } => {
            let columns = source
                .describe_query(query)
                .await
                .map_err(|e| MigrateError::schema_query(&spec.source_name, e))?;
            if columns.is_empty() {
                return Err(MigrateError::schema_query(
                    &spec.source_name,
                    "custom query returns no columns",
                ));
            }
            Ok((columns, SourceQuery::Custom { sql: query.clone() }))
        }
    }
}

/// Existing target columns reordered to match the source columns.
fn align_columns(
    source: &[ColumnDescriptor],
    target: &[ColumnDescriptor],
) -> Vec<ColumnDescriptor> {
    source
        .iter()
        .filter_map(|s| target.iter().find(|t| t.has_name(&s.name)).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::TableRef;
    use crate::core::value::SqlValue;
    use crate::testing::MemoryDatabase;

    fn employees() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "int4").not_null(),
            ColumnDescriptor::new("name", "varchar").with_length(100),
            ColumnDescriptor::new("salary", "numeric").with_precision(10, 2),
        ]
    }

    fn source() -> MemoryDatabase {
        MemoryDatabase::new().with_table(
            "employees",
            employees(),
            vec![vec![SqlValue::I32(1), "Ada".into(), SqlValue::Null]],
        )
    }

    #[tokio::test]
    async fn test_absent_target_is_created() {
        let source = source();
        let target = MemoryDatabase::new();
        let result = reconcile(&source, &target, &TableSpec::full("employees"))
            .await
            .unwrap();

        assert_eq!(result.action, ReconcileAction::Create);
        assert_eq!(
            result.ddl,
            vec![DdlStatement::CreateTable {
                table: TableRef::parse("employees"),
                columns: employees(),
            }]
        );
        // Planning alone never touches the target.
        assert!(target.ddl_log().is_empty());
    }

    #[tokio::test]
    async fn test_full_mode_selects_every_column_in_catalog_order() {
        let source = source();
        let result = reconcile(&source, &MemoryDatabase::new(), &TableSpec::full("employees"))
            .await
            .unwrap();
        match result.source_query {
            SourceQuery::Table { columns, .. } => {
                let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, ["id", "name", "salary"]);
            }
            other => panic!("unexpected query {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_existing_target_dropped_when_configured() {
        let source = source();
        let target = MemoryDatabase::new().with_table(
            "employees",
            vec![ColumnDescriptor::new("legacy", "text")],
            vec![],
        );
        let spec =
            TableSpec::full("employees").with_behavior(ExistingTableBehavior::DropAndRecreate);
        let result = reconcile(&source, &target, &spec).await.unwrap();

        assert_eq!(result.action, ReconcileAction::DropAndRecreate);
        assert!(matches!(result.ddl[0], DdlStatement::DropTable { .. }));
        assert!(matches!(result.ddl[1], DdlStatement::CreateTable { .. }));

        apply(&target, &spec, &result).await.unwrap();
        assert_eq!(target.table("employees").unwrap().columns, employees());
    }

    #[tokio::test]
    async fn test_compatible_target_is_appended_with_aligned_columns() {
        let source = source();
        let target = MemoryDatabase::new().with_table(
            "employees",
            vec![
                ColumnDescriptor::new("SALARY", "numeric"),
                ColumnDescriptor::new("Id", "int8"),
                ColumnDescriptor::new("Name", "text"),
            ],
            vec![],
        );
        let result = reconcile(&source, &target, &TableSpec::full("employees"))
            .await
            .unwrap();

        assert_eq!(result.action, ReconcileAction::Append);
        assert!(result.ddl.is_empty());
        let names: Vec<_> = result.target_columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Id", "Name", "SALARY"]);
    }

    #[tokio::test]
    async fn test_missing_target_column_is_a_mismatch_without_mutation() {
        let source = MemoryDatabase::new().with_table(
            "t",
            vec![
                ColumnDescriptor::new("A", "INT"),
                ColumnDescriptor::new("B", "VARCHAR").with_length(10),
            ],
            vec![],
        );
        let target = MemoryDatabase::new().with_table(
            "t",
            vec![ColumnDescriptor::new("A", "INT")],
            vec![vec![SqlValue::I32(7)]],
        );
        let before = target.table("t");

        let err = reconcile(&source, &target, &TableSpec::full("t"))
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("B"));
        assert!(target.ddl_log().is_empty());
        assert_eq!(target.table("t"), before);
    }

    #[tokio::test]
    async fn test_custom_mode_uses_query_metadata() {
        let sql = "SELECT id, name FROM t WHERE active = 1";
        let source = MemoryDatabase::new().with_query(
            sql,
            vec![
                ColumnDescriptor::new("id", "int4"),
                ColumnDescriptor::new("name", "text"),
            ],
            vec![],
        );
        let spec = TableSpec::custom("active_t", sql);
        let result = reconcile(&source, &MemoryDatabase::new(), &spec)
            .await
            .unwrap();

        assert_eq!(result.action, ReconcileAction::Create);
        assert_eq!(result.source_query, SourceQuery::Custom { sql: sql.into() });
        assert_eq!(result.source_columns.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_source_table_is_a_schema_query_error() {
        let err = reconcile(
            &MemoryDatabase::new(),
            &MemoryDatabase::new(),
            &TableSpec::full("ghost"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrateError::SchemaQuery { ref table, .. } if table == "ghost"));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_a_schema_query_error() {
        let source = source().fail_describe("employees");
        let err = reconcile(&source, &MemoryDatabase::new(), &TableSpec::full("employees"))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::SchemaQuery { .. }));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_action_display() {
        assert_eq!(ReconcileAction::DropAndRecreate.to_string(), "DROP_AND_RECREATE");
        assert_eq!(
            serde_json::to_string(&ReconcileAction::Append).unwrap(),
            "\"append\""
        );
    }
}
