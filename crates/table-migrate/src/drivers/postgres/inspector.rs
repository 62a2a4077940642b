//! Catalog queries for PostgreSQL tables.

use async_trait::async_trait;
use tracing::debug;

use super::connection::PgDatabase;
use crate::core::schema::{ColumnDescriptor, IndexDescriptor, TableRef};
use crate::core::traits::SchemaInspector;
use crate::error::Result;

/// Unqualified tables resolve against the first schema on the search path.
const COLUMNS_QUERY: &str = r#"
    SELECT
        column_name::text,
        udt_name::text,
        COALESCE(character_maximum_length, 0)::int4,
        CASE WHEN data_type = 'numeric' THEN COALESCE(numeric_precision, 0) ELSE 0 END::int4,
        CASE WHEN data_type = 'numeric' THEN COALESCE(numeric_scale, 0) ELSE 0 END::int4,
        is_nullable::text = 'YES'
    FROM information_schema.columns
    WHERE table_schema::text = COALESCE($1::text, current_schema())
      AND table_name::text = $2::text
    ORDER BY ordinal_position
"#;

/// Key columns only; expression and partial indexes are left out.
const INDEXES_QUERY: &str = r#"
    SELECT
        i.relname::text AS index_name,
        ix.indisunique,
        ix.indisprimary,
        array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS columns
    FROM pg_catalog.pg_index ix
    JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
    JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_attribute a
      ON a.attrelid = t.oid
     AND a.attnum = ANY((ix.indkey::int2[])[0:ix.indnkeyatts - 1])
    WHERE n.nspname = COALESCE($1::text, current_schema())
      AND t.relname = $2::text
      AND ix.indexprs IS NULL
      AND ix.indpred IS NULL
    GROUP BY i.relname, ix.indisunique, ix.indisprimary
    ORDER BY i.relname
"#;

#[async_trait]
impl SchemaInspector for PgDatabase {
    async fn describe_columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>> {
        let client = self.acquire("describing columns").await?;
        let schema = table.schema.as_deref();
        let rows = client
            .query(COLUMNS_QUERY, &[&schema, &table.name])
            .await?;

        let columns: Vec<ColumnDescriptor> = rows
            .iter()
            .map(|row| -> Result<ColumnDescriptor> {
                Ok(ColumnDescriptor {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    max_length: row.try_get(2)?,
                    precision: row.try_get(3)?,
                    scale: row.try_get(4)?,
                    nullable: row.try_get(5)?,
                })
            })
            .collect::<Result<_>>()?;

        debug!(
            "Loaded {} columns for {} from {}",
            columns.len(),
            table,
            self.endpoint()
        );
        Ok(columns)
    }

    async fn describe_indexes(&self, table: &TableRef) -> Result<Vec<IndexDescriptor>> {
        let client = self.acquire("describing indexes").await?;
        let schema = table.schema.as_deref();
        let rows = client
            .query(INDEXES_QUERY, &[&schema, &table.name])
            .await?;

        let indexes: Vec<IndexDescriptor> = rows
            .iter()
            .map(|row| -> Result<IndexDescriptor> {
                Ok(IndexDescriptor {
                    name: row.try_get(0)?,
                    is_unique: row.try_get(1)?,
                    is_primary: row.try_get(2)?,
                    columns: row.try_get(3)?,
                })
            })
            .collect::<Result<_>>()?;

        debug!("Loaded {} indexes for {}", indexes.len(), table);
        Ok(indexes)
    }

    fn close(&self) {
        self.close_pool();
    }
}
