//! In-memory database implementing the source and target traits for tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::schema::{ColumnDescriptor, DdlStatement, IndexDescriptor, SourceQuery, TableRef};
use crate::core::traits::{Dialect, RowCursor, SchemaInspector, SourceReader, TargetWriter};
use crate::core::value::{Batch, Row, SqlValue};
use crate::drivers::postgres::PostgresDialect;
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MemTable {
    pub columns: Vec<ColumnDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    /// Values in `columns` order.
    pub rows: Vec<Row>,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, MemTable>,
    queries: HashMap<String, (Vec<ColumnDescriptor>, Vec<Row>)>,
    ddl_log: Vec<DdlStatement>,
    batch_sizes: HashMap<String, Vec<usize>>,
    write_calls: HashMap<String, usize>,
    open_cursors: usize,
    fail_write_at: Option<(String, usize)>,
    fail_describe: HashSet<String>,
    fail_create: HashSet<String>,
    fail_index: HashSet<String>,
    fail_count: bool,
    closed: bool,
}

/// Shared-state database; clones see the same tables.
#[derive(Clone, Default)]
pub(crate) struct MemoryDatabase {
    state: Arc<Mutex<State>>,
    dialect: PostgresDialect,
}

fn injected(message: impl Into<String>) -> MigrateError {
    MigrateError::pool(message, "in-memory database")
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_table(self, name: &str, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            MemTable {
                columns,
                indexes: Vec::new(),
                rows,
            },
        );
        self
    }

    pub fn with_index(self, table: &str, index: IndexDescriptor) -> Self {
        self.lock()
            .tables
            .get_mut(table)
            .expect("table registered before its indexes")
            .indexes
            .push(index);
        self
    }

    /// Result set returned for exactly this SQL text.
    pub fn with_query(self, sql: &str, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        self.lock()
            .queries
            .insert(sql.trim().to_string(), (columns, rows));
        self
    }

    /// Fail the `chunk`-th write (zero-based) into `table`.
    pub fn fail_write_at(self, table: &str, chunk: usize) -> Self {
        self.lock().fail_write_at = Some((table.to_string(), chunk));
        self
    }

    pub fn fail_describe(self, table: &str) -> Self {
        self.lock().fail_describe.insert(table.to_string());
        self
    }

    pub fn fail_create(self, table: &str) -> Self {
        self.lock().fail_create.insert(table.to_string());
        self
    }

    pub fn fail_index(self, index: &str) -> Self {
        self.lock().fail_index.insert(index.to_string());
        self
    }

    pub fn fail_count(self) -> Self {
        self.lock().fail_count = true;
        self
    }

    pub fn table(&self, name: &str) -> Option<MemTable> {
        self.lock().tables.get(name).cloned()
    }

    pub fn ddl_log(&self) -> Vec<DdlStatement> {
        self.lock().ddl_log.clone()
    }

    pub fn index_attempts(&self) -> usize {
        self.lock()
            .ddl_log
            .iter()
            .filter(|s| matches!(s, DdlStatement::CreateIndex { .. }))
            .count()
    }

    pub fn batch_sizes(&self, table: &str) -> Vec<usize> {
        self.lock()
            .batch_sizes
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn open_cursors(&self) -> usize {
        self.lock().open_cursors
    }

    fn result_set(&self, query: &SourceQuery) -> Result<Vec<Row>> {
        let state = self.lock();
        match query {
            SourceQuery::Table { table, columns } => {
                let key = table.to_string();
                let stored = state
                    .tables
                    .get(&key)
                    .ok_or_else(|| injected(format!("relation {} does not exist", key)))?;
                let positions = columns
                    .iter()
                    .map(|c| {
                        stored
                            .columns
                            .iter()
                            .position(|s| s.has_name(&c.name))
                            .ok_or_else(|| injected(format!("column {} does not exist", c.name)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(stored
                    .rows
                    .iter()
                    .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                    .collect())
            }
            SourceQuery::Custom { sql } => state
                .queries
                .get(sql.trim())
                .map(|(_, rows)| rows.clone())
                .ok_or_else(|| injected(format!("syntax error in query: {}", sql))),
        }
    }
}

#[async_trait]
impl SchemaInspector for MemoryDatabase {
    async fn describe_columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>> {
        let state = self.lock();
        let key = table.to_string();
        if state.fail_describe.contains(&key) {
            return Err(injected(format!("permission denied for table {}", key)));
        }
        Ok(state
            .tables
            .get(&key)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn describe_indexes(&self, table: &TableRef) -> Result<Vec<IndexDescriptor>> {
        Ok(self
            .lock()
            .tables
            .get(&table.to_string())
            .map(|t| t.indexes.clone())
            .unwrap_or_default())
    }

    fn close(&self) {
        self.lock().closed = true;
    }
}

#[async_trait]
impl SourceReader for MemoryDatabase {
    async fn describe_query(&self, sql: &str) -> Result<Vec<ColumnDescriptor>> {
        self.lock()
            .queries
            .get(sql.trim())
            .map(|(columns, _)| columns.clone())
            .ok_or_else(|| injected(format!("syntax error in query: {}", sql)))
    }

    async fn count_rows(&self, query: &SourceQuery) -> Result<u64> {
        if self.lock().fail_count {
            return Err(injected("canceling statement due to statement timeout"));
        }
        Ok(self.result_set(query)?.len() as u64)
    }

    async fn open_cursor(
        &self,
        query: &SourceQuery,
        fetch_size: usize,
    ) -> Result<Box<dyn RowCursor>> {
        let rows = self.result_set(query)?;
        self.lock().open_cursors += 1;
        Ok(Box::new(MemoryCursor {
            rows: rows.into(),
            fetch_size,
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct MemoryCursor {
    rows: VecDeque<Row>,
    fetch_size: usize,
    state: Arc<Mutex<State>>,
    open: bool,
}

impl MemoryCursor {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.state.lock().unwrap().open_cursors -= 1;
        }
    }
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn fetch(&mut self) -> Result<Option<Batch>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let take = self.fetch_size.min(self.rows.len());
        Ok(Some(Batch::new(self.rows.drain(..take).collect())))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl TargetWriter for MemoryDatabase {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn apply_ddl(&self, stmt: &DdlStatement) -> Result<()> {
        let mut state = self.lock();
        state.ddl_log.push(stmt.clone());
        let key = stmt.table().to_string();

        match stmt {
            DdlStatement::CreateTable { columns, .. } => {
                if state.fail_create.contains(&key) {
                    return Err(injected(format!("permission denied for schema of {}", key)));
                }
                if state.tables.contains_key(&key) {
                    return Err(injected(format!("relation {} already exists", key)));
                }
                state.tables.insert(
                    key,
                    MemTable {
                        columns: columns.clone(),
                        ..MemTable::default()
                    },
                );
            }
            DdlStatement::DropTable { .. } => {
                state.tables.remove(&key);
            }
            DdlStatement::CreateIndex { index, .. } => {
                if state.fail_index.contains(&index.name) {
                    return Err(injected(format!(
                        "could not create unique index {}",
                        index.name
                    )));
                }
                let table = state
                    .tables
                    .get_mut(&key)
                    .ok_or_else(|| injected(format!("relation {} does not exist", key)))?;
                if table.indexes.iter().any(|i| i.name == index.name) {
                    return Err(injected(format!("relation {} already exists", index.name)));
                }
                table.indexes.push(index.clone());
            }
        }
        Ok(())
    }

    async fn write_chunk(
        &self,
        table: &TableRef,
        columns: &[ColumnDescriptor],
        batch: Batch,
    ) -> Result<u64> {
        let mut state = self.lock();
        let key = table.to_string();

        let call = state.write_calls.entry(key.clone()).or_insert(0);
        let chunk = *call;
        *call += 1;
        if state.fail_write_at.as_ref() == Some(&(key.clone(), chunk)) {
            return Err(injected(format!(
                "duplicate key value violates unique constraint on {}",
                key
            )));
        }

        let stored = state
            .tables
            .get_mut(&key)
            .ok_or_else(|| injected(format!("relation {} does not exist", key)))?;
        let positions = stored
            .columns
            .iter()
            .map(|s| columns.iter().position(|c| c.has_name(&s.name)))
            .collect::<Vec<_>>();

        let count = batch.len();
        for row in batch.rows {
            stored.rows.push(
                positions
                    .iter()
                    .map(|p| p.map_or(SqlValue::Null, |p| row[p].clone()))
                    .collect(),
            );
        }
        state.batch_sizes.entry(key).or_default().push(count);
        Ok(count as u64)
    }
}
