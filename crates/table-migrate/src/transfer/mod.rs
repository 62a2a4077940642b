//! Chunked transfer engine.
//!
//! [`transfer`] opens a server-side cursor on the source and yields one
//! [`BatchResult`] per chunk. Each chunk is coerced to the target column
//! types and written in its own transaction before the next one is fetched,
//! so at most one chunk is resident at a time and a failure after N chunks
//! leaves exactly N chunks committed.

mod coerce;

use futures::stream::{self, Stream};
use serde::Serialize;
use tracing::{debug, warn};

pub use coerce::{coerce_batch, coerce_value};

use crate::core::schema::{ColumnDescriptor, SourceQuery, TableRef};
use crate::core::traits::{RowCursor, SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};

/// Everything the engine needs to move one table.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    /// Name used in error context (the configured source name).
    pub table_name: String,
    pub target: TableRef,
    pub query: SourceQuery,
    /// Target column for each value position of a source row.
    pub target_columns: Vec<ColumnDescriptor>,
    pub chunk_size: usize,
}

/// Progress after one committed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Zero-based index of the chunk.
    pub chunk_index: usize,
    /// Rows written by this chunk.
    pub rows_transferred: u64,
    /// Rows committed by this and all earlier chunks. Rows before this
    /// position are durable on the target.
    pub rows_committed: u64,
}

#[derive(Default)]
struct TransferState {
    cursor: Option<Box<dyn RowCursor>>,
    chunk_index: usize,
    rows_committed: u64,
    done: bool,
}

/// Stream the rows of `plan.query` into `plan.target`, one chunk at a time.
///
/// The stream is lazy: nothing runs until it is polled, and each call
/// re-executes the source query from the start. The first error ends the
/// stream; chunks committed before it stay committed.
pub fn transfer<'a>(
    source: &'a dyn SourceReader,
    target: &'a dyn TargetWriter,
    plan: &'a TransferPlan,
) -> impl Stream<Item = Result<BatchResult>> + Send + 'a {
    stream::try_unfold(TransferState::default(), move |mut state| async move {
        if state.done {
            return Ok(None);
        }
        let chunk = state.chunk_index;
        let table = plan.table_name.as_str();

        if state.cursor.is_none() {
            let cursor = source
                .open_cursor(&plan.query, plan.chunk_size)
                .await
                .map_err(|e| at_chunk(table, chunk, e))?;
            state.cursor = Some(cursor);
        }
        let Some(cursor) = state.cursor.as_mut() else {
            return Ok(None);
        };

        let next = cursor.fetch().await.map_err(|e| at_chunk(table, chunk, e))?;
        let batch = match next {
            Some(batch) if !batch.is_empty() => batch,
            _ => {
                state.done = true;
                if let Some(cursor) = state.cursor.take() {
                    cursor.close().await.map_err(|e| at_chunk(table, chunk, e))?;
                }
                debug!("{}: no more rows to read after {} chunks", table, chunk);
                return Ok(None);
            }
        };

        let fetched = batch.len();
        let batch = coerce_batch(batch, &plan.target_columns)
            .map_err(|msg| MigrateError::transfer(table, chunk, msg))?;
        let written = target
            .write_chunk(&plan.target, &plan.target_columns, batch)
            .await
            .map_err(|e| at_chunk(table, chunk, e))?;

        state.rows_committed += written;
        state.chunk_index += 1;
        debug!(
            "{}: committed chunk {} ({} rows fetched, {} written, {} total)",
            table, chunk, fetched, written, state.rows_committed
        );

        let result = BatchResult {
            chunk_index: chunk,
            rows_transferred: written,
            rows_committed: state.rows_committed,
        };
        Ok(Some((result, state)))
    })
}

/// Attach table and chunk context, replacing any already present.
fn at_chunk(table: &str, chunk: usize, err: MigrateError) -> MigrateError {
    match err {
        MigrateError::Transfer { message, .. } => MigrateError::Transfer {
            table: table.to_string(),
            chunk,
            message,
        },
        other => MigrateError::transfer(table, chunk, other),
    }
}

/// Best-effort row count of the query, for progress reporting.
///
/// A failing count only costs the progress total, so it is logged and
/// reported as unknown.
pub async fn estimate_rows(source: &dyn SourceReader, query: &SourceQuery) -> Option<u64> {
    match source.count_rows(query).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Row count unavailable, progress total unknown: {}", e);
            None
        }
    }
}
