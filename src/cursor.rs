//! Forward-only row fetching over an open statement.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::decode;
use crate::descriptor::{ColumnDescriptor, ColumnType};
use crate::diagnostics::check;
use crate::error::IngresError;
use crate::planner::{self, ColumnBlock, SEGMENT_PREFIX_LEN};
use crate::pool::PooledBuffer;
use crate::protocol::{DataValue, GenParm, GetColumnsParm, QueryInfo};
use crate::results::{ResultSet, Row};
use crate::statement::OpenStatement;
use crate::types::Value;

/// Result of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub rows_affected: i64,
    pub last_insert_id: Option<i64>,
}

impl From<QueryInfo> for ExecResult {
    fn from(info: QueryInfo) -> Self {
        Self {
            rows_affected: info.row_count.unwrap_or(0),
            last_insert_id: info.last_insert_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CursorState {
    /// Rows may still be fetched.
    Open,
    /// The engine reported the end of the result set.
    Done,
    /// Closed by the caller; nothing more can be fetched.
    Closed,
}

/// Rows of one result set, in engine order.
///
/// The cursor owns one receive buffer per column and a pooled accumulation buffer per long
/// column. When the engine signals the end of data the cursor collects the final query info and
/// releases its statement; [`RowCursor::close`] (or dropping the cursor) releases it earlier.
///
/// Also an [`Iterator`] over `Result<Row, IngresError>`, which stops after the first error.
pub struct RowCursor<'c> {
    statement: OpenStatement<'c>,
    columns: Arc<[ColumnDescriptor]>,
    names: Arc<Vec<String>>,
    name_index: Arc<HashMap<String, usize>>,
    blocks: Vec<ColumnBlock>,
    buffers: Vec<Vec<u8>>,
    segments: Vec<Option<PooledBuffer<'c>>>,
    nulls: Vec<bool>,
    state: CursorState,
    info: Option<QueryInfo>,
    failed: bool,
}

impl std::fmt::Debug for RowCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("columns", &self.names)
            .field("blocks", &self.blocks)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'c> RowCursor<'c> {
    pub(crate) fn new(statement: OpenStatement<'c>, columns: Vec<ColumnDescriptor>) -> Self {
        let env = statement.connection().env();
        let blocks = planner::plan(&columns);
        let buffers = columns
            .iter()
            .map(|column| vec![0u8; planner::buffer_len(column)])
            .collect();
        let segments = columns
            .iter()
            .map(|column| column.is_long().then(|| env.segment_buffer()))
            .collect();
        let names: Arc<Vec<String>> =
            Arc::new(columns.iter().map(|column| column.name.clone()).collect());
        let name_index = Arc::new(Row::build_index(&names));

        Self {
            statement,
            nulls: vec![false; columns.len()],
            columns: columns.into(),
            names,
            name_index,
            blocks,
            buffers,
            segments,
            state: CursorState::Open,
            info: None,
            failed: false,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.columns.get(index).map(ColumnDescriptor::column_type)
    }

    /// Fetch blocks planned for this result.
    #[must_use]
    pub fn blocks(&self) -> &[ColumnBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Affected-row count, known once the result set is exhausted.
    #[must_use]
    pub fn rows_affected(&self) -> Option<i64> {
        self.info.map(|info| info.row_count.unwrap_or(0))
    }

    #[must_use]
    pub fn query_info(&self) -> Option<QueryInfo> {
        self.info
    }

    /// Fetch the next row into the column buffers.
    fn fetch_row(&mut self) -> Result<(), IngresError> {
        match self.state {
            CursorState::Done => return Ok(()),
            CursorState::Closed => return Err(IngresError::StatementClosed),
            CursorState::Open => {}
        }

        let conn = self.statement.connection();
        let engine = conn.engine();
        let stmt = self.statement.handle()?;

        self.nulls.fill(false);
        let mut reached_end = false;

        'blocks: for block in &self.blocks {
            let range = block.columns();
            if let Some(segment) = self.segments[block.start].as_mut() {
                segment.reset();
            }

            loop {
                let mut parm = GetColumnsParm {
                    gen_parm: GenParm::default(),
                    stmt_handle: stmt,
                    row_count: 1,
                    columns: self.buffers[range.clone()]
                        .iter_mut()
                        .map(|buffer| DataValue {
                            null: false,
                            length: 0,
                            value: buffer.as_mut_slice(),
                        })
                        .collect(),
                    more_segments: false,
                };
                let completion = conn.request("get_columns", &mut parm, |e, p| {
                    e.get_columns(p);
                })?;
                check(engine, "get_columns", completion)?;
                if completion.is_no_data() {
                    reached_end = true;
                    break 'blocks;
                }

                for (offset, slot) in parm.columns.iter().enumerate() {
                    if slot.null {
                        self.nulls[block.start + offset] = true;
                    }
                }

                if block.is_segmented()
                    && let (Some(slot), Some(segment)) =
                        (parm.columns.first(), self.segments[block.start].as_mut())
                {
                    let len = usize::from(slot.length).min(slot.value.len());
                    if len > SEGMENT_PREFIX_LEN {
                        segment.extend_from_slice(&slot.value[SEGMENT_PREFIX_LEN..len]);
                    }
                }

                if !parm.more_segments {
                    break;
                }
            }
        }

        if reached_end {
            self.finish()?;
        }
        Ok(())
    }

    /// End of data: collect the final info, then release the statement.
    fn finish(&mut self) -> Result<(), IngresError> {
        self.state = CursorState::Done;
        let info = self.statement.query_info()?;
        self.info = Some(info);
        debug!(rows_affected = ?info.row_count, "result set exhausted");
        self.statement.close()
    }

    /// Fetch the next row and decode it into `out`.
    ///
    /// Returns `Ok(false)` once the result set is exhausted, exactly once per row boundary: a row
    /// is either fully decoded or not produced at all. NULL columns are set to [`Value::Null`].
    ///
    /// # Errors
    /// Returns [`IngresError::ExecutionError`] if `out` has fewer slots than there are columns,
    /// [`IngresError::StatementClosed`] after [`RowCursor::close`], or any fetch or decode error.
    pub fn read_into(&mut self, out: &mut [Value]) -> Result<bool, IngresError> {
        if out.len() < self.columns.len() {
            return Err(IngresError::ExecutionError(format!(
                "output holds {} values but the result has {} columns",
                out.len(),
                self.columns.len()
            )));
        }

        self.fetch_row()?;
        if self.state == CursorState::Done {
            return Ok(false);
        }

        let converter = self.statement.connection().env();
        for (index, column) in self.columns.iter().enumerate() {
            out[index] = if self.nulls[index] {
                Value::Null
            } else {
                let raw = match &self.segments[index] {
                    Some(segment) => segment.as_slice(),
                    None => self.buffers[index].as_slice(),
                };
                decode(column, raw, converter)?
            };
        }
        Ok(true)
    }

    /// Fetch and decode the next row.
    ///
    /// # Errors
    /// Same as [`RowCursor::read_into`].
    pub fn next_row(&mut self) -> Result<Option<Row>, IngresError> {
        let mut values = vec![Value::Null; self.columns.len()];
        if !self.read_into(&mut values)? {
            return Ok(None);
        }
        Ok(Some(Row::with_index(
            Arc::clone(&self.names),
            Arc::clone(&self.name_index),
            values,
        )))
    }

    /// Read every remaining row.
    ///
    /// # Errors
    /// Returns the first fetch or decode error.
    pub fn collect_result_set(mut self) -> Result<ResultSet, IngresError> {
        let mut result = ResultSet::with_capacity(16);
        result.set_column_names(Arc::clone(&self.names));
        while let Some(row) = self.next_row()? {
            result.add_row(row);
        }
        if let Some(rows_affected) = self.rows_affected() {
            result.rows_affected = rows_affected;
        }
        Ok(result)
    }

    /// Release the statement (and any transaction it opened) and the column buffers.
    ///
    /// Idempotent. Later fetches fail with [`IngresError::StatementClosed`].
    ///
    /// # Errors
    /// Returns [`IngresError::Engine`] if the engine fails to close the statement.
    pub fn close(&mut self) -> Result<(), IngresError> {
        if self.state == CursorState::Closed {
            return Ok(());
        }
        self.state = CursorState::Closed;
        self.segments.clear();
        self.buffers.clear();
        if self.statement.is_closed() {
            return Ok(());
        }
        self.statement.close()
    }
}

impl Iterator for RowCursor<'_> {
    type Item = Result<Row, IngresError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
