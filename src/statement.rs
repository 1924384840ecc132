//! Statement execution: from query text to an open cursor or an affected-row count.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cursor::{ExecResult, RowCursor};
use crate::descriptor;
use crate::diagnostics::{aggregate, check};
use crate::error::IngresError;
use crate::params;
use crate::protocol::{
    CloseParm, GenParm, GetQueryInfoParm, QueryInfo, QueryParm, RollbackParm, StmtHandle,
    TranHandle,
};
use crate::session::Connection;
use crate::types::{QueryKind, Value};

/// Which transaction a statement runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionContext {
    /// The connection's autocommit or explicit transaction. Without one the statement fails with
    /// [`IngresError::TransactionRequired`].
    #[default]
    Ambient,
    /// The connection's transaction if there is one; otherwise the engine opens a new one that
    /// belongs to the statement and is rolled back when the statement closes.
    Implicit,
}

/// A statement ready to run: text, kind, parameters and transaction policy.
///
/// ```rust,no_run
/// use ingres_client::prelude::*;
///
/// # fn demo(conn: &Connection) -> Result<(), IngresError> {
/// let params = [Value::Int32(5)];
/// let outcome = Statement::new("select reltid, relid from iirelation where reltid < ?")
///     .params(&params)
///     .run(conn)?;
/// let mut cursor = outcome.into_cursor()?;
/// while let Some(row) = cursor.next_row()? {
///     println!("{:?}", row.get("relid"));
/// }
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Statement<'a> {
    text: &'a str,
    kind: QueryKind,
    context: TransactionContext,
    params: &'a [Value],
}

impl<'a> Statement<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            kind: QueryKind::Query,
            context: TransactionContext::Ambient,
            params: &[],
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: QueryKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn context(mut self, context: TransactionContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn params(mut self, params: &'a [Value]) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Run the statement on `conn`.
    ///
    /// [`QueryKind::Exec`] statements are closed before this returns and yield
    /// [`StatementOutcome::Executed`]; every other kind yields an open cursor.
    ///
    /// # Errors
    /// Returns [`IngresError::ParameterError`] or [`IngresError::TransactionRequired`] before
    /// contacting the engine, or [`IngresError::Engine`] if the engine rejects the statement. Any
    /// statement handle obtained before the failure is closed first.
    pub fn run<'c>(&self, conn: &'c Connection) -> Result<StatementOutcome<'c>, IngresError> {
        let mut open = open(conn, self.text, self.params, self.kind, self.context)?;

        if !self.kind.has_result_set() {
            let info = open.query_info()?;
            open.close()?;
            return Ok(StatementOutcome::Executed(ExecResult::from(info)));
        }

        let columns = conn.track(descriptor::resolve(conn.engine(), open.handle()?))?;
        debug!(columns = columns.len(), "result described");
        Ok(StatementOutcome::Rows(RowCursor::new(open, columns)))
    }
}

/// What running a statement produced.
#[derive(Debug)]
pub enum StatementOutcome<'c> {
    Rows(RowCursor<'c>),
    Executed(ExecResult),
}

impl<'c> StatementOutcome<'c> {
    /// # Errors
    /// Returns [`IngresError::ExecutionError`] if the statement produced no result set.
    pub fn into_cursor(self) -> Result<RowCursor<'c>, IngresError> {
        match self {
            StatementOutcome::Rows(cursor) => Ok(cursor),
            StatementOutcome::Executed(_) => Err(IngresError::ExecutionError(
                "statement returned no result set".into(),
            )),
        }
    }

    /// # Errors
    /// Returns [`IngresError::ExecutionError`] if the statement produced a result set.
    pub fn into_exec(self) -> Result<ExecResult, IngresError> {
        match self {
            StatementOutcome::Executed(result) => Ok(result),
            StatementOutcome::Rows(_) => Err(IngresError::ExecutionError(
                "statement returned a result set".into(),
            )),
        }
    }
}

/// Statement text kept for repeated execution with different parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    sql: Arc<str>,
    kind: QueryKind,
}

impl Prepared {
    pub(crate) fn new(sql: &str, kind: QueryKind) -> Self {
        Self {
            sql: Arc::from(sql),
            kind,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    #[must_use]
    pub fn statement<'a>(&'a self, params: &'a [Value]) -> Statement<'a> {
        Statement::new(&self.sql).kind(self.kind).params(params)
    }
}

/// Submit a query and send its parameters, leaving the statement open.
pub(crate) fn open<'c>(
    conn: &'c Connection,
    text: &str,
    params: &[Value],
    kind: QueryKind,
    context: TransactionContext,
) -> Result<OpenStatement<'c>, IngresError> {
    let encoded = params::encode(params)?;

    let (tran_handle, owns_transaction) = match (conn.current_transaction(), context) {
        (Some(tran), _) => (Some(tran), false),
        (None, TransactionContext::Ambient) => return Err(IngresError::TransactionRequired),
        (None, TransactionContext::Implicit) => (None, true),
    };

    let engine = conn.engine();
    let mut parm = QueryParm {
        gen_parm: GenParm::default(),
        conn_handle: conn.handle(),
        kind,
        text: text.to_owned(),
        has_parameters: !encoded.is_empty(),
        tran_handle,
        stmt_handle: None,
    };
    debug!(?kind, sql = text, params = encoded.len(), "running statement");
    let completion = conn.request("query", &mut parm, |e, p| {
        e.query(p);
    })?;

    let mut statement = OpenStatement {
        conn,
        stmt: parm.stmt_handle,
        owned_tran: if owns_transaction { parm.tran_handle } else { None },
    };
    if let Some(err) = aggregate(engine, "query", completion) {
        statement.abandon();
        return Err(err.into());
    }
    let stmt = statement.handle().map_err(|_| {
        IngresError::ExecutionError("engine returned no statement handle".into())
    })?;

    if !encoded.is_empty() {
        conn.track(params::send(engine, stmt, &encoded))?;
    }
    Ok(statement)
}

/// Handles held by one running statement: the statement itself and, when the statement opened
/// it, its transaction. Both are released exactly once, by [`OpenStatement::close`] or on drop.
#[derive(Debug)]
pub(crate) struct OpenStatement<'c> {
    conn: &'c Connection,
    stmt: Option<StmtHandle>,
    owned_tran: Option<TranHandle>,
}

impl<'c> OpenStatement<'c> {
    pub(crate) fn connection(&self) -> &'c Connection {
        self.conn
    }

    pub(crate) fn handle(&self) -> Result<StmtHandle, IngresError> {
        self.stmt.ok_or(IngresError::StatementClosed)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.stmt.is_none()
    }

    pub(crate) fn query_info(&self) -> Result<QueryInfo, IngresError> {
        let engine = self.conn.engine();
        let mut parm = GetQueryInfoParm {
            gen_parm: GenParm::default(),
            stmt_handle: self.handle()?,
            info: QueryInfo::default(),
        };
        let completion = self.conn.request("get_query_info", &mut parm, |e, p| {
            e.get_query_info(p);
        })?;
        check(engine, "get_query_info", completion)?;
        Ok(parm.info)
    }

    /// Hand the statement's own transaction over to the caller; closing no longer rolls it back.
    pub(crate) fn adopt_transaction(&mut self) -> Option<TranHandle> {
        self.owned_tran.take()
    }

    /// Close the statement, then roll back the transaction it opened.
    ///
    /// A failing close is returned; a failing rollback is only logged. On a stalled connection
    /// both handles are given up without contacting the engine.
    pub(crate) fn close(&mut self) -> Result<(), IngresError> {
        let engine = self.conn.engine();

        let mut result = Ok(());
        if let Some(stmt) = self.stmt.take() {
            let mut parm = CloseParm {
                gen_parm: GenParm::default(),
                stmt_handle: stmt,
            };
            result = self
                .conn
                .request("close", &mut parm, |e, p| {
                    e.close(p);
                })
                .and_then(|completion| check(engine, "close", completion));
        }

        if let Some(tran) = self.owned_tran.take() {
            let mut parm = RollbackParm {
                gen_parm: GenParm::default(),
                tran_handle: tran,
            };
            let rolled_back = self
                .conn
                .request("rollback", &mut parm, |e, p| {
                    e.rollback(p);
                })
                .and_then(|completion| check(engine, "rollback", completion));
            if let Err(err) = rolled_back {
                warn!(error = %err, ?tran, "failed to roll back statement transaction");
            }
        }

        result
    }

    /// Release everything after a failure that is about to be reported.
    fn abandon(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close statement after error");
        }
    }
}

impl Drop for OpenStatement<'_> {
    fn drop(&mut self) {
        if self.stmt.is_some() || self.owned_tran.is_some() {
            self.abandon();
        }
    }
}
