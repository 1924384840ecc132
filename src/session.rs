//! Connections and their transaction state.

mod transaction;

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::{Completion, execute_and_wait};
use crate::config::ConnectOptions;
use crate::cursor::{ExecResult, RowCursor};
use crate::diagnostics::{aggregate, check};
use crate::environment::Environment;
use crate::error::IngresError;
use crate::protocol::{
    AbortParm, AutocommitParm, CommitParm, ConnHandle, ConnectParm, DisconnectParm, Engine,
    GenParm, Request, RollbackParm, TranHandle,
};
use crate::results::ResultSet;
use crate::statement::{self, Prepared, Statement, StatementOutcome, TransactionContext};
use crate::types::{QueryKind, Value};

pub use transaction::Transaction;

/// Transaction state of one connection. At most one transaction is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionState {
    NoTransaction,
    /// Every statement commits on its own, inside the engine's autocommit transaction.
    Autocommit(TranHandle),
    /// Opened by [`Connection::begin_transaction`]; ends with commit or rollback.
    Explicit(TranHandle),
}

impl TransactionState {
    #[must_use]
    pub fn transaction(self) -> Option<TranHandle> {
        match self {
            TransactionState::NoTransaction => None,
            TransactionState::Autocommit(tran) | TransactionState::Explicit(tran) => Some(tran),
        }
    }
}

/// One authenticated session with the engine.
///
/// A connection may move between threads but is not shared between them: it holds at most one
/// outstanding request at a time, and every method blocks until the engine answers. Cursors
/// borrow the connection, so its transaction state cannot change under an open cursor.
///
/// Dropping a connection disconnects it and logs any failure; [`Connection::disconnect`] reports
/// the failure instead.
pub struct Connection {
    env: Arc<Environment>,
    handle: ConnHandle,
    state: TransactionState,
    options: ConnectOptions,
    connected: bool,
    stalled: Cell<bool>,
    _not_sync: PhantomData<Cell<()>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("handle", &self.handle)
            .field("target", &self.options.target)
            .field("state", &self.state)
            .field("stalled", &self.stalled.get())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a connection and, unless disabled in `options`, enable autocommit on it.
    ///
    /// A half-open connection left behind by a failed connect is aborted before the error is
    /// returned; if enabling autocommit fails the connection is disconnected first.
    ///
    /// # Errors
    /// Returns [`IngresError::ConfigError`] for invalid options, or [`IngresError::Engine`] if
    /// the engine refuses the connection or autocommit.
    pub fn connect(env: &Arc<Environment>, options: ConnectOptions) -> Result<Self, IngresError> {
        options.validate()?;
        let engine = env.engine();
        let timeout = options.timeout();

        let mut parm = ConnectParm {
            gen_parm: GenParm::default(),
            env_handle: env.handle(),
            target: options.target.clone(),
            username: options.username.clone(),
            password: options.password.clone(),
            timeout,
            conn_handle: None,
        };
        let completion = execute_and_wait(engine, "connect", &mut parm, timeout, |e, p| {
            e.connect(p);
        });
        if let Some(err) = aggregate(engine, "connect", completion) {
            if let Some(handle) = parm.conn_handle {
                abort(engine, handle);
            }
            return Err(err.into());
        }
        let handle = parm.conn_handle.ok_or_else(|| {
            IngresError::ConnectionError("engine returned no connection handle".into())
        })?;
        debug!(db = %options.target, ?handle, "connected");

        let mut conn = Connection {
            env: Arc::clone(env),
            handle,
            state: TransactionState::NoTransaction,
            options,
            connected: true,
            stalled: Cell::new(false),
            _not_sync: PhantomData,
        };

        if conn.options.autocommit
            && let Err(err) = conn.enable_autocommit()
        {
            if let Err(close_err) = conn.close_handle() {
                warn!(error = %close_err, "failed to disconnect after autocommit failure");
            }
            return Err(err);
        }
        Ok(conn)
    }

    /// Shorthand for [`Connection::connect`] with default options for `target`.
    ///
    /// # Errors
    /// Same as [`Connection::connect`].
    pub fn open(env: &Arc<Environment>, target: &str) -> Result<Self, IngresError> {
        Self::connect(env, ConnectOptions::new(target))
    }

    #[must_use]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    #[must_use]
    pub fn engine(&self) -> &dyn Engine {
        self.env.engine()
    }

    #[must_use]
    pub fn handle(&self) -> ConnHandle {
        self.handle
    }

    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// True once a request on this connection was left pending by a failed wait. A stalled
    /// connection sends nothing more to the engine, cleanup included.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled.get()
    }

    /// Dispatch a request on this connection and wait for it without a time bound.
    ///
    /// # Errors
    /// Returns [`IngresError::ConnectionStalled`] without contacting the engine once an earlier
    /// request was left pending.
    pub(crate) fn request<P, F>(
        &self,
        op: &'static str,
        parm: &mut P,
        dispatch: F,
    ) -> Result<Completion, IngresError>
    where
        P: Request,
        F: FnOnce(&dyn Engine, &mut P),
    {
        if self.stalled.get() {
            return Err(IngresError::ConnectionStalled);
        }
        let completion = execute_and_wait(self.engine(), op, parm, None, dispatch);
        if completion.pending {
            self.mark_stalled(op);
        }
        Ok(completion)
    }

    /// Pass `result` through, marking the connection stalled if it failed on a pending request.
    pub(crate) fn track<T>(&self, result: Result<T, IngresError>) -> Result<T, IngresError> {
        if let Err(err) = &result
            && let Some(engine_err) = err.engine()
            && engine_err.is_pending()
        {
            self.mark_stalled(engine_err.location());
        }
        result
    }

    fn mark_stalled(&self, op: &'static str) {
        if !self.stalled.replace(true) {
            warn!(op, handle = ?self.handle, "request left pending, connection stalled");
        }
    }

    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    /// The transaction statements run in right now, if any.
    #[must_use]
    pub fn current_transaction(&self) -> Option<TranHandle> {
        self.state.transaction()
    }

    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        matches!(self.state, TransactionState::Autocommit(_))
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        matches!(self.state, TransactionState::Explicit(_))
    }

    /// Turn autocommit on or off. Asking for the mode already in effect does nothing.
    ///
    /// # Errors
    /// See [`Connection::enable_autocommit`] and [`Connection::disable_autocommit`].
    pub fn set_autocommit(&mut self, enabled: bool) -> Result<(), IngresError> {
        match (enabled, self.state) {
            (true, TransactionState::Autocommit(_)) => Ok(()),
            (false, TransactionState::NoTransaction) => Ok(()),
            (true, _) => self.enable_autocommit(),
            (false, _) => self.disable_autocommit(),
        }
    }

    /// `NoTransaction` to `Autocommit`.
    ///
    /// # Errors
    /// Returns [`IngresError::AutocommitWithTransaction`] without contacting the engine if any
    /// transaction is live, or [`IngresError::Engine`] if the engine refuses.
    pub fn enable_autocommit(&mut self) -> Result<(), IngresError> {
        if self.state != TransactionState::NoTransaction {
            return Err(IngresError::AutocommitWithTransaction);
        }

        let mut parm = AutocommitParm {
            conn_handle: Some(self.handle),
            ..AutocommitParm::default()
        };
        let engine = self.engine();
        let completion = self.request("autocommit", &mut parm, |e, p| {
            e.autocommit(p);
        })?;
        if let Some(err) = aggregate(engine, "autocommit", completion) {
            if let Some(tran) = parm.tran_handle {
                self.release_autocommit(tran);
            }
            return Err(err.into());
        }
        let tran = parm.tran_handle.ok_or_else(|| {
            IngresError::ConnectionError("engine returned no autocommit transaction".into())
        })?;

        self.state = TransactionState::Autocommit(tran);
        debug!(handle = ?self.handle, ?tran, "autocommit enabled");
        Ok(())
    }

    /// `Autocommit` to `NoTransaction`.
    ///
    /// # Errors
    /// Returns [`IngresError::AutocommitDuringTransaction`] or
    /// [`IngresError::AutocommitNotEnabled`] without contacting the engine, or
    /// [`IngresError::Engine`] if the engine refuses (autocommit then stays on).
    pub fn disable_autocommit(&mut self) -> Result<(), IngresError> {
        let tran = match self.state {
            TransactionState::Autocommit(tran) => tran,
            TransactionState::Explicit(_) => return Err(IngresError::AutocommitDuringTransaction),
            TransactionState::NoTransaction => return Err(IngresError::AutocommitNotEnabled),
        };

        let mut parm = AutocommitParm {
            tran_handle: Some(tran),
            ..AutocommitParm::default()
        };
        let engine = self.engine();
        let completion = self.request("autocommit", &mut parm, |e, p| {
            e.autocommit(p);
        })?;
        check(engine, "autocommit", completion)?;

        self.state = TransactionState::NoTransaction;
        debug!(handle = ?self.handle, "autocommit disabled");
        Ok(())
    }

    /// Give back an autocommit transaction the engine handed out alongside an error.
    fn release_autocommit(&self, tran: TranHandle) {
        let mut parm = AutocommitParm {
            tran_handle: Some(tran),
            ..AutocommitParm::default()
        };
        let engine = self.engine();
        let released = self
            .request("autocommit", &mut parm, |e, p| {
                e.autocommit(p);
            })
            .and_then(|completion| check(engine, "autocommit", completion));
        if let Err(err) = released {
            warn!(error = %err, ?tran, "failed to release autocommit transaction");
        }
    }

    /// Start an explicit transaction, leaving autocommit first if it is on.
    ///
    /// If the engine refuses the transaction, autocommit is restored when it was on before.
    ///
    /// # Errors
    /// Returns [`IngresError::AlreadyInTransaction`] without contacting the engine, or
    /// [`IngresError::Engine`] if the engine refuses.
    pub fn begin_transaction(&mut self) -> Result<(), IngresError> {
        let was_autocommit = match self.state {
            TransactionState::Explicit(_) => return Err(IngresError::AlreadyInTransaction),
            TransactionState::Autocommit(_) => {
                self.disable_autocommit()?;
                true
            }
            TransactionState::NoTransaction => false,
        };

        match self.open_explicit() {
            Ok(tran) => {
                self.state = TransactionState::Explicit(tran);
                debug!(handle = ?self.handle, ?tran, "transaction started");
                Ok(())
            }
            Err(err) => {
                if was_autocommit && let Err(restore_err) = self.enable_autocommit() {
                    warn!(error = %restore_err, "failed to restore autocommit");
                }
                Err(err)
            }
        }
    }

    /// Run `begin transaction` and keep the transaction the engine opened for it.
    fn open_explicit(&self) -> Result<TranHandle, IngresError> {
        let mut open = statement::open(
            self,
            "begin transaction",
            &[],
            QueryKind::Exec,
            TransactionContext::Implicit,
        )?;
        open.query_info()?;
        let tran = open.adopt_transaction().ok_or_else(|| {
            IngresError::ExecutionError("engine opened no transaction for begin".into())
        })?;
        if let Err(err) = open.close() {
            if let Err(rollback_err) = self.rollback_handle(tran) {
                warn!(error = %rollback_err, ?tran, "failed to roll back abandoned transaction");
            }
            return Err(err);
        }
        Ok(tran)
    }

    /// Start an explicit transaction and return a guard that rolls it back unless committed.
    ///
    /// # Errors
    /// Same as [`Connection::begin_transaction`].
    pub fn begin(&mut self) -> Result<Transaction<'_>, IngresError> {
        self.begin_transaction()?;
        Ok(Transaction::new(self))
    }

    /// Commit the explicit transaction, then restore autocommit if the options ask for it.
    ///
    /// # Errors
    /// Returns [`IngresError::NoActiveTransaction`] without contacting the engine, or
    /// [`IngresError::Engine`]; a failed commit leaves the transaction open.
    pub fn commit(&mut self) -> Result<(), IngresError> {
        let tran = self.explicit_transaction()?;
        let mut parm = CommitParm {
            gen_parm: GenParm::default(),
            tran_handle: tran,
        };
        let engine = self.engine();
        let completion = self.request("commit", &mut parm, |e, p| {
            e.commit(p);
        })?;
        check(engine, "commit", completion)?;
        debug!(handle = ?self.handle, ?tran, "transaction committed");
        self.end_transaction()
    }

    /// Roll the explicit transaction back, then restore autocommit if the options ask for it.
    ///
    /// # Errors
    /// Returns [`IngresError::NoActiveTransaction`] without contacting the engine, or
    /// [`IngresError::Engine`].
    pub fn rollback(&mut self) -> Result<(), IngresError> {
        let tran = self.explicit_transaction()?;
        self.rollback_handle(tran)?;
        debug!(handle = ?self.handle, ?tran, "transaction rolled back");
        self.end_transaction()
    }

    fn explicit_transaction(&self) -> Result<TranHandle, IngresError> {
        match self.state {
            TransactionState::Explicit(tran) => Ok(tran),
            _ => Err(IngresError::NoActiveTransaction),
        }
    }

    fn end_transaction(&mut self) -> Result<(), IngresError> {
        self.state = TransactionState::NoTransaction;
        if self.options.autocommit {
            self.enable_autocommit()?;
        }
        Ok(())
    }

    /// Run a statement that returns no rows in the current transaction.
    ///
    /// # Errors
    /// Returns [`IngresError::TransactionRequired`] when no transaction is live, a parameter
    /// error, or the engine's error.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, IngresError> {
        Statement::new(sql)
            .kind(QueryKind::Exec)
            .params(params)
            .run(self)?
            .into_exec()
    }

    /// Open a cursor over a query in the current transaction.
    ///
    /// # Errors
    /// Same as [`Connection::execute`].
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<RowCursor<'_>, IngresError> {
        Statement::new(sql).params(params).run(self)?.into_cursor()
    }

    /// Run a query and read every row.
    ///
    /// # Errors
    /// Same as [`Connection::execute`], plus any fetch or decode error.
    pub fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<ResultSet, IngresError> {
        self.query(sql, params)?.collect_result_set()
    }

    /// Run an arbitrary [`Statement`].
    ///
    /// # Errors
    /// See [`Statement::run`].
    pub fn run<'c>(&'c self, statement: &Statement<'_>) -> Result<StatementOutcome<'c>, IngresError> {
        statement.run(self)
    }

    /// Keep statement text for repeated execution. Does not contact the engine.
    ///
    /// # Errors
    /// Returns [`IngresError::ExecutionError`] for empty text.
    pub fn prepare(&self, sql: &str) -> Result<Prepared, IngresError> {
        self.prepare_kind(sql, QueryKind::Query)
    }

    /// [`Connection::prepare`] with an explicit query kind.
    ///
    /// # Errors
    /// Returns [`IngresError::ExecutionError`] for empty text.
    pub fn prepare_kind(&self, sql: &str, kind: QueryKind) -> Result<Prepared, IngresError> {
        if sql.trim().is_empty() {
            return Err(IngresError::ExecutionError("cannot prepare empty statement".into()));
        }
        Ok(Prepared::new(sql, kind))
    }

    /// # Errors
    /// Same as [`Connection::execute`].
    pub fn execute_prepared(
        &self,
        prepared: &Prepared,
        params: &[Value],
    ) -> Result<ExecResult, IngresError> {
        prepared
            .statement(params)
            .kind(QueryKind::Exec)
            .run(self)?
            .into_exec()
    }

    /// # Errors
    /// Same as [`Connection::query`].
    pub fn query_prepared(
        &self,
        prepared: &Prepared,
        params: &[Value],
    ) -> Result<RowCursor<'_>, IngresError> {
        prepared.statement(params).run(self)?.into_cursor()
    }

    /// Close the session.
    ///
    /// An explicit transaction still open is rolled back first (logged on failure); autocommit is
    /// switched off. A stalled connection is given up without contacting the engine.
    ///
    /// # Errors
    /// Returns [`IngresError::Engine`] if the engine fails to disconnect, or
    /// [`IngresError::ConnectionStalled`] if an earlier request never completed.
    pub fn disconnect(mut self) -> Result<(), IngresError> {
        self.close_handle()
    }

    fn close_handle(&mut self) -> Result<(), IngresError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        if self.stalled.get() {
            return Err(IngresError::ConnectionStalled);
        }

        match self.state {
            TransactionState::Explicit(_) => {
                if let Err(err) = self.rollback_without_restore() {
                    warn!(error = %err, "failed to roll back open transaction on disconnect");
                }
            }
            TransactionState::Autocommit(_) => {
                if let Err(err) = self.disable_autocommit() {
                    warn!(error = %err, "failed to disable autocommit on disconnect");
                }
            }
            TransactionState::NoTransaction => {}
        }

        let mut parm = DisconnectParm {
            gen_parm: GenParm::default(),
            conn_handle: self.handle,
        };
        let engine = self.engine();
        let completion = self.request("disconnect", &mut parm, |e, p| {
            e.disconnect(p);
        })?;
        check(engine, "disconnect", completion)?;
        debug!(handle = ?self.handle, "disconnected");
        Ok(())
    }

    fn rollback_without_restore(&mut self) -> Result<(), IngresError> {
        let tran = self.explicit_transaction()?;
        self.state = TransactionState::NoTransaction;
        self.rollback_handle(tran)
    }

    fn rollback_handle(&self, tran: TranHandle) -> Result<(), IngresError> {
        let mut parm = RollbackParm {
            gen_parm: GenParm::default(),
            tran_handle: tran,
        };
        let engine = self.engine();
        let completion = self.request("rollback", &mut parm, |e, p| {
            e.rollback(p);
        })?;
        check(engine, "rollback", completion)
    }
}

/// Abort a half-open connection. Failures are only logged.
fn abort(engine: &dyn Engine, handle: ConnHandle) {
    let mut parm = AbortParm {
        gen_parm: GenParm::default(),
        conn_handle: handle,
    };
    let completion = execute_and_wait(engine, "abort", &mut parm, None, |e, p| {
        e.abort(p);
    });
    if let Some(err) = aggregate(engine, "abort", completion) {
        warn!(error = %err, ?handle, "failed to abort connection");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close_handle() {
            warn!(error = %err, handle = ?self.handle, "failed to disconnect on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_state_serializes_with_its_handle() {
        let json = serde_json::to_string(&TransactionState::Autocommit(TranHandle(7))).unwrap();
        assert_eq!(json, r#"{"Autocommit":7}"#);
        let json = serde_json::to_string(&TransactionState::NoTransaction).unwrap();
        assert_eq!(json, r#""NoTransaction""#);
    }
}
