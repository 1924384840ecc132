use tracing::warn;

use super::Connection;
use crate::cursor::{ExecResult, RowCursor};
use crate::error::IngresError;
use crate::results::ResultSet;
use crate::statement::Prepared;
use crate::types::Value;

/// Explicit transaction that holds the connection until commit or rollback.
///
/// Dropping the guard without finishing it rolls the transaction back and logs any failure.
///
/// ```rust,no_run
/// use ingres_client::prelude::*;
///
/// # fn demo(conn: &mut Connection) -> Result<(), IngresError> {
/// let tx = conn.begin()?;
/// tx.execute("insert into t values (?)", &[Value::Int32(1)])?;
/// tx.commit()?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Transaction<'c> {
    conn: &'c mut Connection,
    finished: bool,
}

impl<'c> Transaction<'c> {
    pub(crate) fn new(conn: &'c mut Connection) -> Self {
        Self {
            conn,
            finished: false,
        }
    }

    /// The connection, for statements not covered by the shorthands below.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &*self.conn
    }

    /// # Errors
    /// See [`Connection::execute`].
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, IngresError> {
        self.conn.execute(sql, params)
    }

    /// # Errors
    /// See [`Connection::query`].
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<RowCursor<'_>, IngresError> {
        self.conn.query(sql, params)
    }

    /// # Errors
    /// See [`Connection::fetch_all`].
    pub fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<ResultSet, IngresError> {
        self.conn.fetch_all(sql, params)
    }

    /// # Errors
    /// See [`Connection::execute_prepared`].
    pub fn execute_prepared(
        &self,
        prepared: &Prepared,
        params: &[Value],
    ) -> Result<ExecResult, IngresError> {
        self.conn.execute_prepared(prepared, params)
    }

    /// Commit and hand the connection back to its ambient mode.
    ///
    /// # Errors
    /// Returns the engine's error; the transaction is then rolled back when the guard drops.
    pub fn commit(mut self) -> Result<(), IngresError> {
        self.conn.commit()?;
        self.finished = true;
        Ok(())
    }

    /// # Errors
    /// Returns the engine's error.
    pub fn rollback(mut self) -> Result<(), IngresError> {
        self.finished = true;
        self.conn.rollback()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished || !self.conn.in_transaction() {
            return;
        }
        if let Err(err) = self.conn.rollback() {
            warn!(error = %err, "failed to roll back unfinished transaction");
        }
    }
}
