//! Async wrapper over the blocking [`Connection`], for tokio hosts.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ConnectOptions;
use crate::cursor::ExecResult;
use crate::environment::Environment;
use crate::error::IngresError;
use crate::results::ResultSet;
use crate::session::{Connection, TransactionState};
use crate::types::Value;

/// A [`Connection`] driven from async code.
///
/// Every call runs on tokio's blocking pool while holding the connection lock, so calls on one
/// connection are serialized and the async executor never blocks on the engine. Cursors cannot
/// cross an `.await`; queries therefore return fully materialized [`ResultSet`]s.
#[derive(Clone, Debug)]
pub struct AsyncConnection {
    inner: Arc<Mutex<Connection>>,
}

impl AsyncConnection {
    /// Connect on the blocking pool.
    ///
    /// # Errors
    /// Same as [`Connection::connect`], plus [`IngresError::Join`] if the blocking task panics.
    pub async fn connect(
        env: Arc<Environment>,
        options: ConnectOptions,
    ) -> Result<Self, IngresError> {
        let conn =
            tokio::task::spawn_blocking(move || Connection::connect(&env, options)).await??;
        Ok(Self::from_connection(conn))
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `func` with exclusive access to the connection on the blocking pool.
    ///
    /// # Errors
    /// Whatever `func` returns, plus [`IngresError::Join`] if it panics.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, IngresError>
    where
        F: FnOnce(&mut Connection) -> Result<R, IngresError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.blocking_lock();
            func(&mut *guard)
        })
        .await?
    }

    /// # Errors
    /// See [`Connection::execute`].
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<ExecResult, IngresError> {
        let sql = sql.into();
        self.with_connection(move |conn| conn.execute(&sql, &params))
            .await
    }

    /// # Errors
    /// See [`Connection::fetch_all`].
    pub async fn fetch_all(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<ResultSet, IngresError> {
        let sql = sql.into();
        self.with_connection(move |conn| conn.fetch_all(&sql, &params))
            .await
    }

    /// # Errors
    /// See [`Connection::set_autocommit`].
    pub async fn set_autocommit(&self, enabled: bool) -> Result<(), IngresError> {
        self.with_connection(move |conn| conn.set_autocommit(enabled))
            .await
    }

    /// # Errors
    /// See [`Connection::begin_transaction`].
    pub async fn begin_transaction(&self) -> Result<(), IngresError> {
        self.with_connection(Connection::begin_transaction).await
    }

    /// # Errors
    /// See [`Connection::commit`].
    pub async fn commit(&self) -> Result<(), IngresError> {
        self.with_connection(Connection::commit).await
    }

    /// # Errors
    /// See [`Connection::rollback`].
    pub async fn rollback(&self) -> Result<(), IngresError> {
        self.with_connection(Connection::rollback).await
    }

    pub async fn transaction_state(&self) -> TransactionState {
        self.inner.lock().await.transaction_state()
    }

    /// Disconnect once this is the last handle to the connection.
    ///
    /// # Errors
    /// Returns [`IngresError::ConnectionError`] while clones of this handle are alive, or the
    /// error of [`Connection::disconnect`].
    pub async fn disconnect(self) -> Result<(), IngresError> {
        let mutex = Arc::try_unwrap(self.inner).map_err(|shared| {
            IngresError::ConnectionError(format!(
                "connection is still shared by {} handle(s)",
                Arc::strong_count(&shared) - 1
            ))
        })?;
        let conn = mutex.into_inner();
        tokio::task::spawn_blocking(move || conn.disconnect()).await?
    }
}
