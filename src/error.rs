use thiserror::Error;

use crate::diagnostics::EngineError;
use crate::protocol::DataType;

#[derive(Debug, Error)]
pub enum IngresError {
    /// Failure status and/or diagnostic records reported by the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("transaction required")]
    TransactionRequired,

    #[error("already in transaction")]
    AlreadyInTransaction,

    #[error("no explicit transaction is active")]
    NoActiveTransaction,

    #[error("can't enable autocommit with active transactions")]
    AutocommitWithTransaction,

    #[error("can't disable autocommit: autocommit is not enabled")]
    AutocommitNotEnabled,

    #[error("can't disable autocommit: there is ongoing transaction")]
    AutocommitDuringTransaction,

    #[error("statement is already closed")]
    StatementClosed,

    #[error("connection has a request the engine never completed")]
    ConnectionStalled,

    #[error("type is not supported: {0}")]
    UnsupportedType(DataType),

    #[error("environment is still used by {0} connection(s)")]
    EnvironmentInUse(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("conversion error: {0}")]
    ConversionError(String),

    #[cfg(feature = "tokio")]
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

impl IngresError {
    /// The engine error behind this one, if the engine reported it.
    #[must_use]
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            IngresError::Engine(err) => Some(err),
            _ => None,
        }
    }

    /// SQLSTATE of the engine error, if any.
    #[must_use]
    pub fn sqlstate(&self) -> Option<&str> {
        self.engine().and_then(EngineError::sqlstate)
    }

    /// The engine may still be working on the request that produced this error.
    #[must_use]
    pub fn is_request_pending(&self) -> bool {
        self.engine().is_some_and(EngineError::is_pending)
    }

    /// Raised locally for a violated precondition, without contacting the engine.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            IngresError::TransactionRequired
                | IngresError::AlreadyInTransaction
                | IngresError::NoActiveTransaction
                | IngresError::AutocommitWithTransaction
                | IngresError::AutocommitNotEnabled
                | IngresError::AutocommitDuringTransaction
                | IngresError::StatementClosed
                | IngresError::ParameterError(_)
                | IngresError::ConfigError(_)
        )
    }
}
