//! Convenient imports for common functionality.
//!
//! This module re-exports the types most programs need to open a connection, run statements and
//! read their results.

pub use crate::config::ConnectOptions;
pub use crate::cursor::{CursorState, ExecResult, RowCursor};
pub use crate::descriptor::{ColumnDescriptor, ColumnType};
pub use crate::diagnostics::EngineError;
pub use crate::environment::Environment;
pub use crate::error::IngresError;
pub use crate::results::{ResultSet, Row};
pub use crate::session::{Connection, Transaction, TransactionState};
pub use crate::statement::{Prepared, Statement, StatementOutcome, TransactionContext};
pub use crate::types::{QueryKind, ScanType, Value};

#[cfg(feature = "tokio")]
pub use crate::asynchronous::AsyncConnection;
