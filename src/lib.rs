//! Blocking client for the Ingres OpenAPI completion protocol.
//!
//! The engine itself sits behind the [`protocol::Engine`] trait. On top of it the crate provides
//! environments, connections with autocommit and explicit transactions, statement execution with
//! positional parameters, and forward-only cursors that decode rows (long values included) into
//! [`Value`]s.
//!
//! ```rust,no_run
//! use ingres_client::prelude::*;
//! # fn demo(engine: impl ingres_client::protocol::Engine + 'static) -> Result<(), IngresError> {
//! let env = Environment::initialize(engine)?;
//! let mut conn = Connection::connect(&env, ConnectOptions::new("mydb"))?;
//! let users = conn.fetch_all("select id, name from users where id > ?", &[Value::Int32(10)])?;
//! for row in &users.results {
//!     println!("{:?}", row.get("name"));
//! }
//! conn.disconnect()?;
//! # Ok(()) }
//! ```

pub mod adapter;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod descriptor;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod params;
pub mod planner;
pub mod pool;
pub mod prelude;
pub mod protocol;
pub mod results;
pub mod session;
pub mod statement;
pub mod types;

#[cfg(feature = "tokio")]
pub mod asynchronous;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConnectOptions, ConnectOptionsBuilder};
pub use cursor::{CursorState, ExecResult, RowCursor};
pub use descriptor::{ColumnDescriptor, ColumnType};
pub use diagnostics::EngineError;
pub use environment::Environment;
pub use error::IngresError;
pub use results::{ResultSet, Row};
pub use session::{Connection, Transaction, TransactionState};
pub use statement::{Prepared, Statement, StatementOutcome, TransactionContext};
pub use types::{QueryKind, ScanType, Value};

#[cfg(feature = "tokio")]
pub use asynchronous::AsyncConnection;
