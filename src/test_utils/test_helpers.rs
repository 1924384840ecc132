//! Helper utilities for testing and development.

use std::sync::Arc;

use super::mock_engine::{MockColumn, MockEngine, Reply};
use crate::config::ConnectOptions;
use crate::environment::Environment;
use crate::error::IngresError;
use crate::protocol::DataType;
use crate::session::Connection;
use crate::types::Value;

/// Target name used by the fixtures.
pub const TEST_TARGET: &str = "testdb";

/// Initialize an environment over `engine`.
///
/// # Errors
/// Returns the initialization error of [`Environment::initialize`].
pub fn mock_environment(engine: &MockEngine) -> Result<Arc<Environment>, IngresError> {
    Environment::initialize(engine.clone())
}

/// Environment plus an autocommit connection to [`TEST_TARGET`].
///
/// # Errors
/// Returns the first initialization or connect error.
pub fn connect(engine: &MockEngine) -> Result<(Arc<Environment>, Connection), IngresError> {
    connect_with(engine, ConnectOptions::new(TEST_TARGET))
}

/// Environment plus a connection opened with `options`.
///
/// # Errors
/// Returns the first initialization or connect error.
pub fn connect_with(
    engine: &MockEngine,
    options: ConnectOptions,
) -> Result<(Arc<Environment>, Connection), IngresError> {
    let env = mock_environment(engine)?;
    let conn = Connection::connect(&env, options)?;
    Ok((env, conn))
}

/// A result of `varchar` columns holding the given strings.
#[must_use]
pub fn text_rows(names: &[&str], rows: &[&[&str]]) -> Reply {
    let columns = names
        .iter()
        .map(|name| MockColumn::new(name, DataType::Varchar, 258))
        .collect();
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|cell| Value::from(*cell)).collect())
        .collect();
    Reply::rows(columns, rows)
}
