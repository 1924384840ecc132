use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::IngresError;
use crate::session::Connection;

fn default_autocommit() -> bool {
    true
}

/// Options for opening a [`Connection`].
///
/// Deserializable so hosts can keep them in a config file. The password is accepted on input but
/// never serialized back out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Target database, e.g. `dbname` or `node::dbname`.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Bound on the connect request, in milliseconds. Absent means wait forever. Later requests
    /// always wait until the engine completes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Enable autocommit as soon as the connection is open, and restore it after every explicit
    /// transaction.
    #[serde(default = "default_autocommit")]
    pub autocommit: bool,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("target", &self.target)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("autocommit", &self.autocommit)
            .finish()
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            username: None,
            password: None,
            timeout_ms: None,
            autocommit: true,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check the options without contacting the engine.
    ///
    /// # Errors
    /// Returns [`IngresError::ConfigError`] for an empty target or half-specified credentials.
    pub fn validate(&self) -> Result<(), IngresError> {
        if self.target.trim().is_empty() {
            return Err(IngresError::ConfigError(
                "connection target must not be empty".into(),
            ));
        }
        match (&self.username, &self.password) {
            (Some(_), None) => Err(IngresError::ConfigError(
                "username given without a password".into(),
            )),
            (None, Some(_)) => Err(IngresError::ConfigError(
                "password given without a username".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct ConnectOptionsBuilder {
    opts: ConnectOptions,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            opts: ConnectOptions::new(target),
        }
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.opts.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.opts.autocommit = autocommit;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectOptions {
        self.opts
    }

    /// Open a connection with the built options.
    ///
    /// # Errors
    /// Returns `IngresError` if the options are invalid or the engine refuses the connection.
    pub fn connect(self, env: &Arc<Environment>) -> Result<Connection, IngresError> {
        Connection::connect(env, self.finish())
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn builder(target: impl Into<String>) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_not_serialized() {
        let opts = ConnectOptions::builder("demodb")
            .username("ingres")
            .password("secret")
            .timeout(Duration::from_secs(2))
            .finish();
        let json = serde_json::to_string(&opts).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"timeout_ms\":2000"));
        assert!(!format!("{opts:?}").contains("secret"));
    }

    #[test]
    fn defaults_when_deserializing() {
        let opts: ConnectOptions = serde_json::from_str(r#"{"target":"demodb"}"#).unwrap();
        assert!(opts.autocommit);
        assert_eq!(opts.timeout(), None);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn validation() {
        assert!(matches!(
            ConnectOptions::new("  ").validate(),
            Err(IngresError::ConfigError(_))
        ));
        let half = ConnectOptions::builder("db").username("u").finish();
        assert!(matches!(half.validate(), Err(IngresError::ConfigError(_))));
        assert!(
            ConnectOptions::new("db")
                .with_credentials("u", "p")
                .validate()
                .is_ok()
        );
    }
}
