//! Typed failures raised at the warehouse boundary.

use thiserror::Error;

/// Opening a session failed. Returned instead of a half-built handle so callers
/// cannot go on to use a connection that never existed.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("unknown connection profile `{0}` (expected `prod` or `dev`)")]
    UnknownConnection(String),

    #[error("unknown credentials profile `{0}` (expected `public` or `private`)")]
    UnknownCredentials(String),

    #[error("profile `{0}` is missing from the configuration")]
    MissingProfile(String),

    #[error("failed to connect to {dsn}: {message}")]
    Backend { dsn: String, message: String },
}

/// A statement failed to execute.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    /// The backend rejected the statement and said why.
    #[error("{code}: {message}")]
    Database { code: String, message: String },

    /// The statement never reached the backend's diagnostic channel
    /// (bind arity, unsupported parameter type and the like).
    #[error("{0}")]
    Structural(String),
}

impl ExecError {
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        ExecError::Database {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        ExecError::Structural(message.into())
    }

    /// Backend code and message, when the error carries them.
    pub fn diagnostic(&self) -> Option<(&str, &str)> {
        match self {
            ExecError::Database { code, message } => Some((code, message)),
            ExecError::Structural(_) => None,
        }
    }
}

/// One row rejected inside a bulk submission. `offset` is 0-based within the
/// submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchError {
    pub offset: usize,
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}: {}", self.offset, self.code, self.message)
    }
}
