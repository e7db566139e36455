use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFailureKind {
    Timeout,
    Transport,
    Rejected,
    Malformed,
}

/// Any fault in a remote read or write.
///
/// Callers treat every kind the same way (the link is considered lost); the
/// kind only exists so logs can tell a timeout from a refused request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct RemoteFailure {
    pub kind: RemoteFailureKind,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(kind: RemoteFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteFailureKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RemoteFailureKind::Transport, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(RemoteFailureKind::Rejected, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(RemoteFailureKind::Malformed, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("empty cell address")]
    Empty,
    #[error("invalid column key '{0}': expected ASCII letters")]
    InvalidColumn(String),
    #[error("invalid row '{0}': expected a positive row number")]
    InvalidRow(String),
    #[error("range '{0}' must span a single column")]
    MixedColumns(String),
    #[error("range '{0}' ends before it starts")]
    Inverted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("roster is empty")]
    Empty,
    #[error("student at position {position} has an empty name")]
    EmptyName { position: usize },
    #[error("column {column} is assigned to both '{first}' and '{second}'")]
    DuplicateColumn {
        column: String,
        first: String,
        second: String,
    },
    #[error(transparent)]
    Address(#[from] AddressError),
}
