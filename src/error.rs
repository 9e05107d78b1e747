use thiserror::Error;

/// The port scanner could not produce a snapshot. Always transient from the
/// poller's point of view.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("port scan failed: {0}")]
pub struct ScanError(pub String);

impl From<anyhow::Error> for ScanError {
    fn from(err: anyhow::Error) -> Self {
        Self(format!("{:#}", err))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KillError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("process not found")]
    NotFound,
    #[error("incorrect password")]
    BadCredential,
    #[error("{0}")]
    Other(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("failed to save config: {0}")]
pub struct PersistenceError(pub String);

impl From<anyhow::Error> for PersistenceError {
    fn from(err: anyhow::Error) -> Self {
        Self(format!("{:#}", err))
    }
}

/// Errors raised by the watch-list and settings mutations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port {0} is outside 1-65535")]
    InvalidPort(i64),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
