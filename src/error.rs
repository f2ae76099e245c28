use thiserror::Error;

/// Failures returned by vault operations. Display text is the only thing a
/// caller ever sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Vault item {0} not found")]
    ItemNotFound(i64),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Detail is kept for logs and never rendered.
    #[error("Internal error")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
