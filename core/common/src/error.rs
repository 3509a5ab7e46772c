//! Common error types for VaultView.

use thiserror::Error;

/// Top-level error type for VaultView operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The selected vault backend is not available.
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Mounting or unmounting the vault failed.
    #[error("Mount failure: {0}")]
    MountFailure(String),

    /// Malformed or traversing path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Missing, invalid, or expired session.
    #[error("Not logged in")]
    Unauthenticated,

    /// Too many recent attempts from one client.
    #[error("Too many login attempts. Try again later.")]
    RateLimited,

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
