// src/error.rs

//! Error types for debsync

use thiserror::Error;

/// Errors raised by the mirror engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Transfer failed: {0}")]
    TransferError(String),

    #[error("Transfer tool not found: {0}")]
    ToolNotFound(String),

    #[error("Publish failed: {0}")]
    PublishError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error was caused by an operator interrupt
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result type alias for debsync operations
pub type Result<T> = std::result::Result<T, Error>;
