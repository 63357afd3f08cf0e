//! Runtime error types.

use thiserror::Error;

pub use crate::config::error::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Attaching the registry to the event source failed.
    #[error("Event source error: {0}")]
    Source(#[from] backstack_core::SourceError),

    /// The shell stopped receiving back presses.
    #[error("Back event channel is closed")]
    SourceClosed,

    /// The back event channel is at capacity.
    #[error("Back event channel is full")]
    QueueFull,

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
