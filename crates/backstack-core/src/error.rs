//! Error types for the core crate.
//!
//! Registration, removal and dispatch never fail; the only fallible seam is
//! connecting a registry to an event source.

use thiserror::Error;

/// Errors that can occur while subscribing to a back event source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source no longer accepts subscriptions.
    #[error("back event source '{source_name}' is closed")]
    Closed {
        /// Name of the closed source.
        source_name: String,
    },

    /// The source refused the listener.
    #[error("subscription rejected: {0}")]
    Rejected(String),
}

impl SourceError {
    /// Creates a closed-source error.
    pub fn closed(source_name: impl Into<String>) -> Self {
        Self::Closed {
            source_name: source_name.into(),
        }
    }

    /// Creates a rejection error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
