//! Error types for event handlers.

use std::error::Error;

/// Why a handler failed.
///
/// Post-phase failures are logged and counted. Pre-phase failures follow
/// the event's [`FailurePolicy`](crate::FailurePolicy).
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler gave up with a message.
    #[error("{0}")]
    Failed(String),

    /// The handler panicked. The payload is rendered to text.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Any other error the handler propagated with `?`.
    #[error(transparent)]
    Other(Box<dyn Error>),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn other(err: impl Error + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

/// Result type returned by every handler.
pub type HandlerResult<T> = Result<T, HandlerError>;
