//! Error types for fanlog

use thiserror::Error;

/// Top-level error type for fanlog
#[derive(Debug, Error)]
pub enum FanlogError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

/// Errors surfaced by the event buffer
///
/// `Cancelled` and `Closed` are ordinary outcomes of a read. The remaining
/// variants report a caller breaking the buffer's preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("Read cancelled")]
    Cancelled,

    #[error("Buffer closed")]
    Closed,

    #[error("Cannot append an empty batch")]
    EmptyBatch,

    #[error("Successor already resolved")]
    AlreadyResolved,

    #[error("Buffer was spliced onto another buffer and accepts no appends")]
    Spliced,
}

impl BufferError {
    /// The caller's cancellation fired or its timeout elapsed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The buffer will never produce more data
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The error reports a bug in the caller rather than a runtime condition
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::EmptyBatch | Self::AlreadyResolved | Self::Spliced)
    }
}

/// Errors related to event values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),
}

/// Result type alias for fanlog operations
pub type FanlogResult<T> = Result<T, FanlogError>;
