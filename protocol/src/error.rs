//! Protocol error types.

use thiserror::Error;

/// Errors raised while pairing or interpreting packet messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A reply was matched against a request with a different sequence.
    #[error("Sequence mismatch: request {request}, reply {reply}")]
    SequenceMismatch { request: u64, reply: u64 },

    /// Reject code not recognised.
    #[error("Unknown reject code: {0}")]
    UnknownRejectCode(String),
}
