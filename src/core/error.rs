//! Error types for protector operations.

use thiserror::Error;

/// Errors surfaced by a [`Protector`](crate::core::protector::Protector).
///
/// Only construction-time and submit-time argument violations are reported as
/// errors. Every other failure mode (unknown receipts, operations after a
/// terminal state) degrades to a safe no-op so that token accounting stays
/// correct in the face of confused callers.
#[derive(Debug, Error)]
pub enum ProtectorError {
    /// A request asked for more tokens than the protector can ever grant.
    #[error("requested {requested} tokens but the maximum is {max}")]
    OverMaximumTokens {
        /// Tokens asked for by the request.
        requested: u32,
        /// Hard ceiling configured at construction.
        max: u32,
    },

    /// A request asked for zero tokens.
    #[error("a request must ask for at least one token")]
    ZeroTokens,

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime was available to drive background tasks.
    #[error("no tokio runtime available: {0}")]
    Runtime(String),
}
