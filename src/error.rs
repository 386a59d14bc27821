//! Typed failures for provider calls and read-only checks.
//!
//! Structured logging is the caller's responsibility. These types carry the
//! context needed to decide what to do: the orchestrator surfaces
//! [`ProviderError`]s from generation as an error result, the retrieval
//! index swallows them for embeddings, and [`CheckError`]s are folded into
//! the tool output the model sees next.

use thiserror::Error;

/// Failures reported by a [`TextGenerator`](crate::generator::TextGenerator).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider cannot be used at all (missing credentials, disabled).
    #[error("{provider} is unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// Non-2xx HTTP response.
    #[error("{status} - {body}")]
    Http { status: u16, body: String },

    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response format: {reason}")]
    Malformed { reason: String },

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection or other transport-level failure.
    #[error("connection failed: {reason}")]
    Transport { reason: String },
}

impl ProviderError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Transport { .. } => true,
            // Timeouts are final
            ProviderError::Timeout { .. }
            | ProviderError::Unavailable { .. }
            | ProviderError::Malformed { .. } => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { secs: timeout_secs }
        } else if err.is_decode() {
            ProviderError::Malformed {
                reason: err.to_string(),
            }
        } else {
            ProviderError::Transport {
                reason: err.to_string(),
            }
        }
    }
}

/// Failures while running a read-only check command.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Command timed out.")]
    Timeout { secs: u64 },

    #[error("Error executing check: {reason}")]
    Spawn { reason: String },
}
