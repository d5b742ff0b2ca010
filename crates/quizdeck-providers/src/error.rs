//! Explanation provider errors.

use thiserror::Error;

/// Failures of a remote explanation service.
///
/// These never reach session state: the engine turns them into an
/// unsuccessful `Explanation`.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429; `retry_after_ms` comes from the `Retry-After` header.
    #[error("explainer is rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("explainer returned HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    /// The completion had no usable text.
    #[error("empty response from {0}")]
    EmptyResponse(String),

    #[error("explainer timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    NetworkError(String),
}
