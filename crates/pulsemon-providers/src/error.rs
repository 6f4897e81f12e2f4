/// Errors that can occur when fetching from an upstream monitoring API.
///
/// Every variant is recovered by the retry contract in
/// [`crate::MonitoringProvider::fetch`]; none of them escape the provider.
///
/// # Examples
///
/// ```rust
/// use pulsemon_providers::error::ProviderError;
///
/// let err = ProviderError::MissingCredentials("NEON_API_KEY is required".to_string());
/// assert!(err.to_string().contains("NEON_API_KEY"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A token or project id needed to call the upstream API is not configured.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// HTTP-level error: non-2xx status code from the upstream API.
    #[error("{provider} API error: status={status}, body={body}")]
    HttpError {
        provider: String,
        status: u16,
        body: String,
    },

    /// An underlying HTTP transport error from `reqwest` (includes timeouts).
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The response parsed but did not have the expected top-level shape.
    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: String, message: String },
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ProviderError>;
