/// Errors that can occur while delivering a notification.
///
/// # Examples
///
/// ```rust
/// use pulsemon_notify::error::NotifyError;
///
/// let err = NotifyError::ApiError {
///     service: "slack".to_string(),
///     status: 404,
///     body: "no_service".to_string(),
/// };
/// assert!(err.to_string().contains("status=404"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// An HTTP request to the notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The external API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Notify: JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
