/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use pulsemon_storage::error::StorageError;
///
/// let err = StorageError::InvalidValue {
///     column: "event_type",
///     value: "paged".to_string(),
/// };
/// assert!(err.to_string().contains("event_type"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An error reported by SeaORM or the underlying driver.
    #[error("Storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON serialization or deserialization failure (tags_json, data_json columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A column held a value outside its documented domain.
    #[error("Storage: invalid value in column '{column}': {value}")]
    InvalidValue { column: &'static str, value: String },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
