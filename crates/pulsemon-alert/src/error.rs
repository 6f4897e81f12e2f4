#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("unknown alert condition: {0} (expected one of gt, lt, gte, lte, eq)")]
    UnknownCondition(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
