#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed bounding box '{raw}': {reason}")]
    MalformedBox { raw: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
