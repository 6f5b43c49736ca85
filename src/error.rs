use thiserror::Error;

#[derive(Error, Debug)]
pub enum HallOfFameError {
    #[error("Missing required metric: {0}")]
    MissingMetric(String),

    #[error("Duplicate of {nearest_id} (similarity {similarity:.3}, shared features: {shared_features:?})")]
    Duplicate {
        nearest_id: String,
        similarity: f64,
        shared_features: Vec<String>,
    },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Invalid query argument: {0}")]
    InvalidQueryArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HallOfFameError>;
