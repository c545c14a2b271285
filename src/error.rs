use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtranError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("Batch alignment error: {0}")]
    Alignment(String),

    #[error("Alignment failure: expected {expected} entries, got {actual}")]
    AlignmentFailure { expected: usize, actual: usize },

    #[error("Subtitle parse error: {0}")]
    SubtitleParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Translation run cancelled")]
    Cancelled,
}

impl SubtranError {
    /// Whether a batch attempt that failed with this error may be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Completion(_) | Self::Alignment(_) | Self::Http(_) | Self::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SubtranError>;
