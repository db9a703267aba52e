use chrono::NaiveDateTime;

use crate::validation::ValidationErrors;

/// Errors that can occur while generating, rendering, exporting or storing graphs
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The test window is empty or reversed
    #[error("Invalid time range: end {end} must be after start {start}")]
    InvalidTimeRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// One or more fields failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A duration or offset lands outside the representable calendar range
    #[error("Time offset out of range: {0}")]
    OutOfRange(String),

    /// Requested export format is not supported
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Drawing or image encoding failed
    #[error("Rendering error: {0}")]
    Render(String),

    /// Missing user, history entry or file
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication or registration failure
    #[error("Authentication error: {0}")]
    Auth(String),

    /// I/O error reading or writing storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding error for stored settings
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Result type used throughout the crate
pub type GraphResult<T> = std::result::Result<T, GraphError>;

impl From<ValidationErrors> for GraphError {
    fn from(errors: ValidationErrors) -> Self {
        GraphError::Validation(errors)
    }
}
