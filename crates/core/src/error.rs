use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to open dataset {path}: {source}", path = path.display())]
    DatasetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset: {0}")]
    DatasetParse(csv::Error),
    #[error("dataset row {row} has an empty Patient ID")]
    EmptyPatientId { row: usize },
    #[error("duplicate Patient ID in dataset: {0}")]
    DuplicatePatientId(String),

    #[error("Patient with ID {0} not found.")]
    NotFound(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("malformed timestamp: {0:?}")]
    MalformedTimestamp(String),
    #[error("malformed report: expected 3 sections, found {found}")]
    MalformedUpstream { found: usize },

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to serialise summary: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialise summary: {0}")]
    Deserialization(serde_json::Error),
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Failures of the external text-generation service or of the stream it returns.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service rejected the credentials (status {status})")]
    Authentication { status: u16 },
    #[error("generation service unavailable: {0}")]
    Unavailable(String),
    #[error("generation service returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("unexpected payload in generation stream: {0}")]
    Protocol(String),
    #[error("generation stream ended before the completion signal")]
    IncompleteStream,
    #[error("generation stream completed without any content")]
    EmptyGeneration,
    #[error("generation output exceeded {limit} characters")]
    OutputLimitExceeded { limit: usize },
    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),
}

impl GenerationError {
    /// Whether another attempt may succeed. Timeouts are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::IncompleteStream)
    }
}

/// Failures of the external HTML to PDF converter.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to launch renderer {path}: {source}", path = path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer exited with {status}: {stderr}")]
    RenderFailed { status: String, stderr: String },
    #[error("renderer output is not a PDF document")]
    InvalidOutput,
    #[error("renderer I/O error: {0}")]
    Io(std::io::Error),
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
}

impl RenderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RenderFailed { .. } | Self::Io(_))
    }
}
