//! Constants used throughout the vitals core crate.
//!
//! Defaults in this module are the values used when the corresponding environment variable is
//! unset; see [`crate::config`].

/// Default location of the vital-signs dataset, relative to the working directory.
pub const DEFAULT_DATASET_PATH: &str = "human_vital_signs_dataset_2024.csv";

/// Number of patient identifiers returned per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Separator between the summary, diagnosis and recommendations of a joined report.
pub const REPORT_DELIMITER: &str = "\n\n";

/// Number of sections in a joined report.
pub const REPORT_SECTION_COUNT: usize = 3;

/// Timestamp layout stored in the dataset, after fractional seconds are discarded.
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-readable timestamp layout used in summaries and rendered documents.
pub const REPORT_TIMESTAMP_FORMAT: &str = "%d %b %Y, %I:%M %p";

/// OpenAI-compatible root of the Groq API.
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Model used for both diagnosis and recommendations.
pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TOP_P: f32 = 1.0;

/// Upper bound on one streamed generation, from request to completion signal.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

/// Attempts per external call, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Accumulated characters after which a generation stream is abandoned.
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 32_000;

pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

/// Executable used to convert HTML to PDF. Resolved through `PATH` when not absolute.
pub const DEFAULT_WKHTMLTOPDF_PATH: &str = "wkhtmltopdf";

pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;
