//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. Request
//! handlers never read process-wide environment variables, which keeps behaviour consistent in
//! multi-threaded runtimes and test harnesses.

use crate::constants::{
    DEFAULT_DATASET_PATH, DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_GROQ_BASE_URL,
    DEFAULT_GROQ_MODEL, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_MAX_OUTPUT_CHARS, DEFAULT_MAX_TOKENS, DEFAULT_PAGE_SIZE, DEFAULT_RENDER_TIMEOUT_SECS,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, DEFAULT_WKHTMLTOPDF_PATH,
};
use crate::retry::RetryPolicy;
use crate::{ReportError, ReportResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Settings for the external text-generation service.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    /// Upper bound on a single streamed generation.
    pub timeout: Duration,
    pub max_output_chars: usize,
    pub retry: RetryPolicy,
}

impl GenerationConfig {
    /// Generation settings with the product defaults for everything but the credentials.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_GROQ_BASE_URL.into(),
            model: DEFAULT_GROQ_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Settings for the external HTML to PDF converter.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub executable: PathBuf,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_WKHTMLTOPDF_PATH),
            timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    dataset_path: PathBuf,
    page_size: usize,
    generation: GenerationConfig,
    renderer: RendererConfig,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidConfig` if:
    /// - the API key or model is empty,
    /// - the page size is zero,
    /// - a timeout is zero,
    /// - a retry policy allows fewer than two attempts.
    pub fn new(
        dataset_path: PathBuf,
        page_size: usize,
        generation: GenerationConfig,
        renderer: RendererConfig,
    ) -> ReportResult<Self> {
        if generation.api_key.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "GROQ_API_KEY cannot be empty".into(),
            ));
        }
        if generation.model.trim().is_empty() {
            return Err(ReportError::InvalidConfig("model cannot be empty".into()));
        }
        if page_size == 0 {
            return Err(ReportError::InvalidConfig(
                "page size must be at least 1".into(),
            ));
        }
        if generation.timeout.is_zero() || renderer.timeout.is_zero() {
            return Err(ReportError::InvalidConfig(
                "timeouts must be greater than zero".into(),
            ));
        }
        if generation.retry.max_attempts < 2 || renderer.retry.max_attempts < 2 {
            return Err(ReportError::InvalidConfig(
                "external calls must allow at least one retry (max attempts >= 2)".into(),
            ));
        }

        Ok(Self {
            dataset_path,
            page_size,
            generation,
            renderer,
        })
    }

    /// Build the configuration from a variable lookup, typically `std::env::var`.
    ///
    /// Unset or blank variables fall back to the defaults in [`crate::constants`]; only
    /// `GROQ_API_KEY` is required.
    pub fn from_lookup<F>(lookup: F) -> ReportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = value("GROQ_API_KEY").ok_or_else(|| {
            ReportError::InvalidConfig("GROQ_API_KEY must be set".into())
        })?;

        let max_attempts = parse_or(
            "GENERATION_MAX_ATTEMPTS",
            value("GENERATION_MAX_ATTEMPTS"),
            DEFAULT_MAX_ATTEMPTS,
        )?;
        let retry = RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        };

        let mut generation = GenerationConfig::new(api_key);
        if let Some(base_url) = value("GROQ_BASE_URL") {
            generation.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = value("GROQ_MODEL") {
            generation.model = model;
        }
        generation.timeout = Duration::from_secs(parse_or(
            "GENERATION_TIMEOUT_SECS",
            value("GENERATION_TIMEOUT_SECS"),
            DEFAULT_GENERATION_TIMEOUT_SECS,
        )?);
        generation.retry = retry.clone();

        let renderer = RendererConfig {
            executable: value("WKHTMLTOPDF_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WKHTMLTOPDF_PATH)),
            timeout: Duration::from_secs(parse_or(
                "RENDER_TIMEOUT_SECS",
                value("RENDER_TIMEOUT_SECS"),
                DEFAULT_RENDER_TIMEOUT_SECS,
            )?),
            retry,
        };

        let dataset_path = value("VITALS_DATASET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH));
        let page_size = parse_or(
            "VITALS_PAGE_SIZE",
            value("VITALS_PAGE_SIZE"),
            DEFAULT_PAGE_SIZE,
        )?;

        Self::new(dataset_path, page_size, generation, renderer)
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn renderer(&self) -> &RendererConfig {
        &self.renderer
    }
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> ReportResult<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            ReportError::InvalidConfig(format!("{name} has an invalid value: {raw:?}"))
        }),
    }
}
