//! # Vitals Core
//!
//! Core logic for patient vital-signs reports.
//!
//! This crate holds the data and report pipeline:
//! - Loading the vital-signs dataset and paging through patient identifiers
//! - Building the structured summary of a patient
//! - Streaming diagnosis and recommendations from the text-generation service
//! - Rendering finished reports to PDF
//!
//! **No API concerns**: HTTP servers, request parsing and presentation belong in `api-rest` and
//! `api-shared`.

pub mod config;
pub mod constants;
pub mod dataset;
pub mod document;
pub mod error;
pub mod generation;
pub mod groq;
pub mod report;
pub mod retry;
pub mod summary;

pub use config::{CoreConfig, GenerationConfig, RendererConfig};
pub use dataset::{DatasetStore, PatientPage, PatientRecord};
pub use document::{DocumentService, PdfRenderer, ReportFields, WkhtmltopdfRenderer};
pub use error::{GenerationError, RenderError, ReportError, ReportResult};
pub use generation::{CompletionBackend, Generator};
pub use groq::GroqClient;
pub use report::{Report, ReportService};
pub use retry::RetryPolicy;
pub use summary::StructuredSummary;
pub use vitals_types::PatientId;
