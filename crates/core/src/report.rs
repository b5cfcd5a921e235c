//! Report assembly.
//!
//! A report is the structured summary of one patient plus two generated sections. It travels as
//! structured data end to end; the delimiter-joined string is only a transport form kept for
//! clients that expect a single `report` field.

use crate::constants::{REPORT_DELIMITER, REPORT_SECTION_COUNT};
use crate::dataset::PatientRecord;
use crate::generation::Generator;
use crate::summary::{build_summary, StructuredSummary};
use crate::{ReportError, ReportResult};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A fully assembled report.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: StructuredSummary,
    pub diagnosis: String,
    pub recommendations: String,
}

/// The three raw sections of a joined report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSections {
    pub summary: String,
    pub diagnosis: String,
    pub recommendations: String,
}

impl Report {
    /// Join summary, diagnosis and recommendations with [`REPORT_DELIMITER`].
    ///
    /// Generated sections are normalised first so that none of them contains the delimiter.
    ///
    /// # Errors
    ///
    /// `MalformedUpstream` if the joined string does not split back into exactly three sections
    /// (for instance when a generated section normalises to nothing).
    pub fn to_joined(&self) -> ReportResult<String> {
        let joined = [
            self.summary.to_segment()?,
            normalise_section(&self.diagnosis),
            normalise_section(&self.recommendations),
        ]
        .join(REPORT_DELIMITER);

        split_joined(&joined)?;
        Ok(joined)
    }
}

/// Split a joined report into its sections.
///
/// # Errors
///
/// `MalformedUpstream` unless the input has exactly three non-empty sections.
pub fn split_joined(joined: &str) -> ReportResult<ReportSections> {
    let parts: Vec<&str> = joined.split(REPORT_DELIMITER).collect();
    if parts.len() != REPORT_SECTION_COUNT || parts.iter().any(|part| part.trim().is_empty()) {
        return Err(ReportError::MalformedUpstream { found: parts.len() });
    }

    Ok(ReportSections {
        summary: parts[0].to_string(),
        diagnosis: parts[1].to_string(),
        recommendations: parts[2].to_string(),
    })
}

/// Trim a generated section, unify line endings and collapse blank lines.
pub fn normalise_section(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Builds reports for dataset records.
#[derive(Clone)]
pub struct ReportService {
    generator: Generator,
}

impl ReportService {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    /// Assemble the report for `record`.
    ///
    /// Diagnosis runs before recommendations because the recommendation prompt embeds the
    /// diagnosis. Any failure aborts the whole report; no partial report is produced.
    ///
    /// # Errors
    ///
    /// Returns a `ReportError` if:
    /// - the summary cannot be built (`MissingField`, `MalformedTimestamp`),
    /// - either generation step fails (`Generation`).
    pub async fn assemble(&self, record: &PatientRecord) -> ReportResult<Report> {
        let report_id = Uuid::new_v4();
        tracing::info!("assembling report {} for patient {}", report_id, record.id);

        let summary = build_summary(record)?;
        let diagnosis = self.generator.diagnose(&summary).await?;
        let recommendations = self.generator.recommend(&summary, &diagnosis).await?;

        tracing::info!("report {} ready for patient {}", report_id, record.id);
        Ok(Report {
            report_id,
            generated_at: Utc::now(),
            summary,
            diagnosis,
            recommendations,
        })
    }
}
