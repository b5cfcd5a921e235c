//! PDF rendering of assembled reports.
//!
//! Reports are laid out as a fixed HTML page and converted by an external HTML to PDF program.
//! The input is always the structured report; the joined transport string is never parsed here.

use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::report::{normalise_section, Report};
use crate::retry::RetryPolicy;
use crate::{ReportError, ReportResult};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Everything the PDF layout shows.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportFields {
    pub patient_id: String,
    pub gender: String,
    pub age: u32,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    pub heart_rate: u32,
    pub respiratory_rate: u32,
    pub body_temp: f64,
    pub oxygen_saturation: f64,
    pub systolic_bp: u32,
    pub diastolic_bp: u32,
    pub pulse_pressure: f64,
    pub map: f64,
    pub hrv: f64,
    pub diagnosis: String,
    pub recommendations: String,
    pub report_timestamp: String,
}

impl ReportFields {
    pub fn from_report(report: &Report) -> Self {
        let summary = &report.summary;
        let vitals = &summary.vital_signs;
        Self {
            patient_id: summary.patient_id.to_string(),
            gender: summary.gender.clone(),
            age: summary.age,
            weight: summary.weight,
            height: summary.height,
            bmi: summary.bmi,
            heart_rate: vitals.heart_rate,
            respiratory_rate: vitals.respiratory_rate,
            body_temp: vitals.body_temp,
            oxygen_saturation: vitals.oxygen_saturation,
            systolic_bp: vitals.systolic_bp,
            diastolic_bp: vitals.diastolic_bp,
            pulse_pressure: vitals.pulse_pressure,
            map: vitals.map,
            hrv: vitals.hrv,
            diagnosis: normalise_section(&report.diagnosis),
            recommendations: normalise_section(&report.recommendations),
            report_timestamp: summary.report_timestamp.clone(),
        }
    }

    /// Check that every field the layout needs is present.
    ///
    /// # Errors
    ///
    /// `ReportError::MissingField` naming the first empty text field or non-finite number.
    pub fn validate(&self) -> ReportResult<()> {
        let texts = [
            ("patient_id", &self.patient_id),
            ("gender", &self.gender),
            ("diagnosis", &self.diagnosis),
            ("recommendations", &self.recommendations),
            ("report_timestamp", &self.report_timestamp),
        ];
        if let Some((name, _)) = texts.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ReportError::MissingField(*name));
        }

        let numbers = [
            ("weight", self.weight),
            ("height", self.height),
            ("bmi", self.bmi),
            ("body_temp", self.body_temp),
            ("oxygen_saturation", self.oxygen_saturation),
            ("pulse_pressure", self.pulse_pressure),
            ("map", self.map),
            ("hrv", self.hrv),
        ];
        if let Some((name, _)) = numbers.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ReportError::MissingField(*name));
        }
        Ok(())
    }
}

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; line-height: 1.6; margin: 20px; }
h1 { color: #333; text-align: center; font-size: 24px; }
.section { margin-top: 20px; padding: 15px; border: 1px solid #ccc; border-radius: 5px; background-color: #f9f9f9; }
.section h2 { color: #555; font-size: 20px; margin-bottom: 10px; }
table { width: 100%; border-collapse: collapse; margin-top: 10px; }
table, th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f4f4f4; }
.report-timestamp { text-align: center; font-size: 14px; margin-top: 20px; color: #777; }
.diagnosis, .recommendations { margin-top: 30px; padding: 10px; border: 1px solid #ccc; border-radius: 5px; background-color: #eef; }
.recommendations h3, .diagnosis h3 { color: #555; }
pre { white-space: pre-wrap; word-wrap: break-word; font-family: 'Courier New', Courier, monospace; }
"#;

/// Lay out `fields` as a standalone HTML page.
pub fn render_html(fields: &ReportFields) -> String {
    let vitals: [(&str, String); 9] = [
        ("Heart Rate (bpm)", fields.heart_rate.to_string()),
        ("Respiratory Rate (bpm)", fields.respiratory_rate.to_string()),
        ("Body Temperature (°C)", fields.body_temp.to_string()),
        ("Oxygen Saturation (%)", fields.oxygen_saturation.to_string()),
        ("Systolic BP (mmHg)", fields.systolic_bp.to_string()),
        ("Diastolic BP (mmHg)", fields.diastolic_bp.to_string()),
        ("Pulse Pressure (mmHg)", fields.pulse_pressure.to_string()),
        ("MAP (mmHg)", fields.map.to_string()),
        ("HRV", fields.hrv.to_string()),
    ];

    let mut rows = String::new();
    for (label, value) in &vitals {
        let _ = write!(rows, "<tr><th>{label}</th><td>{}</td></tr>", escape_html(value));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>{STYLE}</style>\n</head>\n<body>\n\
<h1>Patient Report: {id}</h1>\n\
<div class=\"section\">\n<h2>Patient Details</h2>\n\
<p><strong>Gender:</strong> {gender}</p>\n\
<p><strong>Age:</strong> {age}</p>\n\
<p><strong>Weight:</strong> {weight} kg</p>\n\
<p><strong>Height:</strong> {height} m</p>\n\
<p><strong>BMI:</strong> {bmi}</p>\n</div>\n\
<div class=\"section\">\n<h2>Vital Signs</h2>\n<table>{rows}</table>\n</div>\n\
<div class=\"diagnosis\">\n<h3>Diagnosis</h3>\n<pre>{diagnosis}</pre>\n</div>\n\
<div class=\"recommendations\">\n<h3>Recommendations</h3>\n<pre>{recommendations}</pre>\n</div>\n\
<div class=\"report-timestamp\">\n<p><strong>Report Generated on:</strong> {timestamp}</p>\n</div>\n\
</body>\n</html>\n",
        id = escape_html(&fields.patient_id),
        gender = escape_html(&fields.gender),
        age = fields.age,
        weight = fields.weight,
        height = fields.height,
        bmi = fields.bmi,
        diagnosis = escape_html(&fields.diagnosis),
        recommendations = escape_html(&fields.recommendations),
        timestamp = escape_html(&fields.report_timestamp),
    )
}

/// Escape text for interpolation into HTML.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Converts an HTML page into PDF bytes.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

/// [`PdfRenderer`] backed by the `wkhtmltopdf` executable.
///
/// HTML goes in on stdin and the document comes back on stdout. The child is killed if the
/// timeout fires first.
#[derive(Clone, Debug)]
pub struct WkhtmltopdfRenderer {
    executable: PathBuf,
    timeout: Duration,
}

impl WkhtmltopdfRenderer {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            timeout: config.timeout,
        }
    }

    async fn run(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let mut child = Command::new(&self.executable)
            .args(["--quiet", "--encoding", "utf-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Launch {
                path: self.executable.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = html.as_bytes().to_vec();
            // Written concurrently with the stdout read so a full pipe cannot stall the child.
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&input).await {
                    tracing::debug!("renderer closed stdin early: {}", err);
                }
            });
        }

        let output = child.wait_with_output().await.map_err(RenderError::Io)?;
        if !output.status.success() {
            return Err(RenderError::RenderFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !output.stdout.starts_with(b"%PDF") {
            return Err(RenderError::InvalidOutput);
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl PdfRenderer for WkhtmltopdfRenderer {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        tokio::time::timeout(self.timeout, self.run(html))
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
    }
}

/// Validates report fields and renders them to PDF.
#[derive(Clone)]
pub struct DocumentService {
    renderer: Arc<dyn PdfRenderer>,
    retry: RetryPolicy,
}

impl DocumentService {
    pub fn new(renderer: Arc<dyn PdfRenderer>, retry: RetryPolicy) -> Self {
        Self { renderer, retry }
    }

    /// Render `fields` to PDF bytes.
    ///
    /// Fields are validated before the renderer is invoked.
    ///
    /// # Errors
    ///
    /// - `ReportError::MissingField` for incomplete fields,
    /// - `ReportError::Render` once the renderer has failed for good.
    pub async fn render(&self, fields: &ReportFields) -> ReportResult<Vec<u8>> {
        fields.validate()?;
        let html = render_html(fields);
        let renderer = &self.renderer;
        let html = html.as_str();

        let pdf = self
            .retry
            .run(
                "pdf rendering",
                || async move { renderer.render_pdf(html).await },
                RenderError::is_retryable,
            )
            .await?;

        tracing::debug!(
            "rendered {} byte PDF for patient {}",
            pdf.len(),
            fields.patient_id
        );
        Ok(pdf)
    }
}
