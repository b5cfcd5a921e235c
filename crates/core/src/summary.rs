//! Structured summary of a patient record.
//!
//! The summary is the non-generated part of a report: demographics, vital signs and a
//! human-formatted measurement time. It is derived fresh from the dataset for every request and
//! its only textual form is JSON, so clients can read it back with a plain parser.

use crate::constants::{REPORT_TIMESTAMP_FORMAT, SOURCE_TIMESTAMP_FORMAT};
use crate::dataset::PatientRecord;
use crate::{ReportError, ReportResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use vitals_types::PatientId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub heart_rate: u32,
    pub respiratory_rate: u32,
    pub body_temp: f64,
    pub oxygen_saturation: f64,
    pub systolic_bp: u32,
    pub diastolic_bp: u32,
    pub pulse_pressure: f64,
    pub map: f64,
    pub hrv: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub patient_id: PatientId,
    pub gender: String,
    pub age: u32,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    pub vital_signs: VitalSigns,
    /// Measurement time, formatted as `19 Jul 2024, 09:53 PM`.
    pub report_timestamp: String,
}

impl StructuredSummary {
    /// Single-line JSON, the summary segment of a joined report.
    pub fn to_segment(&self) -> ReportResult<String> {
        serde_json::to_string(self).map_err(ReportError::Serialization)
    }

    /// Indented JSON embedded in generation prompts.
    pub fn to_prompt_block(&self) -> ReportResult<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::Serialization)
    }

    /// Parse a summary segment back into its structured form.
    pub fn from_segment(segment: &str) -> ReportResult<Self> {
        serde_json::from_str(segment.trim()).map_err(ReportError::Deserialization)
    }
}

/// Map a dataset row onto a [`StructuredSummary`].
///
/// # Errors
///
/// - `ReportError::MissingField` if a demographic or vital value is absent (or not finite),
/// - `ReportError::MalformedTimestamp` if the stored timestamp is not `YYYY-MM-DD HH:MM:SS`
///   (fractional seconds are ignored).
pub fn build_summary(record: &PatientRecord) -> ReportResult<StructuredSummary> {
    let raw_timestamp = record
        .timestamp
        .as_deref()
        .ok_or(ReportError::MissingField("timestamp"))?;

    Ok(StructuredSummary {
        patient_id: record.id.clone(),
        gender: record
            .gender
            .clone()
            .ok_or(ReportError::MissingField("gender"))?,
        age: required(record.age, "age")?,
        weight: finite(record.weight_kg, "weight")?,
        height: finite(record.height_m, "height")?,
        bmi: finite(record.bmi, "bmi")?,
        vital_signs: VitalSigns {
            heart_rate: required(record.heart_rate, "heart_rate")?,
            respiratory_rate: required(record.respiratory_rate, "respiratory_rate")?,
            body_temp: finite(record.body_temperature, "body_temp")?,
            oxygen_saturation: finite(record.oxygen_saturation, "oxygen_saturation")?,
            systolic_bp: required(record.systolic_bp, "systolic_bp")?,
            diastolic_bp: required(record.diastolic_bp, "diastolic_bp")?,
            pulse_pressure: finite(record.pulse_pressure, "pulse_pressure")?,
            map: finite(record.map, "map")?,
            hrv: finite(record.hrv, "hrv")?,
        },
        report_timestamp: format_timestamp(raw_timestamp)?,
    })
}

/// Reformat a dataset timestamp for display.
pub fn format_timestamp(raw: &str) -> ReportResult<String> {
    let whole_seconds = raw.split('.').next().unwrap_or(raw).trim();
    let parsed = NaiveDateTime::parse_from_str(whole_seconds, SOURCE_TIMESTAMP_FORMAT)
        .map_err(|_| ReportError::MalformedTimestamp(raw.to_string()))?;
    Ok(parsed.format(REPORT_TIMESTAMP_FORMAT).to_string())
}

fn required<T>(value: Option<T>, field: &'static str) -> ReportResult<T> {
    value.ok_or(ReportError::MissingField(field))
}

fn finite(value: Option<f64>, field: &'static str) -> ReportResult<f64> {
    value
        .filter(|v| v.is_finite())
        .ok_or(ReportError::MissingField(field))
}
