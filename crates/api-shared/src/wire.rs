//! JSON bodies of the REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// One page of patient identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<String>,
    pub page: usize,
    pub total_pages: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VitalSignsRes {
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

/// Structured summary of a patient, as embedded in a report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SummaryRes {
    pub patient_id: String,
    pub gender: String,
    pub age: u32,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    pub vital_signs: VitalSignsRes,
    pub report_timestamp: String,
}

/// A generated patient report.
///
/// `report` joins the summary JSON, the diagnosis and the recommendations with a blank line. It
/// always splits into exactly three parts; the structured fields carry the same content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientReportRes {
    pub report: String,
    pub report_id: String,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub summary: SummaryRes,
    pub diagnosis: String,
    pub recommendations: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}
