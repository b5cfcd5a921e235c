//! Browser pages: the patient list, a report viewer and the PDF download link.
//!
//! Pages call the same in-process operations as the JSON API.

use crate::{parse_page, patient_report, patients_page, ApiError, AppState};
use api_shared::PatientReportRes;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::fmt::Write as _;
use vitals_core::document::escape_html;

const STYLE: &str = "body{font-family:Arial,sans-serif;margin:20px;line-height:1.5}\
table{border-collapse:collapse}th,td{border:1px solid #ddd;padding:6px;text-align:left}\
th{background:#f4f4f4}pre{white-space:pre-wrap;background:#eef;padding:10px}\
.error{color:#a00}";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/patient/:id", get(patient))
        .route("/generate_pdf/:id", get(download))
        .with_state(state)
}

#[derive(Debug, serde::Deserialize)]
struct PageQuery {
    page: Option<String>,
}

async fn index(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let page = match parse_page(query.page.as_deref()) {
        Ok(page) => page,
        Err(err) => return error_page(err),
    };
    let listed = patients_page(&state, page);

    let mut body = String::from("<h1>Patients</h1>\n<ul>\n");
    for id in &listed.patients {
        let _ = writeln!(
            body,
            "<li><a href=\"/patient/{}\">Patient {}</a></li>",
            encode_segment(id),
            escape_html(id)
        );
    }
    body.push_str("</ul>\n<p>");
    if page > 1 {
        let _ = write!(body, "<a href=\"/?page={}\">Previous</a> ", page - 1);
    }
    let _ = write!(body, "Page {} of {}", listed.page, listed.total_pages);
    if page < listed.total_pages {
        let _ = write!(body, " <a href=\"/?page={}\">Next</a>", page + 1);
    }
    body.push_str("</p>\n");

    Html(layout("Patients", &body)).into_response()
}

async fn patient(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> Response {
    match patient_report(&state, &id).await {
        Ok(report) => Html(layout(
            &format!("Patient {}", escape_html(&id)),
            &report_body(&id, &report),
        ))
        .into_response(),
        Err(err) => error_page(err),
    }
}

async fn download(AxumPath(id): AxumPath<String>) -> Redirect {
    Redirect::to(&format!("/api/generate_pdf/{}", encode_segment(&id)))
}

fn report_body(id: &str, report: &PatientReportRes) -> String {
    let summary = &report.summary;
    let vitals = &summary.vital_signs;
    let rows = [
        ("Gender", escape_html(&summary.gender)),
        ("Age", summary.age.to_string()),
        ("Weight (kg)", summary.weight.to_string()),
        ("Height (m)", summary.height.to_string()),
        ("BMI", summary.bmi.to_string()),
        ("Heart Rate (bpm)", vitals.heart_rate.to_string()),
        ("Respiratory Rate (bpm)", vitals.respiratory_rate.to_string()),
        ("Body Temperature (°C)", vitals.body_temp.to_string()),
        ("Oxygen Saturation (%)", vitals.oxygen_saturation.to_string()),
        ("Systolic BP (mmHg)", vitals.systolic_bp.to_string()),
        ("Diastolic BP (mmHg)", vitals.diastolic_bp.to_string()),
        ("Pulse Pressure (mmHg)", vitals.pulse_pressure.to_string()),
        ("MAP (mmHg)", vitals.map.to_string()),
        ("HRV", vitals.hrv.to_string()),
        ("Measured", escape_html(&summary.report_timestamp)),
    ];

    let mut body = format!(
        "<h1>Patient Report: {}</h1>\n<table>\n",
        escape_html(&summary.patient_id)
    );
    for (label, value) in &rows {
        let _ = writeln!(body, "<tr><th>{label}</th><td>{value}</td></tr>");
    }
    let _ = write!(
        body,
        "</table>\n<h2>Diagnosis</h2>\n<pre>{}</pre>\n<h2>Recommendations</h2>\n<pre>{}</pre>\n\
<p><a href=\"/generate_pdf/{}\">Download PDF</a> | <a href=\"/\">Back to patients</a></p>\n",
        escape_html(&report.diagnosis),
        escape_html(&report.recommendations),
        encode_segment(id)
    );
    body
}

fn error_page(err: ApiError) -> Response {
    let body = format!(
        "<p class=\"error\">{}</p>\n<p><a href=\"/\">Back to patients</a></p>\n",
        escape_html(&err.to_string())
    );
    let status = err.status();
    (status, Html(layout(error_title(status), &body))).into_response()
}

fn error_title(status: StatusCode) -> &'static str {
    if status == StatusCode::NOT_FOUND {
        "Patient not found"
    } else {
        "Report unavailable"
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

/// Percent-encode one path segment.
fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{state, two_replies};
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let req = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(req).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn index_links_every_patient_on_the_page() {
        let ids: Vec<String> = (1..=25).map(|i| i.to_string()).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (state, _, _) = state(&ids, vec![]);

        let (status, _, html) = get(router(state.clone()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<a href=\"/patient/1\">Patient 1</a>"));
        assert!(html.contains("<a href=\"/patient/20\">"));
        assert!(!html.contains("<a href=\"/patient/21\">"));
        assert!(html.contains("Page 1 of 2"));
        assert!(html.contains("<a href=\"/?page=2\">Next</a>"));

        let (_, _, html) = get(router(state), "/?page=2").await;
        assert!(html.contains("<a href=\"/?page=1\">Previous</a>"));
        assert!(!html.contains("Next"));
    }

    #[tokio::test]
    async fn report_page_shows_sections_and_pdf_link() {
        let (state, _, _) = state(&["7"], two_replies());
        let (status, _, html) = get(router(state), "/patient/7").await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<h1>Patient Report: 7</h1>"));
        assert!(html.contains("<tr><th>Heart Rate (bpm)</th><td>72</td></tr>"));
        assert!(html.contains("Diagnostic : tension artérielle normale"));
        assert!(html.contains("Recommandations court terme : hydratation"));
        assert!(html.contains("<a href=\"/generate_pdf/7\">Download PDF</a>"));
    }

    #[tokio::test]
    async fn unknown_patient_renders_an_error_page() {
        let (state, _, _) = state(&["7"], vec![]);
        let (status, _, html) = get(router(state), "/patient/999").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(html.contains("Patient with ID 999 not found."));
    }

    #[tokio::test]
    async fn pdf_link_redirects_to_the_api() {
        let (state, backend, _) = state(&["7"], vec![]);
        let (status, headers, _) = get(router(state), "/generate_pdf/7").await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers[header::LOCATION], "/api/generate_pdf/7");
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn segments_are_percent_encoded() {
        assert_eq!(encode_segment("7"), "7");
        assert_eq!(encode_segment("a b/\"c\n"), "a%20b%2F%22c%0A");
    }
}
