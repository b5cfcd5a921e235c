//! # API REST
//!
//! REST API implementation for vital-signs reports.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - The HTML pages built on top of the same operations (`pages` module)
//!
//! Uses `api-shared` for wire types and `vitals-core` for the report pipeline.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod pages;

pub use error::ApiError;

use api_shared::{
    ErrorRes, HealthRes, HealthService, ListPatientsRes, PatientReportRes, SummaryRes,
    VitalSignsRes,
};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use vitals_core::{
    CompletionBackend, CoreConfig, DatasetStore, DocumentService, Generator, GroqClient,
    PdfRenderer, Report, ReportError, ReportFields, ReportResult, ReportService,
    StructuredSummary, WkhtmltopdfRenderer,
};

/// Application state shared across handlers
///
/// Holds the startup configuration, the read-only dataset and the report services.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub dataset: Arc<DatasetStore>,
    pub reports: ReportService,
    pub documents: DocumentService,
}

impl AppState {
    /// Wire the services around explicit backends.
    pub fn new(
        cfg: Arc<CoreConfig>,
        dataset: Arc<DatasetStore>,
        backend: Arc<dyn CompletionBackend>,
        renderer: Arc<dyn PdfRenderer>,
    ) -> Self {
        let generator = Generator::new(backend, cfg.generation().clone());
        let documents = DocumentService::new(renderer, cfg.renderer().retry.clone());
        Self {
            cfg,
            dataset,
            reports: ReportService::new(generator),
            documents,
        }
    }

    /// Load the dataset and connect the production backends described by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns a `ReportError` if:
    /// - the dataset cannot be read or parsed,
    /// - the HTTP client for the generation service cannot be built.
    pub fn from_config(cfg: Arc<CoreConfig>) -> ReportResult<Self> {
        let dataset = DatasetStore::load(cfg.dataset_path())?;
        tracing::info!(
            "loaded {} patients from {}",
            dataset.len(),
            cfg.dataset_path().display()
        );
        let backend = Arc::new(GroqClient::new(cfg.generation())?);
        let renderer = Arc::new(WkhtmltopdfRenderer::new(cfg.renderer()));
        Ok(Self::new(cfg, Arc::new(dataset), backend, renderer))
    }
}

#[derive(OpenApi)]
#[openapi(
    servers((url = "/api")),
    paths(health, list_patients, get_patient_report, generate_pdf),
    components(schemas(
        HealthRes,
        ListPatientsRes,
        PatientReportRes,
        SummaryRes,
        VitalSignsRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Routes of the JSON API, without any prefix.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", get(list_patients))
        .route("/patient_report/:id", get(get_patient_report))
        .route("/generate_pdf/:id", get(generate_pdf))
        .with_state(state)
}

/// The complete application: API under `/api`, HTML pages at the root and the API docs.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router(state.clone()))
        .merge(pages::router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// One page of patient identifiers.
pub fn patients_page(state: &AppState, page: usize) -> ListPatientsRes {
    let listed = state.dataset.list_page(page, state.cfg.page_size());
    ListPatientsRes {
        patients: listed.patients.iter().map(ToString::to_string).collect(),
        page: listed.page,
        total_pages: listed.total_pages,
    }
}

/// Assemble a fresh report for patient `id`.
///
/// # Errors
///
/// `NotFound` for unknown identifiers, otherwise whatever report assembly fails with.
pub async fn assemble_report(state: &AppState, id: &str) -> Result<Report, ApiError> {
    let record = state
        .dataset
        .get_by_id(id)
        .ok_or_else(|| ReportError::NotFound(id.trim().to_string()))?;
    Ok(state.reports.assemble(record).await?)
}

/// The JSON form of a report for patient `id`.
pub async fn patient_report(state: &AppState, id: &str) -> Result<PatientReportRes, ApiError> {
    let report = assemble_report(state, id).await?;
    Ok(PatientReportRes {
        report: report.to_joined()?,
        report_id: report.report_id.to_string(),
        generated_at: report.generated_at.to_rfc3339(),
        summary: summary_res(&report.summary),
        diagnosis: report.diagnosis,
        recommendations: report.recommendations,
    })
}

/// Render the report for patient `id` to PDF bytes.
pub async fn patient_pdf(state: &AppState, id: &str) -> Result<Vec<u8>, ApiError> {
    let report = assemble_report(state, id).await?;
    let fields = ReportFields::from_report(&report);
    Ok(state.documents.render(&fields).await?)
}

fn summary_res(summary: &StructuredSummary) -> SummaryRes {
    let vitals = &summary.vital_signs;
    SummaryRes {
        patient_id: summary.patient_id.to_string(),
        gender: summary.gender.clone(),
        age: summary.age,
        weight: summary.weight,
        height: summary.height,
        bmi: summary.bmi,
        vital_signs: VitalSignsRes {
            heart_rate: vitals.heart_rate,
            respiratory_rate: vitals.respiratory_rate,
            body_temp: vitals.body_temp,
            oxygen_saturation: vitals.oxygen_saturation,
            systolic_bp: vitals.systolic_bp,
            diastolic_bp: vitals.diastolic_bp,
            pulse_pressure: vitals.pulse_pressure,
            map: vitals.map,
            hrv: vitals.hrv,
        },
        report_timestamp: summary.report_timestamp.clone(),
    }
}

/// Parse the optional `page` query value; absent means the first page.
///
/// Zero and negative numbers become page 0, which lists nothing. Only non-numeric input is
/// rejected.
pub(crate) fn parse_page(raw: Option<&str>) -> Result<usize, ApiError> {
    let value = match raw.map(str::trim) {
        None | Some("") => return Ok(1),
        Some(value) => value,
    };
    let page: i64 = value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid page number: {value}")))?;
    Ok(usize::try_from(page.max(0)).unwrap_or(usize::MAX))
}

/// File name offered for a downloaded report.
fn pdf_filename(id: &str) -> String {
    let safe: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("patient_{safe}_report.pdf")
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number, defaults to 1.
    page: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/patients",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of patient identifiers", body = ListPatientsRes),
        (status = 400, description = "Invalid page number", body = ErrorRes)
    )
)]
/// List patient identifiers, one page at a time
///
/// Pages beyond the last one are returned empty rather than rejected.
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListPatientsRes>, ApiError> {
    let page = parse_page(query.page.as_deref())?;
    Ok(Json(patients_page(&state, page)))
}

#[utoipa::path(
    get,
    path = "/patient_report/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Generated report", body = PatientReportRes),
        (status = 400, description = "Patient data incomplete", body = ErrorRes),
        (status = 404, description = "Unknown patient", body = ErrorRes),
        (status = 502, description = "Unusable answer from the generation service", body = ErrorRes),
        (status = 503, description = "Generation service unavailable", body = ErrorRes),
        (status = 504, description = "Generation timed out", body = ErrorRes)
    )
)]
/// Generate the report of one patient
///
/// Builds the structured summary, then asks the generation service for a diagnosis and for
/// recommendations. Nothing is cached: every call generates a new report.
#[axum::debug_handler]
async fn get_patient_report(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<PatientReportRes>, ApiError> {
    tracing::info!("report requested for patient {}", id);
    Ok(Json(patient_report(&state, &id).await?))
}

#[utoipa::path(
    get,
    path = "/generate_pdf/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Report as an application/pdf attachment"),
        (status = 400, description = "Patient data incomplete", body = ErrorRes),
        (status = 404, description = "Unknown patient", body = ErrorRes),
        (status = 502, description = "Unusable answer from the generation service", body = ErrorRes),
        (status = 503, description = "Generation or rendering unavailable", body = ErrorRes),
        (status = 504, description = "Generation or rendering timed out", body = ErrorRes)
    )
)]
/// Generate the report of one patient as a PDF download
#[axum::debug_handler]
async fn generate_pdf(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, ApiError> {
    tracing::info!("PDF requested for patient {}", id);
    let pdf = patient_pdf(&state, &id).await?;
    let disposition = format!("attachment; filename=\"{}\"", pdf_filename(&id));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use vitals_core::GenerationError;

    async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let req = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(req).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes()
            .to_vec();
        (status, headers, body)
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _, _) = state(&["7"], vec![]);
        let (status, _, body) = get(app(state), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["ok"], true);
    }

    #[tokio::test]
    async fn patients_are_paged() {
        let ids: Vec<String> = (1..=25).map(|i| i.to_string()).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (state, _, _) = state(&ids, vec![]);

        let (status, _, body) = get(api_router(state.clone()), "/patients").await;
        assert_eq!(status, StatusCode::OK);
        let first: ListPatientsRes = serde_json::from_slice(&body).expect("page 1");
        assert_eq!(first.patients.len(), 20);
        assert_eq!(first.patients[0], "1");
        assert_eq!(first.page, 1);
        assert_eq!(first.total_pages, 2);

        let (_, _, body) = get(api_router(state.clone()), "/patients?page=2").await;
        let second: ListPatientsRes = serde_json::from_slice(&body).expect("page 2");
        assert_eq!(second.patients, vec!["21", "22", "23", "24", "25"]);

        let (status, _, body) = get(api_router(state.clone()), "/patients?page=9").await;
        assert_eq!(status, StatusCode::OK);
        let beyond: ListPatientsRes = serde_json::from_slice(&body).expect("page 9");
        assert!(beyond.patients.is_empty());
        assert_eq!(beyond.total_pages, 2);

        for below in ["0", "-1"] {
            let uri = format!("/patients?page={below}");
            let (status, _, body) = get(api_router(state.clone()), &uri).await;
            assert_eq!(status, StatusCode::OK, "page={below}");
            let empty: ListPatientsRes = serde_json::from_slice(&body).expect("empty page");
            assert!(empty.patients.is_empty(), "page={below}");
            assert_eq!(empty.total_pages, 2);
        }

        let (status, _, body) = get(api_router(state), "/patients?page=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn report_for_known_patient_has_three_sections() {
        let (state, backend, _) = state(&["7"], two_replies());
        let (status, _, body) = get(api_router(state), "/patient_report/7").await;

        assert_eq!(status, StatusCode::OK);
        let res: PatientReportRes = serde_json::from_slice(&body).expect("report");
        let sections: Vec<&str> = res.report.split("\n\n").collect();
        assert_eq!(sections.len(), 3);

        let summary: SummaryRes = serde_json::from_str(sections[0]).expect("summary json");
        assert_eq!(summary.patient_id, "7");
        assert_eq!(summary.age, 45);
        assert_eq!(summary.vital_signs.heart_rate, 72);
        assert_eq!(summary, res.summary);
        assert!(sections[1].starts_with("Diagnostic : tension artérielle normale"));
        assert!(sections[2].starts_with("Recommandations court terme"));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found_on_both_endpoints() {
        let (state, backend, renderer) = state(&["7"], vec![]);

        for uri in ["/patient_report/999", "/generate_pdf/999"] {
            let (status, _, body) = get(api_router(state.clone()), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(
                json(&body),
                serde_json::json!({"error": "Patient with ID 999 not found."})
            );
        }
        assert_eq!(backend.calls(), 0);
        assert_eq!(renderer.calls(), 0);
    }

    #[tokio::test]
    async fn pdf_is_served_as_attachment() {
        let (state, _, renderer) = state(&["7"], two_replies());
        let (status, headers, body) = get(api_router(state), "/generate_pdf/7").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"patient_7_report.pdf\""
        );
        assert!(body.starts_with(b"%PDF"));
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn failed_diagnosis_never_reaches_the_renderer() {
        let (state, backend, renderer) = state(
            &["7"],
            vec![
                Err(GenerationError::Unavailable("connection refused".into())),
                Err(GenerationError::Unavailable("connection refused".into())),
            ],
        );
        let (status, _, body) = get(api_router(state), "/generate_pdf/7").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let message = json(&body)["error"].as_str().expect("message").to_string();
        assert!(message.contains("generation service unavailable"));
        assert_ne!(message, "Patient with ID 7 not found.");
        assert_eq!(backend.calls(), 2);
        assert_eq!(renderer.calls(), 0);
    }

    #[tokio::test]
    async fn empty_generation_is_a_bad_gateway() {
        let (state, _, _) = state(&["7"], vec![Ok("   ".into())]);
        let (status, _, _) = get(api_router(state), "/patient_report/7").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn openapi_document_lists_every_route() {
        let (state, _, _) = state(&["7"], vec![]);
        let (status, _, body) = get(app(state), "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let paths = json(&body)["paths"].clone();
        for path in [
            "/health",
            "/patients",
            "/patient_report/{id}",
            "/generate_pdf/{id}",
        ] {
            assert!(paths.get(path).is_some(), "missing {path}");
        }
    }

    #[test]
    fn filenames_are_header_safe() {
        assert_eq!(pdf_filename("7"), "patient_7_report.pdf");
        assert_eq!(pdf_filename("a\"b/c"), "patient_a_b_c_report.pdf");
    }
}
