use api_shared::{ErrorRes, HealthRes, ListPatientsRes, PatientReportRes};
use clap::{Parser, Subcommand};
use reqwest::blocking::{Client, Response};
use std::fmt::Write as _;
use std::path::PathBuf;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Vital-signs report CLI")]
struct Cli {
    /// Base URL of the report API
    #[arg(
        long,
        env = "VITALS_API_URL",
        default_value = "http://localhost:3000/api"
    )]
    api_url: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List patient identifiers
    List {
        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Generate and print the report of one patient
    Report {
        /// Patient identifier
        id: String,
    },
    /// Generate the PDF report of one patient
    Pdf {
        /// Patient identifier
        id: String,
        /// Output file (default: patient_<id>_report.pdf)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check that the API is up
    Health,
}

/// Thin blocking client for the report API.
struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> CliResult<Response> {
        let response = self.http.get(self.url(path)).send()?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .json::<ErrorRes>()
            .map(|body| body.error)
            .unwrap_or_else(|_| "no error message".to_string());
        Err(format!("{status}: {message}").into())
    }

    fn health(&self) -> CliResult<HealthRes> {
        Ok(self.get("health")?.json()?)
    }

    fn patients(&self, page: usize) -> CliResult<ListPatientsRes> {
        Ok(self.get(&format!("patients?page={page}"))?.json()?)
    }

    fn report(&self, id: &str) -> CliResult<PatientReportRes> {
        Ok(self
            .get(&format!("patient_report/{}", encode_segment(id)))?
            .json()?)
    }

    fn pdf(&self, id: &str) -> CliResult<Vec<u8>> {
        Ok(self
            .get(&format!("generate_pdf/{}", encode_segment(id)))?
            .bytes()?
            .to_vec())
    }
}

fn print_report(report: &PatientReportRes) {
    let summary = &report.summary;
    let vitals = &summary.vital_signs;
    println!("Patient {} (report {})", summary.patient_id, report.report_id);
    println!(
        "{}, {} years, {} kg, {} m, BMI {}",
        summary.gender, summary.age, summary.weight, summary.height, summary.bmi
    );
    println!(
        "HR {} bpm, RR {} bpm, temp {} °C, SpO2 {} %, BP {}/{} mmHg, PP {}, MAP {}, HRV {}",
        vitals.heart_rate,
        vitals.respiratory_rate,
        vitals.body_temp,
        vitals.oxygen_saturation,
        vitals.systolic_bp,
        vitals.diastolic_bp,
        vitals.pulse_pressure,
        vitals.map,
        vitals.hrv
    );
    println!("Measured: {}", summary.report_timestamp);
    println!("\nDiagnosis:\n{}", report.diagnosis);
    println!("\nRecommendations:\n{}", report.recommendations);
}

/// Percent-encode one URL path segment.
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

/// File name in the working directory, whatever the id contains.
fn default_pdf_path(id: &str) -> PathBuf {
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
    PathBuf::from(format!("patient_{safe}_report.pdf"))
}

fn main() -> CliResult<()> {
    run(Cli::parse())
}

fn run(cli: Cli) -> CliResult<()> {
    let client = ApiClient::new(&cli.api_url);

    match cli.command {
        Some(Commands::List { page }) => {
            let listed = client.patients(page)?;
            if listed.patients.is_empty() {
                println!("No patients on page {}.", listed.page);
            } else {
                for id in &listed.patients {
                    println!("{id}");
                }
            }
            println!("Page {} of {}", listed.page, listed.total_pages);
        }
        Some(Commands::Report { id }) => {
            let report = client
                .report(&id)
                .map_err(|e| format!("Error generating report: {e}"))?;
            print_report(&report);
        }
        Some(Commands::Pdf { id, output }) => {
            let bytes = client
                .pdf(&id)
                .map_err(|e| format!("Error generating PDF: {e}"))?;
            let path = output.unwrap_or_else(|| default_pdf_path(&id));
            std::fs::write(&path, &bytes)?;
            println!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        Some(Commands::Health) => {
            let health = client.health()?;
            println!("{} (ok: {})", health.message, health.ok);
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
