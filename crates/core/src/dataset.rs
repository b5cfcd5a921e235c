//! In-memory patient dataset.
//!
//! The vital-signs CSV is read once at startup into a [`DatasetStore`] that is then shared
//! read-only (behind an `Arc`) by every request. Rows keep their file order, which is also the
//! listing order.
//!
//! Empty measurement cells are kept as `None`; whether a value is required is decided by the
//! consumer (see [`crate::summary::build_summary`]).

use crate::{ReportError, ReportResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use vitals_types::PatientId;

/// One row of the dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct PatientRecord {
    pub id: PatientId,
    pub heart_rate: Option<u32>,
    pub respiratory_rate: Option<u32>,
    /// Raw timestamp as stored, e.g. `2024-07-19 21:53:45.729841`.
    pub timestamp: Option<String>,
    pub body_temperature: Option<f64>,
    pub oxygen_saturation: Option<f64>,
    pub systolic_bp: Option<u32>,
    pub diastolic_bp: Option<u32>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
    pub hrv: Option<f64>,
    pub pulse_pressure: Option<f64>,
    pub bmi: Option<f64>,
    pub map: Option<f64>,
}

/// Column layout of `human_vital_signs_dataset_2024.csv`. Unknown columns are ignored.
#[derive(Deserialize)]
struct CsvRow {
    #[serde(rename = "Patient ID")]
    patient_id: String,
    #[serde(rename = "Heart Rate", default)]
    heart_rate: Option<u32>,
    #[serde(rename = "Respiratory Rate", default)]
    respiratory_rate: Option<u32>,
    #[serde(rename = "Timestamp", default)]
    timestamp: Option<String>,
    #[serde(rename = "Body Temperature", default)]
    body_temperature: Option<f64>,
    #[serde(rename = "Oxygen Saturation", default)]
    oxygen_saturation: Option<f64>,
    #[serde(rename = "Systolic Blood Pressure", default)]
    systolic_bp: Option<u32>,
    #[serde(rename = "Diastolic Blood Pressure", default)]
    diastolic_bp: Option<u32>,
    #[serde(rename = "Age", default)]
    age: Option<u32>,
    #[serde(rename = "Gender", default)]
    gender: Option<String>,
    #[serde(rename = "Weight (kg)", default)]
    weight_kg: Option<f64>,
    #[serde(rename = "Height (m)", default)]
    height_m: Option<f64>,
    #[serde(rename = "Derived_HRV", default)]
    hrv: Option<f64>,
    #[serde(rename = "Derived_Pulse_Pressure", default)]
    pulse_pressure: Option<f64>,
    #[serde(rename = "Derived_BMI", default)]
    bmi: Option<f64>,
    #[serde(rename = "Derived_MAP", default)]
    map: Option<f64>,
}

impl CsvRow {
    fn into_record(self, row: usize) -> ReportResult<PatientRecord> {
        let id =
            PatientId::new(&self.patient_id).map_err(|_| ReportError::EmptyPatientId { row })?;

        Ok(PatientRecord {
            id,
            heart_rate: self.heart_rate,
            respiratory_rate: self.respiratory_rate,
            timestamp: non_blank(self.timestamp),
            body_temperature: self.body_temperature,
            oxygen_saturation: self.oxygen_saturation,
            systolic_bp: self.systolic_bp,
            diastolic_bp: self.diastolic_bp,
            age: self.age,
            gender: non_blank(self.gender),
            weight_kg: self.weight_kg,
            height_m: self.height_m,
            hrv: self.hrv,
            pulse_pressure: self.pulse_pressure,
            bmi: self.bmi,
            map: self.map,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// One page of patient identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientPage {
    pub patients: Vec<PatientId>,
    /// The requested page number, echoed back even when out of range.
    pub page: usize,
    pub total_pages: usize,
}

/// Read-only, indexed patient dataset.
#[derive(Debug, Default)]
pub struct DatasetStore {
    records: Vec<PatientRecord>,
    index: HashMap<PatientId, usize>,
}

impl DatasetStore {
    /// Load the dataset from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns a `ReportError` if:
    /// - the file cannot be opened (`DatasetRead`),
    /// - a row cannot be parsed (`DatasetParse`),
    /// - a Patient ID is empty or repeated.
    pub fn load(path: &Path) -> ReportResult<Self> {
        let file = std::fs::File::open(path).map_err(|source| ReportError::DatasetRead {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_reader(file)?;
        tracing::info!(
            "loaded {} patient records from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parse a dataset from any CSV source with a header row.
    pub fn from_reader<R: Read>(reader: R) -> ReportResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (row, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
            let raw = result.map_err(ReportError::DatasetParse)?;
            // Row numbers are 1-based and skip the header line.
            records.push(raw.into_record(row + 1)?);
        }

        Self::from_records(records)
    }

    /// Build a store from already parsed records, rejecting duplicate identifiers.
    pub fn from_records(records: Vec<PatientRecord>) -> ReportResult<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if index.insert(record.id.clone(), position).is_some() {
                return Err(ReportError::DuplicatePatientId(record.id.to_string()));
            }
        }
        Ok(Self { records, index })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identifiers in dataset order.
    pub fn ids(&self) -> impl Iterator<Item = &PatientId> {
        self.records.iter().map(|record| &record.id)
    }

    /// Exact-match lookup on the (trimmed) identifier.
    pub fn get_by_id(&self, id: &str) -> Option<&PatientRecord> {
        self.index
            .get(id.trim())
            .and_then(|&position| self.records.get(position))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id.trim())
    }

    /// Identifiers on the 1-based `page`, plus the total page count.
    ///
    /// Page 0 and pages past the end yield an empty list rather than an error. A `page_size`
    /// of 0 is treated as 1.
    pub fn list_page(&self, page: usize, page_size: usize) -> PatientPage {
        let page_size = page_size.max(1);
        let total_pages = self.records.len().div_ceil(page_size);

        let patients = page
            .checked_sub(1)
            .and_then(|index| index.checked_mul(page_size))
            .filter(|&start| start < self.records.len())
            .map(|start| {
                self.records[start..]
                    .iter()
                    .take(page_size)
                    .map(|record| record.id.clone())
                    .collect()
            })
            .unwrap_or_default();

        PatientPage {
            patients,
            page,
            total_pages,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    pub(crate) const HEADER: &str = "Patient ID,Heart Rate,Respiratory Rate,Timestamp,Body Temperature,Oxygen Saturation,Systolic Blood Pressure,Diastolic Blood Pressure,Age,Gender,Weight (kg),Height (m),Derived_HRV,Derived_Pulse_Pressure,Derived_BMI,Derived_MAP,Risk Category";

    pub(crate) fn csv_row(id: &str, age: u32, heart_rate: u32) -> String {
        format!(
            "{id},{heart_rate},16,2024-07-19 21:53:45.729841,36.86,95.70,124,86,{age},Female,91.54,1.68,0.12,38,32.43,98.67,High Risk"
        )
    }

    pub(crate) fn store_with_ids(count: usize) -> DatasetStore {
        let mut csv = String::from(HEADER);
        for i in 1..=count {
            csv.push('\n');
            csv.push_str(&csv_row(&i.to_string(), 30 + (i as u32 % 50), 60 + (i as u32 % 30)));
        }
        DatasetStore::from_reader(csv.as_bytes()).expect("dataset should parse")
    }

    #[test]
    fn parses_rows_and_keeps_ids_as_strings() {
        let csv = format!("{HEADER}\n{}\n{}", csv_row("7", 45, 72), csv_row("007", 50, 80));
        let store = DatasetStore::from_reader(csv.as_bytes()).expect("parse");

        assert_eq!(store.len(), 2);
        let record = store.get_by_id("7").expect("patient 7");
        assert_eq!(record.age, Some(45));
        assert_eq!(record.heart_rate, Some(72));
        assert_eq!(record.gender.as_deref(), Some("Female"));
        assert_eq!(record.body_temperature, Some(36.86));
        assert_eq!(record.pulse_pressure, Some(38.0));
        assert_eq!(store.get_by_id("007").expect("patient 007").age, Some(50));
        assert!(store.get_by_id("07").is_none());
        assert!(store.contains(" 7 "));
    }

    #[test]
    fn empty_cells_become_absent_values() {
        let csv = format!(
            "{HEADER}\n12,,16,2024-07-19 21:53:45,36.8,,124,86,40,,70,1.7,0.1,38,24.2,98,Low Risk"
        );
        let store = DatasetStore::from_reader(csv.as_bytes()).expect("parse");
        let record = store.get_by_id("12").expect("patient 12");

        assert_eq!(record.heart_rate, None);
        assert_eq!(record.oxygen_saturation, None);
        assert_eq!(record.gender, None);
        assert_eq!(record.systolic_bp, Some(124));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let csv = format!("{HEADER}\n{}\n{}", csv_row("3", 45, 72), csv_row("3", 46, 73));
        let err = DatasetStore::from_reader(csv.as_bytes()).expect_err("duplicate");
        assert!(matches!(err, ReportError::DuplicatePatientId(id) if id == "3"));
    }

    #[test]
    fn blank_ids_are_rejected() {
        let csv = format!("{HEADER}\n{}", csv_row("  ", 45, 72));
        let err = DatasetStore::from_reader(csv.as_bytes()).expect_err("blank id");
        assert!(matches!(err, ReportError::EmptyPatientId { row: 1 }));
    }

    #[test]
    fn malformed_numbers_fail_to_parse() {
        let csv = format!("{HEADER}\n{}", csv_row("1", 45, 72).replace(",72,", ",fast,"));
        let err = DatasetStore::from_reader(csv.as_bytes()).expect_err("bad number");
        assert!(matches!(err, ReportError::DatasetParse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "{HEADER}").expect("write header");
        writeln!(file, "{}", csv_row("7", 45, 72)).expect("write row");

        let store = DatasetStore::load(file.path()).expect("load");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = DatasetStore::load(Path::new("/definitely/not/here.csv")).expect_err("missing");
        assert!(matches!(err, ReportError::DatasetRead { .. }));
    }

    #[test]
    fn pages_cover_every_id_once() {
        let store = store_with_ids(45);
        let page_size = 20;
        let first = store.list_page(1, page_size);
        assert_eq!(first.total_pages, 3);

        let mut seen = Vec::new();
        for page in 1..=first.total_pages {
            let listing = store.list_page(page, page_size);
            assert!(listing.patients.len() <= page_size);
            assert_eq!(listing.page, page);
            seen.extend(listing.patients);
        }

        let expected: Vec<PatientId> = store.ids().cloned().collect();
        assert_eq!(seen, expected);
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), seen.len());
    }

    #[test]
    fn out_of_range_pages_are_empty() {
        let store = store_with_ids(5);
        for page in [0, 2, 3, usize::MAX] {
            let listing = store.list_page(page, 20);
            assert!(listing.patients.is_empty(), "page {page}");
            assert_eq!(listing.total_pages, 1);
        }
    }

    #[test]
    fn single_patient_scenario() {
        let csv = format!("{HEADER}\n{}", csv_row("7", 45, 72));
        let store = DatasetStore::from_reader(csv.as_bytes()).expect("parse");
        let listing = store.list_page(1, 20);

        assert_eq!(listing.patients, vec![PatientId::new("7").expect("id")]);
        assert_eq!(listing.page, 1);
        assert_eq!(listing.total_pages, 1);
    }

    #[test]
    fn empty_dataset_has_no_pages() {
        let store = DatasetStore::from_reader(HEADER.as_bytes()).expect("parse");
        let listing = store.list_page(1, 20);
        assert!(listing.patients.is_empty());
        assert_eq!(listing.total_pages, 0);
    }
}
