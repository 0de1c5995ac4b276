// =============================================================================
// sink.rs - THE CSV AT THE END OF THE TUNNEL
// =============================================================================
//
// One row per company, one column per field, metrics flattened to
// `<metric>_value` / `<metric>_unit`. The header is a contract with whoever
// loads this into a spreadsheet, so it's spelled out literally below rather
// than derived from the structs.
//
// An absent metric is two empty cells. An ambiguous number keeps its raw
// token in the value cell, so "1.234,5" is still visible to a human.
// =============================================================================

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::SinkError;
use crate::models::{CompanyRecord, MetricMatch};

pub const HEADER: [&str; 13] = [
    "company",
    "source_url",
    "status",
    "scope1_value",
    "scope1_unit",
    "scope2_value",
    "scope2_unit",
    "scope3_value",
    "scope3_unit",
    "renewable_energy_value",
    "renewable_energy_unit",
    "raw_preview",
    "error",
];

/// Writes records to a CSV file, creating parent directories as needed.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file with `records`, sorted by company.
    pub fn write(&self, records: &[CompanyRecord]) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        write_records(BufWriter::new(file), records)?;

        info!(path = %self.path.display(), rows = records.len(), "CSV written");
        Ok(())
    }
}

/// Serialize `records` as CSV into `writer`: header first, then one row per
/// record ordered by company identifier.
pub fn write_records<W: Write>(writer: W, records: &[CompanyRecord]) -> Result<(), SinkError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    let mut sorted: Vec<&CompanyRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.company.cmp(&b.company));

    for record in sorted {
        csv.write_record(row(record))?;
    }
    csv.flush()?;
    Ok(())
}

fn row(record: &CompanyRecord) -> Vec<String> {
    let mut cells = Vec::with_capacity(HEADER.len());
    cells.push(record.company.clone());
    cells.push(record.source_url.clone());
    cells.push(record.status.to_string());
    for (_, found) in record.metrics.iter() {
        cells.push(value_cell(found));
        cells.push(found.and_then(|m| m.unit.clone()).unwrap_or_default());
    }
    cells.push(record.raw_preview.clone());
    cells.push(record.error.clone().unwrap_or_default());
    cells
}

fn value_cell(found: Option<&MetricMatch>) -> String {
    match found {
        Some(m) => m
            .numeric_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| m.raw_value.clone()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metric, MetricSet, RecordStatus};

    fn record(company: &str, status: RecordStatus) -> CompanyRecord {
        CompanyRecord {
            company: company.to_string(),
            source_url: format!("https://{}.example/ar.pdf", company.to_lowercase()),
            metrics: MetricSet::empty(),
            raw_preview: String::new(),
            status,
            error: None,
        }
    }

    fn matched(metric: Metric, raw: &str, numeric: Option<f64>, unit: Option<&str>) -> MetricMatch {
        MetricMatch {
            metric,
            raw_value: raw.to_string(),
            numeric_value: numeric,
            unit: unit.map(str::to_string),
            rule_id: format!("{}.unit_suffixed", metric.key()),
        }
    }

    fn to_string(records: &[CompanyRecord]) -> String {
        let mut buf = Vec::new();
        write_records(&mut buf, records).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_header_is_exact() {
        let out = to_string(&[]);
        assert_eq!(
            out.lines().next().unwrap(),
            "company,source_url,status,scope1_value,scope1_unit,scope2_value,scope2_unit,\
             scope3_value,scope3_unit,renewable_energy_value,renewable_energy_unit,raw_preview,error"
        );
    }

    #[test]
    fn test_metric_cells() {
        let mut r = record("Acme", RecordStatus::Partial);
        r.metrics
            .set(Metric::Scope1, Some(matched(Metric::Scope1, "12,345.6", Some(12345.6), Some("tCO2e"))));
        r.metrics
            .set(Metric::Scope3, Some(matched(Metric::Scope3, "1.234,5", None, Some("tCO2e"))));
        r.raw_preview = "Scope 1 emissions: 12,345.6 tCO2e".to_string();

        let out = to_string(&[r]);
        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[2], "PARTIAL");
        assert_eq!(&row[3], "12345.6");
        assert_eq!(&row[4], "tCO2e");
        assert_eq!(&row[5], "");
        assert_eq!(&row[6], "");
        assert_eq!(&row[7], "1.234,5");
        assert_eq!(&row[11], "Scope 1 emissions: 12,345.6 tCO2e");
        assert_eq!(&row[12], "");
    }

    #[test]
    fn test_failed_row_has_error_and_empty_metrics() {
        let mut r = record("Broken", RecordStatus::Failed);
        r.error = Some("FETCH:NETWORK_ERROR".to_string());
        let out = to_string(&[r]);
        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(&row[2], "FAILED");
        assert!((3..=10).all(|i| row[i].is_empty()));
        assert_eq!(&row[12], "FETCH:NETWORK_ERROR");
    }

    #[test]
    fn test_rows_sorted_by_company() {
        let out = to_string(&[
            record("Zeta", RecordStatus::Partial),
            record("Alpha", RecordStatus::Failed),
        ]);
        let companies: Vec<&str> = out.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(companies, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_sink_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("ghg_records.csv");
        let sink = CsvSink::new(&path);
        sink.write(&[record("Acme", RecordStatus::Partial)]).unwrap();

        let written = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("https://acme.example/ar.pdf"));
    }
}
