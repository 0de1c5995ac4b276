// =============================================================================
// models.rs - THE DATA STRUCTURES OF CORPORATE CARBON
// =============================================================================
//
// Everything that flows through the pipeline, from the raw bytes of a
// 300-page annual report to the single CSV row that comes out the other end.
//
// Two rules hold everywhere in here:
//   * Nothing is mutated after it is built. A record is assembled once.
//   * A metric that wasn't found is `None`, never a zero somebody made up.
// =============================================================================

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of document a fetch produced. Decided once, at fetch time, and
/// used by the Content Extractor to pick a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DocumentKind {
    Html,
    Pdf,
    Unknown,
}

impl DocumentKind {
    /// Detect the kind from the declared content type, then the URL path
    /// extension, then the first bytes of the body.
    pub fn detect(content_type: Option<&str>, url: &Url, bytes: &[u8]) -> Self {
        if let Some(ct) = content_type {
            let mime = ct
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            match mime.as_str() {
                "application/pdf" | "application/x-pdf" => return DocumentKind::Pdf,
                "text/html" | "application/xhtml+xml" => return DocumentKind::Html,
                _ => {}
            }
        }

        let path = url.path().to_ascii_lowercase();
        if path.ends_with(".pdf") {
            return DocumentKind::Pdf;
        }
        if path.ends_with(".html") || path.ends_with(".htm") {
            return DocumentKind::Html;
        }

        // Plenty of CMSes serve PDFs as application/octet-stream from
        // extensionless URLs. The magic number doesn't lie.
        if bytes.starts_with(b"%PDF-") {
            return DocumentKind::Pdf;
        }
        let head = bytes[..bytes.len().min(512)].to_ascii_lowercase();
        if memchr::memmem::find(&head, b"<html").is_some()
            || memchr::memmem::find(&head, b"<!doctype").is_some()
        {
            return DocumentKind::Html;
        }

        DocumentKind::Unknown
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Html => write!(f, "HTML"),
            DocumentKind::Pdf => write!(f, "PDF"),
            DocumentKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A fetched document. Owned by the pipeline invocation that fetched it and
/// dropped as soon as its text has been extracted.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub url: Url,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl SourceDocument {
    /// A lightweight handle that outlives the bytes.
    pub fn reference(&self) -> DocumentRef {
        DocumentRef {
            url: self.url.clone(),
            kind: self.kind,
            fetched_at: self.fetched_at,
        }
    }
}

/// Identity of a [`SourceDocument`] without its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub url: Url,
    pub kind: DocumentKind,
    pub fetched_at: DateTime<Utc>,
}

/// Text pulled out of a document.
///
/// `truncated` is set whenever only a bounded prefix was scanned (page cap for
/// PDFs, character cap for HTML). That is a declared property of the
/// extraction, not an error.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub document: DocumentRef,
    pub text: String,
    pub truncated: bool,
    /// Pages examined, PDFs only.
    pub pages_scanned: Option<usize>,
}

/// A hyperlink that might be the disclosure document we are after.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLink {
    pub href: Url,
    pub anchor_text: String,
    pub score: f64,
}

/// The four tracked metrics. The order here is the column order in the CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Metric {
    Scope1,
    Scope2,
    Scope3,
    RenewableEnergy,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Scope1,
        Metric::Scope2,
        Metric::Scope3,
        Metric::RenewableEnergy,
    ];

    /// Column prefix in the output (`scope1_value`, `renewable_energy_unit`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Scope1 => "scope1",
            Metric::Scope2 => "scope2",
            Metric::Scope3 => "scope3",
            Metric::RenewableEnergy => "renewable_energy",
        }
    }

    fn index(&self) -> usize {
        match self {
            Metric::Scope1 => 0,
            Metric::Scope2 => 1,
            Metric::Scope3 => 2,
            Metric::RenewableEnergy => 3,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Scope1 => write!(f, "SCOPE1"),
            Metric::Scope2 => write!(f, "SCOPE2"),
            Metric::Scope3 => write!(f, "SCOPE3"),
            Metric::RenewableEnergy => write!(f, "RENEWABLE_ENERGY"),
        }
    }
}

/// One successful rule match for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMatch {
    pub metric: Metric,
    /// The numeric token exactly as it appeared in the text.
    pub raw_value: String,
    /// `None` when `raw_value` could not be parsed unambiguously.
    pub numeric_value: Option<f64>,
    /// Canonical unit spelling from the closed vocabulary.
    pub unit: Option<String>,
    /// Which rule produced this match.
    pub rule_id: String,
}

/// Exactly one slot per tracked metric. A slot can be empty; it can never be
/// missing, because there is no way to build a `MetricSet` without all four.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    slots: [Option<MetricMatch>; 4],
}

impl MetricSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricMatch> {
        self.slots[metric.index()].as_ref()
    }

    pub fn set(&mut self, metric: Metric, value: Option<MetricMatch>) {
        self.slots[metric.index()] = value;
    }

    /// All four entries, in [`Metric::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<&MetricMatch>)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    pub fn found_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Outcome of one company's pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordStatus {
    /// All four metrics matched. Rare.
    Ok,
    /// Text was obtained; some (possibly zero) metrics matched.
    Partial,
    /// No text at all.
    Failed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Ok => write!(f, "OK"),
            RecordStatus::Partial => write!(f, "PARTIAL"),
            RecordStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// The unit of output: one per company per run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyRecord {
    pub company: String,
    pub source_url: String,
    pub metrics: MetricSet,
    pub raw_preview: String,
    pub status: RecordStatus,
    pub error: Option<String>,
}

/// One entry of the input feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyTarget {
    pub company_id: String,
    /// Kept as a string so a malformed URL still produces a row.
    pub seed_url: String,
}

impl CompanyTarget {
    pub fn new(company_id: impl Into<String>, seed_url: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            seed_url: seed_url.into(),
        }
    }
}
