// =============================================================================
// error.rs - THE FAILURE TAXONOMY
// =============================================================================
//
// Every stage of the pipeline fails in its own way, and every one of those
// failures ends up as a value, never as a panic that takes the whole batch
// down with it. A company whose IR site is on fire still gets a row in the
// CSV; it just says FETCH:NETWORK_ERROR instead of a Scope 1 number.
//
// The error column in the output is a stable token, not an exception dump.
// Downstream spreadsheets group by it.
// =============================================================================

use std::fmt;

use thiserror::Error;

/// The machine-readable failure kinds. These render as the exact tokens that
/// land in the `error` column, so renaming one is a breaking change for
/// whoever consumes the CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum FailureKind {
    /// DNS, connect, TLS or timeout. The request never produced a status.
    NetworkError,
    /// Non-2xx status from the server.
    HttpError,
    /// 2xx with zero bytes.
    EmptyBody,
    /// Encrypted, corrupt, or a content type we have no extractor for.
    UnreadableFormat,
    /// The document parsed but yielded no characters after normalization.
    EmptyText,
    /// Informational: an HTML page linked to no disclosure PDF.
    NoCandidateLink,
    /// A numeric token was matched but could not be parsed unambiguously.
    ParseAmbiguous,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NetworkError => write!(f, "NETWORK_ERROR"),
            FailureKind::HttpError => write!(f, "HTTP_ERROR"),
            FailureKind::EmptyBody => write!(f, "EMPTY_BODY"),
            FailureKind::UnreadableFormat => write!(f, "UNREADABLE_FORMAT"),
            FailureKind::EmptyText => write!(f, "EMPTY_TEXT"),
            FailureKind::NoCandidateLink => write!(f, "NO_CANDIDATE_LINK"),
            FailureKind::ParseAmbiguous => write!(f, "PARSE_AMBIGUOUS"),
        }
    }
}

/// Which pipeline stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Stage {
    Fetch,
    Extract,
    Resolve,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "FETCH"),
            Stage::Extract => write!(f, "EXTRACT"),
            Stage::Resolve => write!(f, "RESOLVE"),
        }
    }
}

/// Errors surfaced by an [`HttpTransport`](crate::fetcher::HttpTransport).
/// Transports never panic across the boundary; they hand back one of these.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Failures of the Document Fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("empty response body")]
    EmptyBody,

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            // A URL we can't even parse never reaches the network, but from the
            // record's point of view it is the same outcome: nothing came back.
            FetchError::Network(_) | FetchError::InvalidUrl { .. } => FailureKind::NetworkError,
            FetchError::Http { .. } => FailureKind::HttpError,
            FetchError::EmptyBody => FailureKind::EmptyBody,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// Failures of the Content Extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unreadable document: {0}")]
    UnreadableFormat(String),

    #[error("no extractable text")]
    EmptyText,
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::UnreadableFormat(_) => FailureKind::UnreadableFormat,
            ExtractError::EmptyText => FailureKind::EmptyText,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive value")]
    NotPositive { field: &'static str },

    #[error("link keyword list is empty")]
    NoLinkKeywords,

    #[error("failed to build keyword matcher: {0}")]
    Keywords(#[from] aho_corasick::BuildError),

    #[error("failed to compile metric rule {rule_id}: {source}")]
    Rule {
        rule_id: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid CSS selector: {0}")]
    Selector(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures of the output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure pinned to the stage it came from. This is what the Record
/// Assembler turns into the `error` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    /// HTTP status, only for `HTTP_ERROR`.
    pub status: Option<u16>,
}

impl StageFailure {
    pub fn new(stage: Stage, kind: FailureKind) -> Self {
        Self {
            stage,
            kind,
            status: None,
        }
    }

    pub fn from_fetch(err: &FetchError) -> Self {
        Self {
            stage: Stage::Fetch,
            kind: err.kind(),
            status: err.status(),
        }
    }

    pub fn from_extract(err: &ExtractError) -> Self {
        Self::new(Stage::Extract, err.kind())
    }

    /// The short reason string written to the `error` column, e.g.
    /// `FETCH:HTTP_ERROR:404` or `EXTRACT:EMPTY_TEXT`.
    pub fn reason(&self) -> String {
        match self.status {
            Some(status) => format!("{}:{}:{}", self.stage, self.kind, status),
            None => format!("{}:{}", self.stage, self.kind),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}
