// =============================================================================
// config.rs - THE CONTROL PANEL
// =============================================================================
//
// Every number the pipeline depends on lives here: the page cap, the preview
// budget, the regex lookahead window, the keyword list that decides which PDF
// on an IR page is "the report". Nothing in the matching code hardcodes any
// of them; they are handed to each component when it is built.
//
// All values can be overridden via GHG_* environment variables (or a .env
// file). Bad values fall back to the default instead of crashing a run that
// is going to take twenty minutes anyway.
// =============================================================================

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::error::ConfigError;
use crate::models::CompanyTarget;

/// A browser-shaped User-Agent. A surprising number of IR sites answer a
/// bare `reqwest/0.12` with a 403.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/pdf;q=0.9,*/*;q=0.8";

const DEFAULT_LINK_KEYWORDS: &str = "annual,sustainability,esg,responsibility,brsr,climate";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Every tunable in the engine.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // NETWORK
    // =========================================================================
    /// Per-request timeout. Applies to each network call, not the whole
    /// company run. Default: 30 seconds.
    pub request_timeout: Duration,

    pub user_agent: String,

    /// `Accept` header sent with every request.
    pub accept: String,

    /// How many companies are processed at once. Default: 4, which keeps us
    /// polite towards the handful of IR hosts that serve several entries.
    pub worker_limit: usize,

    // =========================================================================
    // EXTRACTION
    // =========================================================================
    /// Maximum PDF pages scanned per document. Default: 10.
    pub pdf_page_cap: usize,

    /// Maximum characters of HTML visible text kept per document.
    pub max_text_chars: usize,

    /// Characters kept in `raw_preview`. Default: 500.
    pub preview_chars: usize,

    /// Maximum non-digit characters between a metric anchor and its number.
    /// Default: 10. Wider windows find more and are wrong more often.
    pub lookahead_window: usize,

    /// Keywords a PDF link (href or anchor text) must contain to be followed.
    pub link_keywords: Vec<String>,

    // =========================================================================
    // INPUT / OUTPUT
    // =========================================================================
    /// JSON feed file. When unset, the built-in feed is used.
    pub companies_file: Option<PathBuf>,

    /// Where the CSV lands. Default: data/ghg_records.csv
    pub output_path: PathBuf,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            worker_limit: 4,
            pdf_page_cap: 10,
            max_text_chars: 2_000_000,
            preview_chars: 500,
            lookahead_window: 10,
            link_keywords: split_list(DEFAULT_LINK_KEYWORDS),
            companies_file: None,
            output_path: PathBuf::from("data/ghg_records.csv"),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Config::default();

        Config {
            request_timeout: Duration::from_secs(env_parse(
                "GHG_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            user_agent: env_or_default("GHG_USER_AGENT", &defaults.user_agent),
            accept: env_or_default("GHG_ACCEPT", &defaults.accept),
            worker_limit: env_parse("GHG_WORKER_LIMIT", defaults.worker_limit),

            pdf_page_cap: env_parse("GHG_PDF_PAGE_CAP", defaults.pdf_page_cap),
            max_text_chars: env_parse("GHG_MAX_TEXT_CHARS", defaults.max_text_chars),
            preview_chars: env_parse("GHG_PREVIEW_CHARS", defaults.preview_chars),
            lookahead_window: env_parse("GHG_LOOKAHEAD_WINDOW", defaults.lookahead_window),
            link_keywords: split_list(&env_or_default("GHG_LINK_KEYWORDS", DEFAULT_LINK_KEYWORDS)),

            companies_file: env::var("GHG_COMPANIES_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            output_path: env::var("GHG_OUTPUT_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
            log_format: match env_or_default("GHG_LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }

    /// Reject values that would make a component misbehave rather than
    /// merely be slow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::NotPositive { field: "request_timeout" });
        }
        if self.worker_limit == 0 {
            return Err(ConfigError::NotPositive { field: "worker_limit" });
        }
        if self.pdf_page_cap == 0 {
            return Err(ConfigError::NotPositive { field: "pdf_page_cap" });
        }
        if self.max_text_chars == 0 {
            return Err(ConfigError::NotPositive { field: "max_text_chars" });
        }
        if self.link_keywords.is_empty() {
            return Err(ConfigError::NoLinkKeywords);
        }
        Ok(())
    }

    /// Headers sent with every request.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept".to_string(), self.accept.clone()),
        ]
    }

    /// The input feed: the JSON file if one is configured, otherwise the
    /// built-in list.
    pub fn load_feed(&self) -> anyhow::Result<Vec<CompanyTarget>> {
        match &self.companies_file {
            Some(path) => load_feed_file(path),
            None => Ok(default_feed()),
        }
    }
}

/// Read a JSON array of `{ "company_id": ..., "seed_url": ... }`.
pub fn load_feed_file(path: &Path) -> anyhow::Result<Vec<CompanyTarget>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read companies file {}", path.display()))?;
    let feed: Vec<CompanyTarget> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse companies file {}", path.display()))?;
    Ok(feed)
}

/// The built-in feed. Large Indian listed companies whose integrated annual
/// reports carry a BRSR section with the emissions tables; the seeds point
/// straight at the report PDFs.
pub fn default_feed() -> Vec<CompanyTarget> {
    vec![
        CompanyTarget::new(
            "Reliance Industries",
            "https://www.ril.com/reports/RIL-Integrated-Annual-Report-2024-25.pdf",
        ),
        CompanyTarget::new(
            "TCS",
            "https://www.tcs.com/content/dam/tcs/investor-relations/financial-statements/2023-24/ar/annual-report-2023-2024.pdf",
        ),
        CompanyTarget::new(
            "Infosys",
            "https://www.infosys.com/investors/reports-filings/annual-report/annual/documents/infosys-ar-25.pdf",
        ),
        CompanyTarget::new(
            "HDFC Bank",
            "https://www.hdfcbank.com/content/api/contentstream/723fb80a-2dde-42a3-9793-7ae1be57c87f/Footer/About%20Us/Investor%20Relation/annual%20reports/pdf/Integrated%20Annual%20Report%202022-23.pdf",
        ),
        CompanyTarget::new(
            "ICICI Bank",
            "https://www.icicibank.com/content/dam/icicibank/managed-assets/docs/investor/annual-reports/2024/annual-report-of-icici-bank-2023-24.pdf",
        ),
    ]
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
