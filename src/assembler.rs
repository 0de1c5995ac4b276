// =============================================================================
// assembler.rs - ONE COMPANY, ONE ROW
// =============================================================================
//
// Whatever happened upstream (a clean PDF, a half-broken IR page, a DNS
// failure at 3am), this is where it becomes a CompanyRecord. The status is
// never chosen by the caller; it falls out of what we were handed:
//
//   no text at all            → FAILED   (error says which stage died)
//   text, some/none matched   → PARTIAL
//   text, all four matched    → OK
//
// A degraded record (we found the report link but couldn't read the report)
// is PARTIAL from the page text, with the PDF's failure in `error` so it is
// distinguishable from a page that simply had no link.
// =============================================================================

use tracing::debug;

use crate::error::StageFailure;
use crate::models::{CompanyRecord, ExtractedText, Metric, MetricSet, RecordStatus};
use crate::normalizer;
use crate::text_scanner::MetricExtractor;

pub struct RecordAssembler {
    extractor: MetricExtractor,
    preview_chars: usize,
}

impl RecordAssembler {
    pub fn new(extractor: MetricExtractor, preview_chars: usize) -> Self {
        Self {
            extractor,
            preview_chars,
        }
    }

    /// Build the record for `company_id` from the extraction outcome.
    pub fn assemble(
        &self,
        company_id: &str,
        source_url: &str,
        outcome: &Result<ExtractedText, StageFailure>,
    ) -> CompanyRecord {
        match outcome {
            Ok(text) => self.from_text(company_id, source_url, text, None),
            Err(failure) => CompanyRecord {
                company: company_id.to_string(),
                source_url: source_url.to_string(),
                metrics: MetricSet::empty(),
                raw_preview: String::new(),
                status: RecordStatus::Failed,
                error: Some(failure.reason()),
            },
        }
    }

    /// A record built from fallback text after a later stage failed.
    pub fn assemble_degraded(
        &self,
        company_id: &str,
        source_url: &str,
        text: &ExtractedText,
        cause: &StageFailure,
    ) -> CompanyRecord {
        self.from_text(company_id, source_url, text, Some(cause))
    }

    fn from_text(
        &self,
        company_id: &str,
        source_url: &str,
        text: &ExtractedText,
        cause: Option<&StageFailure>,
    ) -> CompanyRecord {
        let metrics = self.extractor.extract_metrics(&text.text);
        let status = if metrics.found_count() == Metric::ALL.len() {
            RecordStatus::Ok
        } else {
            RecordStatus::Partial
        };

        debug!(
            company = company_id,
            document = %text.document.url,
            kind = %text.document.kind,
            fetched_at = %text.document.fetched_at,
            status = %status,
            found = metrics.found_count(),
            truncated = text.truncated,
            pages_scanned = ?text.pages_scanned,
            "record assembled"
        );

        CompanyRecord {
            company: company_id.to_string(),
            source_url: source_url.to_string(),
            metrics,
            raw_preview: normalizer::truncate_chars(&text.text, self.preview_chars).to_string(),
            status,
            error: cause.map(StageFailure::reason),
        }
    }
}
