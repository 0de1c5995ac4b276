// =============================================================================
// pipeline.rs - SEED URL IN, COMPANY RECORD OUT
// =============================================================================
//
// Per company:
//
//   fetch seed ──► PDF? ───────────────────────────► extract ──► assemble
//        │
//        └──► HTML ──► find report link ──► fetch PDF ──► extract ──► assemble
//                            │                   │
//                            │ none              │ failed
//                            ▼                   ▼
//                     scan the page        scan the page, keep the PDF's
//                                          failure in `error`
//
// Every stage hands back a value. Nothing in one company's run can take
// down another's, and the batch always returns exactly one record per feed
// entry, duplicates and garbage URLs included.
//
// Companies run concurrently up to `worker_limit`. There's no shared mutable
// state between them; the fetcher, extractor and rule table are read-only
// and cloned/shared freely.
// =============================================================================

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, info_span, warn, Instrument};
use url::Url;

use crate::assembler::RecordAssembler;
use crate::config::Config;
use crate::error::{ConfigError, FailureKind, Stage, StageFailure};
use crate::extractors::ContentExtractor;
use crate::fetcher::{DocumentFetcher, HttpTransport};
use crate::link_resolver::LinkResolver;
use crate::models::{CandidateLink, CompanyRecord, CompanyTarget, DocumentKind, ExtractedText, SourceDocument};
use crate::normalizer;
use crate::text_scanner::MetricExtractor;

#[derive(Clone)]
pub struct Pipeline {
    fetcher: DocumentFetcher,
    extractor: ContentExtractor,
    resolver: Arc<LinkResolver>,
    assembler: Arc<RecordAssembler>,
    worker_limit: usize,
}

impl Pipeline {
    /// Wire every stage from `config`. Fails only on configuration errors,
    /// never on anything a company's documents could do.
    pub fn new(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<Self, ConfigError> {
        config.validate()?;

        let fetcher = DocumentFetcher::new(transport, config.request_timeout, config.request_headers())?;
        let extractor = ContentExtractor::new(config.pdf_page_cap, config.max_text_chars);
        let resolver = LinkResolver::new(&config.link_keywords)?;
        let metric_extractor = MetricExtractor::new(config.lookahead_window)?;

        Ok(Self {
            fetcher,
            extractor,
            resolver: Arc::new(resolver),
            assembler: Arc::new(RecordAssembler::new(metric_extractor, config.preview_chars)),
            worker_limit: config.worker_limit,
        })
    }

    /// Run one company end to end. Always returns a record.
    pub async fn run_company(&self, target: &CompanyTarget) -> CompanyRecord {
        let span = info_span!("company", company = %target.company_id);
        async {
            let record = self.process(target).await;
            info!(
                status = %record.status,
                metrics_found = record.metrics.found_count(),
                source = %record.source_url,
                error = record.error.as_deref().unwrap_or("-"),
                "company done"
            );
            record
        }
        .instrument(span)
        .await
    }

    /// Run the whole feed with at most `worker_limit` companies in flight.
    /// The result has one record per entry, sorted by company identifier
    /// (feed order among equal identifiers), independent of completion order.
    pub async fn run_batch(&self, feed: &[CompanyTarget]) -> Vec<CompanyRecord> {
        info!(
            companies = feed.len(),
            worker_limit = self.worker_limit,
            "starting batch pass"
        );

        let mut indexed: Vec<(usize, CompanyRecord)> = stream::iter(feed.iter().enumerate())
            .map(|(idx, target)| async move { (idx, self.run_company(target).await) })
            .buffer_unordered(self.worker_limit)
            .collect()
            .await;

        indexed.sort_by(|(ia, a), (ib, b)| a.company.cmp(&b.company).then(ia.cmp(ib)));
        indexed.into_iter().map(|(_, record)| record).collect()
    }

    async fn process(&self, target: &CompanyTarget) -> CompanyRecord {
        let company = target.company_id.as_str();

        let seed = match self.fetcher.fetch_str(&target.seed_url).await {
            Ok(doc) => doc,
            Err(e) => {
                let failure = StageFailure::from_fetch(&e);
                warn!(url = %target.seed_url, reason = %failure, error = %e, "seed fetch failed");
                return self.assembler.assemble(company, &target.seed_url, &Err(failure));
            }
        };
        let seed_url = seed.url.to_string();

        // A seed that is already the report goes straight to extraction.
        if seed.kind != DocumentKind::Html {
            let outcome = self.extract(seed).await;
            return self.assembler.assemble(company, &seed_url, &outcome);
        }

        let Some(link) = self.resolve(&seed).await else {
            let note = StageFailure::new(Stage::Resolve, FailureKind::NoCandidateLink);
            info!(url = %seed_url, reason = %note, "no report link on page; scanning the page itself");
            let outcome = self.extract(seed).await;
            return self.assembler.assemble(company, &seed_url, &outcome);
        };

        info!(
            href = %link.href,
            anchor = %link.anchor_text,
            score = link.score,
            "following report link"
        );

        match self.follow(&link.href).await {
            Ok(text) => self.assembler.assemble(company, link.href.as_str(), &Ok(text)),
            Err(failure) => {
                warn!(href = %link.href, reason = %failure, "report link unusable; falling back to page text");
                match self.extract(seed).await {
                    Ok(page_text) => self
                        .assembler
                        .assemble_degraded(company, &seed_url, &page_text, &failure),
                    Err(_) => self.assembler.assemble(company, &seed_url, &Err(failure)),
                }
            }
        }
    }

    async fn extract(&self, document: SourceDocument) -> Result<ExtractedText, StageFailure> {
        let url = document.url.clone();
        self.extractor.extract_blocking(document).await.map_err(|e| {
            let failure = StageFailure::from_extract(&e);
            warn!(url = %url, reason = %failure, error = %e, "extraction failed");
            failure
        })
    }

    /// The best report link on an HTML page. HTML parsing is CPU work, so it
    /// runs on the blocking pool like extraction does.
    async fn resolve(&self, page: &SourceDocument) -> Option<CandidateLink> {
        let resolver = self.resolver.clone();
        let bytes = page.bytes.clone();
        let base = page.url.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let html = normalizer::decode_body(&bytes);
            resolver.select(&html, &base)
        })
        .await;

        match joined {
            Ok(link) => link,
            Err(e) => {
                warn!(url = %page.url, error = %e, "link resolution task died");
                None
            }
        }
    }

    async fn follow(&self, href: &Url) -> Result<ExtractedText, StageFailure> {
        let document = self
            .fetcher
            .fetch(href)
            .await
            .map_err(|e| StageFailure::from_fetch(&e))?;
        self.extract(document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metric, RecordStatus};
    use crate::testing::{pdf_with_pages, FakeTransport};

    fn pipeline(transport: FakeTransport) -> Pipeline {
        Pipeline::new(&Config::default(), Arc::new(transport)).unwrap()
    }

    const IR_PAGE: &str = r#"<html><body>
        <h1>Investor Relations</h1>
        <p>Scope 2 emissions: 400 tCO2e</p>
        <a href="/legal/privacy.pdf">Privacy Policy</a>
        <a href="/reports/sustainability-2024.pdf">Sustainability Report 2024</a>
    </body></html>"#;

    #[tokio::test]
    async fn test_timeout_yields_failed_record() {
        let p = pipeline(FakeTransport::new().with_timeout("https://slow.example/ir"));
        let record = p
            .run_company(&CompanyTarget::new("Slow Co", "https://slow.example/ir"))
            .await;
        assert_eq!(record.status, RecordStatus::Failed);
        assert!(record.error.as_deref().unwrap().starts_with("FETCH:"));
        assert_eq!(record.metrics.iter().filter(|(_, m)| m.is_none()).count(), 4);
        assert_eq!(record.source_url, "https://slow.example/ir");
    }

    #[tokio::test]
    async fn test_direct_pdf_seed() {
        let pdf = pdf_with_pages(&["Scope 1 emissions: 12,345.6 tCO2e"]);
        let p = pipeline(FakeTransport::new().with_body(
            "https://acme.example/ar.pdf",
            "application/pdf",
            &pdf,
        ));
        let record = p
            .run_company(&CompanyTarget::new("Acme", "https://acme.example/ar.pdf"))
            .await;
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.error, None);
        let scope1 = record.metrics.get(Metric::Scope1).unwrap();
        assert_eq!(scope1.numeric_value, Some(12345.6));
        assert_eq!(scope1.unit.as_deref(), Some("tCO2e"));
    }

    #[tokio::test]
    async fn test_html_seed_follows_report_link() {
        let pdf = pdf_with_pages(&["Scope 1 emissions: 900 tCO2e", "Scope 3 emissions: 5,000 tCO2e"]);
        let p = pipeline(
            FakeTransport::new()
                .with_body("https://acme.example/ir", "text/html", IR_PAGE.as_bytes())
                .with_body(
                    "https://acme.example/reports/sustainability-2024.pdf",
                    "application/pdf",
                    &pdf,
                ),
        );
        let record = p.run_company(&CompanyTarget::new("Acme", "https://acme.example/ir")).await;
        assert_eq!(record.source_url, "https://acme.example/reports/sustainability-2024.pdf");
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.error, None);
        assert_eq!(
            record.metrics.get(Metric::Scope3).and_then(|m| m.numeric_value),
            Some(5000.0)
        );
        // Page text is not mixed in once the report was read.
        assert!(record.metrics.get(Metric::Scope2).is_none());
    }

    #[tokio::test]
    async fn test_broken_report_link_falls_back_to_page_text() {
        let p = pipeline(
            FakeTransport::new()
                .with_body("https://acme.example/ir", "text/html", IR_PAGE.as_bytes())
                .with_status("https://acme.example/reports/sustainability-2024.pdf", 404),
        );
        let record = p.run_company(&CompanyTarget::new("Acme", "https://acme.example/ir")).await;
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.source_url, "https://acme.example/ir");
        assert_eq!(record.error.as_deref(), Some("FETCH:HTTP_ERROR:404"));
        assert_eq!(
            record.metrics.get(Metric::Scope2).and_then(|m| m.numeric_value),
            Some(400.0)
        );
        assert!(record.raw_preview.contains("Investor Relations"));
    }

    #[tokio::test]
    async fn test_page_without_report_link_is_scanned_directly() {
        let page = "<html><body><p>Renewable energy share: 62%</p></body></html>";
        let p = pipeline(FakeTransport::new().with_body("https://acme.example/esg", "text/html", page.as_bytes()));
        let record = p.run_company(&CompanyTarget::new("Acme", "https://acme.example/esg")).await;
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.error, None);
        assert_eq!(
            record.metrics.get(Metric::RenewableEnergy).and_then(|m| m.numeric_value),
            Some(62.0)
        );
    }

    #[tokio::test]
    async fn test_unknown_document_is_unreadable() {
        let p = pipeline(FakeTransport::new().with_body(
            "https://acme.example/logo",
            "image/png",
            b"\x89PNG\r\n\x1a\n",
        ));
        let record = p.run_company(&CompanyTarget::new("Acme", "https://acme.example/logo")).await;
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("EXTRACT:UNREADABLE_FORMAT"));
    }

    #[tokio::test]
    async fn test_batch_keeps_every_entry_and_sorts() {
        let page = "<html><body>Scope 1: 10 tCO2e</body></html>";
        let transport = FakeTransport::new()
            .with_body("https://b.example/ir", "text/html", page.as_bytes())
            .with_timeout("https://c.example/ir");
        let p = pipeline(transport);

        let feed = vec![
            CompanyTarget::new("Charlie", "https://c.example/ir"),
            CompanyTarget::new("Bravo", "https://b.example/ir"),
            CompanyTarget::new("Alpha", "definitely not a url"),
            CompanyTarget::new("Bravo", "https://b.example/ir"),
        ];
        let records = p.run_batch(&feed).await;

        assert_eq!(records.len(), feed.len());
        let names: Vec<&str> = records.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Bravo", "Bravo", "Charlie"]);
        assert_eq!(records[0].error.as_deref(), Some("FETCH:NETWORK_ERROR"));
        assert_eq!(records[1].status, RecordStatus::Partial);
        assert_eq!(records[1], records[2]);
        assert_eq!(records[3].status, RecordStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = Config {
            worker_limit: 0,
            ..Config::default()
        };
        assert!(Pipeline::new(&config, Arc::new(FakeTransport::new())).is_err());
    }
}
