// =============================================================================
// link_resolver.rs - FINDING THE REPORT ON THE IR PAGE
// =============================================================================
//
// An investor-relations page links to dozens of PDFs: privacy policies,
// AGM notices, postal ballot forms, the code of conduct. Exactly one of them
// is the annual or sustainability report we want.
//
// A link is a candidate when its target path ends in .pdf AND its href or
// anchor text mentions one of the configured keywords. Candidates are scored
// (keyword in the anchor text beats keyword only in the href) and ties go to
// whichever came first in the page. That's the whole ranking; no file-size
// guessing, no position heuristics, so a fixture always picks the same link.
// =============================================================================

use std::collections::HashMap;

use aho_corasick::AhoCorasick;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::error::ConfigError;
use crate::models::CandidateLink;
use crate::normalizer;

/// Score for a keyword in the visible anchor text.
const ANCHOR_SCORE: f64 = 2.0;
/// Score for a keyword that only appears in the href.
const HREF_SCORE: f64 = 1.0;

pub struct LinkResolver {
    keywords: AhoCorasick,
    pdf_hint: AhoCorasick,
    anchor_selector: Selector,
}

impl LinkResolver {
    pub fn new(keywords: &[String]) -> Result<Self, ConfigError> {
        if keywords.is_empty() {
            return Err(ConfigError::NoLinkKeywords);
        }
        let keywords = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(keywords)?;
        let pdf_hint = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build([".pdf"])?;
        let anchor_selector =
            Selector::parse("a[href]").map_err(|e| ConfigError::Selector(e.to_string()))?;
        Ok(Self {
            keywords,
            pdf_hint,
            anchor_selector,
        })
    }

    /// All candidate PDF links in `html`, best first. Equal scores keep
    /// document order. Empty when nothing qualifies.
    pub fn resolve_candidates(&self, html: &str, base_url: &Url) -> Vec<CandidateLink> {
        // A page with no ".pdf" anywhere, in any case, has no candidates.
        if !self.pdf_hint.is_match(html) {
            return Vec::new();
        }

        let document = Html::parse_document(html);
        let mut position: HashMap<Url, usize> = HashMap::new();
        let mut candidates: Vec<CandidateLink> = Vec::new();

        for anchor in document.select(&self.anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') {
                continue;
            }

            let Ok(resolved) = base_url.join(href) else {
                debug!(href, "skipping unresolvable href");
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            if !resolved.path().to_ascii_lowercase().ends_with(".pdf") {
                continue;
            }

            let anchor_text = normalizer::normalize(&anchor.text().collect::<String>());
            let score = if self.keywords.is_match(&anchor_text) {
                ANCHOR_SCORE
            } else if self.keywords.is_match(href) {
                HREF_SCORE
            } else {
                continue;
            };

            // A URL linked twice keeps its first position and its best score.
            if let Some(&idx) = position.get(&resolved) {
                let existing = &mut candidates[idx];
                if score > existing.score {
                    existing.score = score;
                    existing.anchor_text = anchor_text;
                }
                continue;
            }
            position.insert(resolved.clone(), candidates.len());

            candidates.push(CandidateLink {
                href: resolved,
                anchor_text,
                score,
            });
        }

        // Stable sort: ties stay in document order.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            base = %base_url,
            candidates = candidates.len(),
            "resolved candidate links"
        );
        candidates
    }

    /// The single link the pipeline follows, if any.
    pub fn select(&self, html: &str, base_url: &Url) -> Option<CandidateLink> {
        self.resolve_candidates(html, base_url).into_iter().next()
    }
}
