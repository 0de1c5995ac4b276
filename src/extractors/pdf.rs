// =============================================================================
// extractors/pdf.rs - PAGE-BOUNDED PDF TEXT
// =============================================================================
//
// Annual reports run to 300+ pages, and the BRSR emissions table is usually
// nowhere near the front. We still only read the first `page_cap` pages:
// parsing the full document for every company would dominate the run, and
// the cap is declared on the result (`truncated`) rather than hidden.
//
// A page that refuses to give up its text (scanned image, odd font encoding)
// contributes an empty string. It does not sink the rest of the document.
// =============================================================================

use lopdf::Document;
use tracing::{debug, trace};

use super::{RawText, TextBackend};
use crate::error::ExtractError;

#[derive(Debug, Clone)]
pub struct PdfBackend {
    page_cap: usize,
}

impl PdfBackend {
    pub fn new(page_cap: usize) -> Self {
        Self { page_cap }
    }
}

impl TextBackend for PdfBackend {
    fn extract(&self, bytes: &[u8]) -> Result<RawText, ExtractError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ExtractError::UnreadableFormat(format!("PDF did not parse: {e}")))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(ExtractError::UnreadableFormat("PDF has no pages".to_string()));
        }

        let raw = collect_pages(&page_numbers, self.page_cap, |page| {
            match doc.extract_text(&[page]) {
                Ok(text) => Some(text),
                Err(e) => {
                    trace!(page, error = %e, "page yielded no text");
                    None
                }
            }
        });

        // Owner-password PDFs usually still extract fine. Only call it
        // unreadable when encryption left us with nothing at all.
        if doc.is_encrypted() && raw.text.trim().is_empty() {
            return Err(ExtractError::UnreadableFormat("PDF is encrypted".to_string()));
        }

        debug!(
            total_pages = page_numbers.len(),
            pages_scanned = raw.pages_scanned.unwrap_or(0),
            "PDF pages scanned"
        );
        Ok(raw)
    }
}

/// Pull text from at most `cap` pages, in document order. `page_text`
/// returning `None` counts as an empty page.
pub(crate) fn collect_pages<F>(page_numbers: &[u32], cap: usize, mut page_text: F) -> RawText
where
    F: FnMut(u32) -> Option<String>,
{
    let scanned = page_numbers.len().min(cap);
    let mut pages = Vec::with_capacity(scanned);
    for &page in &page_numbers[..scanned] {
        pages.push(page_text(page).unwrap_or_default());
    }

    RawText {
        text: pages.join("\n"),
        truncated: page_numbers.len() > cap,
        pages_scanned: Some(scanned),
    }
}
