// =============================================================================
// extractors/mod.rs - BYTES IN, TEXT OUT
// =============================================================================
//
// One backend per document kind. The kind was decided at fetch time; the
// ContentExtractor looks it up exactly once and hands the bytes to the right
// backend. Callers never inspect a document's type themselves.
//
// Every backend returns raw text. Normalization, the character cap and the
// "did we get anything at all?" check happen here, once, for all of them.
// =============================================================================

pub mod html;
pub mod pdf;

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::ExtractError;
use crate::models::{DocumentKind, ExtractedText, SourceDocument};
use crate::normalizer;

pub use html::HtmlBackend;
pub use pdf::PdfBackend;

/// What a backend pulls out of a document before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawText {
    pub text: String,
    /// Set when the backend stopped before the end of the document.
    pub truncated: bool,
    pub pages_scanned: Option<usize>,
}

/// A text extraction strategy for one document kind. Swappable, as long as it
/// keeps to visible text for HTML and page-bounded text for PDF.
pub trait TextBackend: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<RawText, ExtractError>;
}

/// Dispatches a [`SourceDocument`] to the backend for its kind.
#[derive(Clone)]
pub struct ContentExtractor {
    pdf: Arc<dyn TextBackend>,
    html: Arc<dyn TextBackend>,
    max_text_chars: usize,
}

impl ContentExtractor {
    pub fn new(pdf_page_cap: usize, max_text_chars: usize) -> Self {
        Self::with_backends(
            Arc::new(PdfBackend::new(pdf_page_cap)),
            Arc::new(HtmlBackend::new()),
            max_text_chars,
        )
    }

    pub fn with_backends(
        pdf: Arc<dyn TextBackend>,
        html: Arc<dyn TextBackend>,
        max_text_chars: usize,
    ) -> Self {
        Self {
            pdf,
            html,
            max_text_chars,
        }
    }

    fn backend_for(&self, kind: DocumentKind) -> Option<&dyn TextBackend> {
        match kind {
            DocumentKind::Pdf => Some(self.pdf.as_ref()),
            DocumentKind::Html => Some(self.html.as_ref()),
            DocumentKind::Unknown => None,
        }
    }

    /// Extract normalized text from `document`.
    pub fn extract(&self, document: &SourceDocument) -> Result<ExtractedText, ExtractError> {
        let backend = self.backend_for(document.kind).ok_or_else(|| {
            ExtractError::UnreadableFormat(format!("no extractor for {} documents", document.kind))
        })?;

        let raw = backend.extract(&document.bytes)?;
        let normalized = normalizer::normalize(&raw.text);
        if normalized.is_empty() {
            return Err(ExtractError::EmptyText);
        }

        let capped = normalizer::truncate_chars(&normalized, self.max_text_chars);
        let char_capped = capped.len() < normalized.len();
        let text = if char_capped {
            capped.to_string()
        } else {
            normalized
        };

        debug!(
            url = %document.url,
            kind = %document.kind,
            chars = text.chars().count(),
            pages_scanned = ?raw.pages_scanned,
            truncated = raw.truncated || char_capped,
            "extracted text"
        );

        Ok(ExtractedText {
            document: document.reference(),
            text,
            truncated: raw.truncated || char_capped,
            pages_scanned: raw.pages_scanned,
        })
    }

    /// [`extract`](Self::extract) on the blocking pool. Parsing a large PDF
    /// is pure CPU and would otherwise stall every other company's I/O. A
    /// panicking parser is reported as an unreadable document.
    pub async fn extract_blocking(&self, document: SourceDocument) -> Result<ExtractedText, ExtractError> {
        let extractor = self.clone();
        let url = document.url.clone();
        match tokio::task::spawn_blocking(move || extractor.extract(&document)).await {
            Ok(result) => result,
            Err(join_err) => {
                error!(url = %url, error = %join_err, "extractor task died");
                Err(ExtractError::UnreadableFormat(format!("extractor aborted: {join_err}")))
            }
        }
    }
}
