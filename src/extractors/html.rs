// =============================================================================
// extractors/html.rs - VISIBLE TEXT FROM IR PAGES
// =============================================================================
//
// Investor-relations pages are 90% navigation, cookie banners and inline
// analytics scripts. We keep every text node a browser would render and drop
// the ones it wouldn't (script, style, noscript, template). No JavaScript is
// executed; pages that build their content client-side come back thin.
// =============================================================================

use scraper::node::Node;
use scraper::Html;

use super::{RawText, TextBackend};
use crate::error::ExtractError;
use crate::normalizer;

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

#[derive(Debug, Clone, Default)]
pub struct HtmlBackend;

impl HtmlBackend {
    pub fn new() -> Self {
        Self
    }
}

impl TextBackend for HtmlBackend {
    fn extract(&self, bytes: &[u8]) -> Result<RawText, ExtractError> {
        let html = normalizer::decode_body(bytes);
        Ok(RawText {
            text: visible_text(&html),
            truncated: false,
            pages_scanned: None,
        })
    }
}

/// Concatenate the rendered text nodes of `html`, separated by spaces.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 4);

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(el) => HIDDEN_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if hidden {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup_scripts_and_styles() {
        let html = r#"<html><head><title>IR</title>
            <style>.x { color: red }</style>
            <script>var scope1 = 99999;</script></head>
            <body><h1>Sustainability</h1>
            <p>Scope 1 emissions: <b>12,345</b> tCO2e</p>
            <noscript>enable js</noscript></body></html>"#;
        let text = normalizer::normalize(&visible_text(html));
        assert!(text.contains("Sustainability"));
        assert!(text.contains("Scope 1 emissions: 12,345 tCO2e"));
        assert!(!text.contains("99999"));
        assert!(!text.contains("color"));
        assert!(!text.contains("enable js"));
    }

    #[test]
    fn test_adjacent_cells_do_not_fuse() {
        let html = "<table><tr><td>Scope 2</td><td>987</td></tr></table>";
        let text = normalizer::normalize(&visible_text(html));
        assert_eq!(text, "Scope 2 987");
    }

    #[test]
    fn test_decodes_entities() {
        let raw = HtmlBackend::new()
            .extract(b"<p>Renewable&nbsp;energy &amp; green power: 45%</p>")
            .unwrap();
        assert_eq!(normalizer::normalize(&raw.text), "Renewable energy & green power: 45%");
    }
}
