// =============================================================================
// normalizer.rs - THE TEXT LAUNDROMAT
// =============================================================================
//
// PDF text layers come out with form feeds, stray NULs, non-breaking spaces
// and forty blank lines between "Scope 1" and the number next to it. HTML is
// no better. Everything goes through here before a regex ever sees it, so the
// matching rules only have to deal with single spaces.
// =============================================================================

use std::borrow::Cow;

/// Collapse every whitespace run to one ASCII space, drop control characters,
/// and trim both ends.
pub fn normalize(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let mut last_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else if ch.is_control() || is_invisible(ch) {
            // dropped without breaking the surrounding word
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    if buf.ends_with(' ') {
        buf.pop();
    }
    buf
}

// Zero-width characters and the soft hyphen show up inside words in PDF text
// layers ("Sco\u{AD}pe 1") and would break anchor matching.
fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Decode a body as UTF-8, replacing invalid sequences instead of failing.
pub fn decode_body(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// The longest prefix of `text` holding at most `max_chars` characters.
/// Always cuts on a `char` boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
