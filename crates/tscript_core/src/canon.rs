//! Canonicalizer (C1): normalize text to a stable byte form for hashing and diffing.

use unicode_normalization::UnicodeNormalization;

/// Bidi / invisible format characters stripped during canonicalization.
fn is_stripped_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

/// Trim trailing spaces and tabs from a single line (no newline in `line`).
fn trim_trailing_ws(line: &str) -> &str {
    line.trim_end_matches([' ', '\t'])
}

/// Normalize `s` to the canonical byte form used for hashing, diffing, and
/// hash-chain verification.
///
/// Steps, in order: strip carriage returns; map NBSP to ASCII space; strip
/// bidi/invisible format characters; trim trailing spaces/tabs on every
/// line; apply Unicode NFC. The result is idempotent:
/// `canonicalize(canonicalize(s)) == canonicalize(s)`.
pub fn canonicalize(s: &str) -> String {
    // Strip CR, map NBSP, strip bidi/format chars in a single pass.
    let mut stage1 = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\r' {
            continue;
        }
        if is_stripped_format_char(c) {
            continue;
        }
        if c == '\u{00A0}' {
            stage1.push(' ');
        } else {
            stage1.push(c);
        }
    }

    // Trim trailing spaces/tabs on every line.
    let mut stage2 = String::with_capacity(stage1.len());
    let mut lines = stage1.split('\n').peekable();
    while let Some(line) = lines.next() {
        stage2.push_str(trim_trailing_ws(line));
        if lines.peek().is_some() {
            stage2.push('\n');
        }
    }

    // Unicode NFC.
    stage2.nfc().collect()
}
