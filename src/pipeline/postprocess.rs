//! Post-processing: deterministic cleanup of OCR engine text.
//!
//! Tesseract's plain-text output carries a few artefacts that are noise in a
//! transcript: a trailing form feed marking the page break, runs of empty
//! lines where it found whitespace regions, trailing spaces, and the odd
//! zero-width character copied from the recognised glyph stream.
//!
//! The rules here never touch recognised words: only whitespace, line
//! breaks and zero-width characters change. Each rule is a pure
//! `&str → String` pass and is tested on its own.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule only has to
//! reason about `\n`. Invisible characters go before whitespace trimming so
//! a line holding only a zero-width space becomes blank and collapses.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to raw engine text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Replace form feeds with line breaks
/// 3. Strip zero-width Unicode (zero-width spaces, joiners, BOM)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive newlines down to one blank line
/// 6. Trim leading and trailing blank lines
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = replace_form_feeds(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    trim_blank_edges(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Form feeds ───────────────────────────────────────────────────────

fn replace_form_feeds(input: &str) -> String {
    input.replace('\u{000C}', "\n")
}

// ── Rule 3: Invisible characters ─────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' // zero-width space
                | '\u{200C}' // zero-width non-joiner
                | '\u{200D}' // zero-width joiner
                | '\u{2060}' // word joiner
                | '\u{FEFF}' // BOM
            )
        })
        .collect()
}

// ── Rule 4: Trailing whitespace ──────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Blank line runs ──────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 6: Edges ────────────────────────────────────────────────────────────

fn trim_blank_edges(input: &str) -> String {
    input.trim_matches('\n').to_string()
}
