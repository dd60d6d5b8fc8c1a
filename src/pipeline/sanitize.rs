//! Sanitising: deterministic cleanup of a raw model reply before parsing.
//!
//! Even a model told to "output only JSON" sometimes:
//!
//! - wraps the reply in ` ```json ... ``` ` fences
//! - prefixes it with a sentence ("Here is the extracted structure:")
//! - emits a byte-order mark or zero-width characters
//!
//! These rules fix the envelope without touching the payload. Whether the
//! payload is valid is decided afterwards by [`crate::schema::parse_extraction`].
//!
//! ## Rule Order
//!
//! Invisible characters go first so fence detection sees clean input; the
//! object-span cut runs last because fences may contain surrounding prose.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all sanitising rules to the raw model output.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (BOM, zero-width spaces)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip outer code fences (```json / ```)
/// 4. Cut to the outermost `{ … }` span
pub fn clean_response(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = strip_code_fences(&s);
    extract_object_span(&s)
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip outer code fences ──────────────────────────────────────────

/// Greedy body: the match runs to the last fence, so fences quoted inside
/// JSON strings stay in the payload.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\n(.*)\n?```").unwrap());

fn strip_code_fences(input: &str) -> String {
    // A bare object has no envelope to strip.
    if input.trim_start().starts_with('{') {
        return input.to_string();
    }
    if let Some(caps) = RE_OUTER_FENCES.captures(input) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 4: Cut to the outermost object ──────────────────────────────────────

/// Keep the text between the first `{` and the last `}`.
///
/// Input without an object is returned trimmed, so the parser reports a
/// meaningful error instead of parsing an empty string.
fn extract_object_span(input: &str) -> String {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => input[start..=end].to_string(),
        _ => input.trim().to_string(),
    }
}
