use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Longest text written to a single spreadsheet cell.
pub const MAX_CELL_CHARS: usize = 32_700;

/// Prefix that keeps spreadsheet software from evaluating a value as a formula.
pub const FORMULA_GUARD: char = '\'';

/// Trims leading/trailing whitespace while borrowing the original when unchanged.
pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Removes control characters below the printable ASCII range.
pub fn strip_control(input: &str) -> Cow<'_, str> {
    if input.chars().any(is_low_control) {
        Cow::Owned(input.chars().filter(|c| !is_low_control(*c)).collect())
    } else {
        Cow::Borrowed(input)
    }
}

fn is_low_control(c: char) -> bool {
    (c as u32) < 0x20
}

/// Prefixes values that start with `=` so they export as text.
pub fn neutralize_formula(input: &str) -> Cow<'_, str> {
    if input.starts_with('=') {
        let mut guarded = String::with_capacity(input.len() + 1);
        guarded.push(FORMULA_GUARD);
        guarded.push_str(input);
        Cow::Owned(guarded)
    } else {
        Cow::Borrowed(input)
    }
}

/// Truncates to at most `limit` characters, staying on a char boundary.
pub fn truncate_chars(input: &str, limit: usize) -> Cow<'_, str> {
    match input.char_indices().nth(limit) {
        Some((byte_idx, _)) => Cow::Borrowed(&input[..byte_idx]),
        None => Cow::Borrowed(input),
    }
}

fn code_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:\d+-?\s+)+").expect("code prefix pattern is valid"))
}

/// Drops an internal numeric code in front of a person's name (`"1024- Ana"` → `"Ana"`).
pub fn strip_code_prefix(input: &str) -> Cow<'_, str> {
    match code_prefix().find(input) {
        Some(found) => Cow::Borrowed(&input[found.end()..]),
        None => Cow::Borrowed(input),
    }
}

/// Full text sanitation for exported cells.
pub fn sanitize_text(input: &str, limit: usize) -> String {
    let stripped = strip_control(input);
    let trimmed = trim(stripped.as_ref());
    let guarded = neutralize_formula(trimmed.as_ref());
    truncate_chars(guarded.as_ref(), limit)
        .trim_end()
        .to_string()
}
