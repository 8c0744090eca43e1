//! Decoding structured model replies.
//!
//! Models asked for JSON frequently wrap it in a ```` ```json ```` fence even
//! when told not to. One optional leading fence token (with or without a
//! language tag) and one optional trailing fence are stripped before decoding.

use crate::error::TutorError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());

/// Remove one leading and one trailing code fence, then trim.
pub fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let start = RE_LEADING_FENCE.find(s).map(|m| m.end()).unwrap_or(0);
    let s = &s[start..];
    let end = RE_TRAILING_FENCE.find(s).map(|m| m.start()).unwrap_or(s.len());
    s[..end].trim()
}

/// Strip fences and decode the payload as `T`.
///
/// # Errors
/// [`TutorError::MalformedResponse`] when the stripped text is not valid JSON
/// for `T`.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, TutorError> {
    let body = strip_code_fences(raw);
    serde_json::from_str(body).map_err(|e| TutorError::MalformedResponse {
        detail: format!("{e} (payload starts with {:?})", preview(body)),
    })
}

fn preview(s: &str) -> String {
    s.chars().take(40).collect()
}
