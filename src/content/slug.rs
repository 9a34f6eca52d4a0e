use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ContentError, Result};

/// URL slug for a title: lowercased, whitespace runs become `-`, anything
/// outside `[a-z0-9-]` is dropped. Non ASCII letters are dropped too.
pub fn derive_slug(title: &str) -> String {
    lazy_static! {
        static ref SPACES_REGEX: Regex = Regex::new(r"\s+").unwrap();
        static ref INVALID_REGEX: Regex = Regex::new(r"[^a-z0-9-]").unwrap();
    }

    let lower = title.to_lowercase();
    let dashed = SPACES_REGEX.replace_all(&lower, "-");
    INVALID_REGEX.replace_all(&dashed, "").into_owned()
}

/// Like `derive_slug`, falling back when nothing usable is left.
pub fn derive_slug_or(title: Option<&str>, fallback: &str) -> String {
    title
        .map(derive_slug)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Keeps only the last path component of a caller supplied file name.
pub fn sanitize_basename(name: &str) -> Result<String> {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();

    match base {
        "" | "." | ".." => Err(ContentError::InvalidSlug(name.to_string())),
        _ => Ok(base.to_string()),
    }
}
