use std::sync::LazyLock;

use regex::Regex;

use crate::hash::hash_bytes;

pub const DEFAULT_MAX_LEN: usize = 100;

static INVALID_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("valid slug pattern"));
static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid dash pattern"));

/// Converts a display name into a catalog-safe identifier.
///
/// Slugs longer than `max_len` are truncated and suffixed with six hex chars
/// of the untruncated slug's digest, so names that share a long prefix stay
/// distinct.
pub fn slugify_with_max(text: &str, max_len: usize) -> String {
    let lowered = text.trim().to_lowercase();
    let replaced = INVALID_RUN.replace_all(&lowered, "-");
    let collapsed = DASH_RUN.replace_all(&replaced, "-");
    let slug = collapsed.trim_matches('-');

    if slug.is_empty() {
        return "unnamed".to_string();
    }

    if slug.len() <= max_len {
        return slug.to_string();
    }

    let suffix = &hash_bytes(slug.as_bytes())[..6];
    // The slug is pure ASCII at this point, so byte slicing is safe
    let keep = max_len.saturating_sub(7);
    let head = slug[..keep].trim_end_matches('-');
    format!("{}-{}", head, suffix)
}

pub fn slugify(text: &str) -> String {
    slugify_with_max(text, DEFAULT_MAX_LEN)
}
