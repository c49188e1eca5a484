//! Formatting helpers for the two UUID representations used by the backend.
//!
//! Staff identifiers arrive hyphenated from some endpoints and as bare
//! 32-character strings from others; comparisons go through the canonical
//! (stripped, lowercased) form.

/// Removes all hyphens from a UUID string.
pub fn strip_hyphens(uuid: &str) -> String {
    uuid.replace('-', "")
}

/// Inserts hyphens in the standard 8-4-4-4-12 grouping.
///
/// Returns `None` when the input does not contain exactly 32 characters
/// after stripping any existing hyphens.
pub fn add_hyphens(uuid: &str) -> Option<String> {
    let bare = strip_hyphens(uuid);
    if bare.len() != 32 {
        return None;
    }
    Some(format!(
        "{}-{}-{}-{}-{}",
        &bare[..8],
        &bare[8..12],
        &bare[12..16],
        &bare[16..20],
        &bare[20..]
    ))
}

/// Compares two UUID strings regardless of hyphenation and case.
pub fn uuid_matches(a: &str, b: &str) -> bool {
    strip_hyphens(a).eq_ignore_ascii_case(&strip_hyphens(b))
}
