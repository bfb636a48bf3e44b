//! ASCII case-insensitive text scanning shared by the statement parser and
//! the fingerprinting code.
//!
//! All markers searched for ("Buchungstext:", "Ref." and friends) are pure
//! ASCII, so matching can work byte-wise on the original string without
//! allocating a lowercased copy. A match always starts at an ASCII byte,
//! which keeps the returned indices valid char boundaries even when the
//! haystack contains umlauts.

/// Find the first occurrence of the ASCII `marker` in `text`, ignoring ASCII
/// case. Returns the byte index of the match.
pub fn find_ignore_ascii_case(text: &str, marker: &str) -> Option<usize> {
    let haystack = text.as_bytes();
    let needle = marker.as_bytes();

    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }

    (0..=haystack.len() - needle.len())
        .find(|&start| haystack[start..start + needle.len()].eq_ignore_ascii_case(needle))
}

/// The trimmed text after the first occurrence of `marker`, or `None` if the
/// marker does not occur.
pub fn extract_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    find_ignore_ascii_case(text, marker).map(|index| text[index + marker.len()..].trim())
}

/// The trimmed text before the first occurrence of `marker`, or the whole
/// trimmed text if the marker does not occur.
pub fn trim_at_marker<'a>(text: &'a str, marker: &str) -> &'a str {
    match find_ignore_ascii_case(text, marker) {
        Some(index) => text[..index].trim(),
        None => text.trim(),
    }
}
