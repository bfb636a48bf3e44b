//! Deduplication fingerprints for imported transactions.
//!
//! Statement exports carry no stable transaction identifier, so duplicates
//! across overlapping exports are detected heuristically: by an extracted
//! reference identifier when one exists, otherwise by a composite of the
//! booking date, amount and normalized texts.

use time::Date;

use crate::{
    csv_import::text::find_ignore_ascii_case,
    transaction::{Transaction, TransactionBuilder},
};

/// Compute the deduplication fingerprint of a stored ledger transaction.
pub fn transaction_fingerprint(transaction: &Transaction) -> String {
    fingerprint(
        transaction.booking_datetime.date(),
        transaction.amount_cents,
        &transaction.partner_name,
        &transaction.purpose_text,
        transaction.raw_booking_text.as_deref(),
        transaction.reference_text.as_deref(),
        transaction.transaction_type.as_deref(),
    )
}

/// Compute the deduplication fingerprint of a freshly parsed transaction.
pub fn builder_fingerprint(builder: &TransactionBuilder) -> String {
    fingerprint(
        builder.booking_datetime.date(),
        builder.amount_cents,
        &builder.partner_name,
        &builder.purpose_text,
        builder.raw_booking_text.as_deref(),
        builder.reference_text.as_deref(),
        builder.transaction_type.as_deref(),
    )
}

fn fingerprint(
    booking_date: Date,
    amount_cents: i64,
    partner_name: &str,
    purpose_text: &str,
    raw_booking_text: Option<&str>,
    reference_text: Option<&str>,
    transaction_type: Option<&str>,
) -> String {
    let reference = resolve_reference(reference_text, raw_booking_text, purpose_text);
    if !reference.is_empty() {
        return format!("ref|{reference}");
    }

    [
        booking_date.to_string(),
        amount_cents.to_string(),
        normalize(partner_name),
        normalize_purpose(purpose_text),
        normalize(transaction_type.unwrap_or_default()),
    ]
    .join("|")
}

/// Find a reference identifier, in priority order: the explicit reference
/// field, a `ref`-marked token in the raw booking text, then the same in the
/// purpose text.
fn resolve_reference(
    reference_text: Option<&str>,
    raw_booking_text: Option<&str>,
    purpose_text: &str,
) -> String {
    let reference = normalize_reference(reference_text.unwrap_or_default());
    if !reference.is_empty() {
        return reference;
    }

    let reference = extract_reference_token(raw_booking_text.unwrap_or_default());
    if !reference.is_empty() {
        return reference;
    }

    extract_reference_token(purpose_text)
}

/// Lowercase and strip surrounding whitespace and punctuation, so `Ref:
/// 7788990/55,` and `7788990/55` agree.
fn normalize_reference(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .to_owned()
}

/// Scan `source` for a `ref[.:#-]?<token>` marker and return the first
/// non-blank normalized token.
fn extract_reference_token(source: &str) -> String {
    if source.trim().is_empty() {
        return String::new();
    }

    let chars: Vec<char> = source.chars().collect();
    let mut from = 0;

    while let Some(marker_start) = find_ref_marker(&chars, from) {
        from = marker_start + 3;

        if !is_standalone_ref_marker(&chars, marker_start) {
            continue;
        }

        let token_start = skip_reference_prefix_separators(&chars, marker_start + 3);
        let token_end = chars[token_start..]
            .iter()
            .position(|&c| is_reference_token_terminator(c))
            .map_or(chars.len(), |offset| token_start + offset);

        let token: String = chars[token_start..token_end].iter().collect();
        let token = normalize_reference(&token);
        if !token.is_empty() {
            return token;
        }
    }

    String::new()
}

fn find_ref_marker(chars: &[char], from: usize) -> Option<usize> {
    if chars.len() < 3 {
        return None;
    }
    (from..=chars.len() - 3).find(|&index| {
        chars[index].eq_ignore_ascii_case(&'r')
            && chars[index + 1].eq_ignore_ascii_case(&'e')
            && chars[index + 2].eq_ignore_ascii_case(&'f')
    })
}

/// `ref` inside a longer word, e.g. "transfer" read backwards or "preference",
/// is not a marker.
fn is_standalone_ref_marker(chars: &[char], marker_start: usize) -> bool {
    if marker_start > 0 && is_word_character(chars[marker_start - 1]) {
        return false;
    }

    let after = marker_start + 3;
    after >= chars.len() || !is_word_character(chars[after])
}

fn is_word_character(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Step over the `[.:#-]` and whitespace between the `ref` marker and its
/// token, e.g. `Ref. : 7788990`.
fn skip_reference_prefix_separators(chars: &[char], index: usize) -> usize {
    let mut current = index;

    if current < chars.len() && chars[current] == '.' {
        current += 1;
    }
    while current < chars.len() && chars[current].is_whitespace() {
        current += 1;
    }
    if current < chars.len() && matches!(chars[current], ':' | '#' | '-') {
        current += 1;
    }
    while current < chars.len() && chars[current].is_whitespace() {
        current += 1;
    }

    current
}

fn is_reference_token_terminator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ';' | ',' | ')')
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalize a purpose text for the composite key: strip the leading
/// `Buchungstext:` label some formats inject and the trailing `Karte Nr.` /
/// `Ref.` annotations, then lowercase.
fn normalize_purpose(value: &str) -> String {
    let mut normalized = value.trim();

    if let Some(index) = find_ignore_ascii_case(normalized, "Buchungstext:") {
        normalized = normalized[index + "Buchungstext:".len()..].trim();
    }
    if let Some(index) = find_ignore_ascii_case(normalized, "Karte Nr.") {
        normalized = normalized[..index].trim();
    }
    if let Some(index) = find_ignore_ascii_case(normalized, "Ref.") {
        normalized = normalized[..index].trim();
    }

    normalized.to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================
