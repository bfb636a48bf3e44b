//! Merging a freshly parsed statement batch into the existing ledger.

use std::collections::HashSet;

use crate::{
    csv_import::fingerprint::{builder_fingerprint, transaction_fingerprint},
    money::{format_cents, format_date},
    transaction::{Transaction, TransactionBuilder},
    user::Locale,
};

/// The outcome of filtering one parsed batch against the active ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchMerge {
    /// The records that were not seen before, in input order.
    pub accepted: Vec<TransactionBuilder>,
    /// How many incoming records were dropped as duplicates.
    pub duplicate_count: usize,
    /// A human-readable description per dropped record, in input order.
    pub duplicate_samples: Vec<String>,
}

/// Filter `incoming` against the fingerprints of the active ledger.
///
/// A record is a duplicate if its fingerprint matches an active ledger
/// transaction or an earlier record of the same batch (statement exports may
/// repeat rows within one file). Re-running the same batch therefore accepts
/// nothing the second time.
///
/// Fingerprint collisions between genuinely distinct transactions are dropped
/// as duplicates too; that is the accepted trade-off of keying on
/// date/amount/normalized text when no reference exists.
///
/// `describe` renders the sample text for each dropped record; formatting is
/// supplied by the caller so the engine stays independent of user locale
/// lookup. See [sample_description].
pub fn merge_batch(
    existing: &[Transaction],
    incoming: Vec<TransactionBuilder>,
    describe: impl Fn(&TransactionBuilder) -> String,
) -> BatchMerge {
    let existing_keys: HashSet<String> =
        existing.iter().map(transaction_fingerprint).collect();

    let mut accepted = Vec::new();
    let mut duplicate_samples = Vec::new();
    let mut seen_in_batch = HashSet::new();

    for builder in incoming {
        let key = builder_fingerprint(&builder);
        if existing_keys.contains(&key) || !seen_in_batch.insert(key) {
            duplicate_samples.push(describe(&builder));
            continue;
        }
        accepted.push(builder);
    }

    BatchMerge {
        duplicate_count: duplicate_samples.len(),
        accepted,
        duplicate_samples,
    }
}

/// The standard duplicate description: `date - partner - amount`, rendered in
/// the user's locale.
pub fn sample_description(builder: &TransactionBuilder, locale: Locale) -> String {
    format!(
        "{} - {} - {}",
        format_date(builder.booking_datetime.date(), locale),
        builder.partner_name,
        format_cents(builder.amount_cents, locale),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod merge_batch_tests {
    use time::macros::datetime;

    use crate::{
        transaction::{RecordStatus, Transaction, TransactionBuilder},
        user::Locale,
    };

    use super::{merge_batch, sample_description};

    fn builder(amount_cents: i64, reference: &str) -> TransactionBuilder {
        Transaction::build(amount_cents, datetime!(2026-02-02 00:00))
            .partner_name("REWE Markt")
            .purpose_text("Einkauf")
            .reference_text(Some(reference.to_owned()))
    }

    fn ledger_transaction(id: i64, builder: &TransactionBuilder) -> Transaction {
        Transaction {
            id,
            user_id: 1,
            booking_datetime: builder.booking_datetime,
            value_date: builder.value_date,
            transaction_type: builder.transaction_type.clone(),
            partner_name: builder.partner_name.clone(),
            purpose_text: builder.purpose_text.clone(),
            raw_booking_text: builder.raw_booking_text.clone(),
            reference_text: builder.reference_text.clone(),
            category: None,
            amount_cents: builder.amount_cents,
            currency: "EUR".to_owned(),
            status: RecordStatus::Active,
        }
    }

    fn describe(builder: &TransactionBuilder) -> String {
        sample_description(builder, Locale::English)
    }

    #[test]
    fn accepts_unseen_records_in_input_order() {
        let incoming = vec![builder(-100, "A1"), builder(-200, "A2"), builder(-300, "A3")];

        let merge = merge_batch(&[], incoming.clone(), describe);

        assert_eq!(merge.accepted, incoming);
        assert_eq!(merge.duplicate_count, 0);
        assert!(merge.duplicate_samples.is_empty());
    }

    #[test]
    fn drops_records_already_in_the_ledger() {
        let known = builder(-100, "A1");
        let ledger = vec![ledger_transaction(1, &known)];
        let incoming = vec![known.clone(), builder(-200, "A2")];

        let merge = merge_batch(&ledger, incoming, describe);

        assert_eq!(merge.accepted.len(), 1);
        assert_eq!(merge.accepted[0].reference_text.as_deref(), Some("A2"));
        assert_eq!(merge.duplicate_count, 1);
        assert_eq!(merge.duplicate_samples.len(), 1);
    }

    #[test]
    fn drops_repeats_within_the_same_batch() {
        let incoming = vec![builder(-100, "A1"), builder(-100, "A1")];

        let merge = merge_batch(&[], incoming, describe);

        assert_eq!(merge.accepted.len(), 1);
        assert_eq!(merge.duplicate_count, 1);
    }

    #[test]
    fn reimporting_the_identical_batch_accepts_nothing() {
        let incoming = vec![builder(-100, "A1"), builder(-200, "A2")];

        let first = merge_batch(&[], incoming.clone(), describe);
        assert_eq!(first.accepted.len(), 2);

        let ledger: Vec<_> = first
            .accepted
            .iter()
            .enumerate()
            .map(|(index, accepted)| ledger_transaction(index as i64 + 1, accepted))
            .collect();

        let second = merge_batch(&ledger, incoming, describe);

        assert_eq!(second.accepted.len(), 0);
        assert_eq!(second.duplicate_count, 2);
    }

    #[test]
    fn collisions_without_references_are_treated_as_duplicates() {
        // Same date, amount and texts but genuinely different purchases:
        // dropped by design.
        let first = Transaction::build(-4_500, datetime!(2026-02-02 00:00))
            .partner_name("REWE Markt")
            .purpose_text("Einkauf");
        let second = first.clone();

        let merge = merge_batch(&[], vec![first, second], describe);

        assert_eq!(merge.accepted.len(), 1);
        assert_eq!(merge.duplicate_count, 1);
    }

    #[test]
    fn sample_uses_locale_formatting() {
        let builder = builder(-123_456, "A1");

        assert_eq!(
            sample_description(&builder, Locale::English),
            "2026-02-02 - REWE Markt - -1,234.56 EUR"
        );
        assert_eq!(
            sample_description(&builder, Locale::German),
            "02.02.2026 - REWE Markt - -1.234,56 EUR"
        );
    }
}
