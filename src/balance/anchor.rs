//! Choosing the most trustworthy balance anchor from the stored statements.
//!
//! Every active statement artifact is re-parsed from its verbatim bytes, so
//! the anchor never depends on what an earlier version of the import code
//! extracted.

use time::{Date, Duration, UtcOffset};

use crate::{
    artifact::CsvArtifact,
    csv_import::{ParsedStatement, parse_statement},
};

/// A trusted (date, balance) pair to seed the balance walker with.
///
/// Lower priority numbers are more trustworthy: 0 for a start balance derived
/// from a statement's ending balance minus its transactions, 1 for an
/// explicit start balance, 2 for a balance-only snapshot upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceAnchor {
    /// The day the balance was known.
    pub date: Date,
    /// The balance at the end of that day, in cents.
    pub balance_cents: i64,
    /// The trust rank of this anchor; smaller is better.
    pub priority: u8,
}

/// Select the single best anchor across all of a user's stored statements.
///
/// Transaction-bearing statements anchor on the day before their earliest
/// booking date, so the anchor is the balance before any of the statement's
/// own transactions applied. Statements that parse to zero transactions but
/// carry a balance are snapshot anchors dated at their upload day; only the
/// most recently uploaded one stays a candidate.
///
/// Among transaction-bearing anchors the latest anchor date wins, ties broken
/// by lower priority. Snapshot anchors are only used when no
/// transaction-bearing anchor exists. Returns `None` when no statement ever
/// carried balance information.
pub fn resolve_anchor(artifacts: &[CsvArtifact], local_offset: UtcOffset) -> Option<BalanceAnchor> {
    let mut transaction_anchors: Vec<BalanceAnchor> = Vec::new();
    let mut latest_snapshot_anchor: Option<BalanceAnchor> = None;

    for artifact in artifacts {
        let Some(parsed) = parse_safely(&artifact.bytes) else {
            continue;
        };

        if !parsed.transactions.is_empty() {
            let Some(oldest_date) = parsed
                .transactions
                .iter()
                .map(|tx| tx.booking_datetime.date())
                .min()
            else {
                continue;
            };
            let anchor_date = oldest_date - Duration::days(1);
            let transaction_sum: i64 = parsed.transactions.iter().map(|tx| tx.amount_cents).sum();

            if let Some(current) = parsed.current_balance_cents {
                transaction_anchors.push(BalanceAnchor {
                    date: anchor_date,
                    balance_cents: current - transaction_sum,
                    priority: 0,
                });
            }
            if let Some(start) = parsed.start_balance_cents {
                transaction_anchors.push(BalanceAnchor {
                    date: anchor_date,
                    balance_cents: start,
                    priority: 1,
                });
            }
        } else if let Some(snapshot) = parsed
            .current_balance_cents
            .or(parsed.start_balance_cents)
        {
            let candidate = BalanceAnchor {
                date: artifact.uploaded_at.to_offset(local_offset).date(),
                balance_cents: snapshot,
                priority: 2,
            };
            let is_newer = latest_snapshot_anchor
                .is_none_or(|retained| candidate.date > retained.date);
            if is_newer {
                latest_snapshot_anchor = Some(candidate);
            }
        }
    }

    if !transaction_anchors.is_empty() {
        transaction_anchors.sort_by(|left, right| {
            right
                .date
                .cmp(&left.date)
                .then(left.priority.cmp(&right.priority))
        });
        return transaction_anchors.into_iter().next();
    }

    latest_snapshot_anchor
}

/// Parse stored statement bytes, treating failures as "contributes nothing":
/// one unparsable historical upload must not abort resolution for the rest.
fn parse_safely(bytes: &[u8]) -> Option<ParsedStatement> {
    match parse_statement(bytes) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            tracing::debug!("Skipping unparsable statement artifact: {error}");
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
