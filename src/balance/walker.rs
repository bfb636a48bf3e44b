//! Walking the balance series forwards and backwards from an anchor.

use std::collections::HashMap;

use time::{Date, Duration};

use crate::{balance::anchor::BalanceAnchor, transaction::Transaction};

/// One point of a daily balance series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalancePoint {
    /// The calendar day the balance is for.
    pub date: Date,
    /// The balance at the end of that day, in cents.
    pub balance_cents: i64,
}

/// Partition transactions by local booking date and sum the amounts per day.
///
/// Days without transactions are simply absent; readers treat them as zero.
pub fn sum_by_date(transactions: &[Transaction]) -> HashMap<Date, i64> {
    let mut sums: HashMap<Date, i64> = HashMap::new();
    for transaction in transactions {
        *sums
            .entry(transaction.booking_datetime.date())
            .or_default() += transaction.amount_cents;
    }
    sums
}

/// Compute the balance at the end of `target_date`.
///
/// Walking forward adds each day's net sum; walking backward from the anchor
/// subtracts them, which answers "what was the balance before this anchor"
/// without needing a second anchor.
pub fn balance_at(target_date: Date, anchor: &BalanceAnchor, sums: &HashMap<Date, i64>) -> i64 {
    if target_date == anchor.date {
        return anchor.balance_cents;
    }

    let mut balance = anchor.balance_cents;

    if target_date > anchor.date {
        let mut cursor = anchor.date;
        while let Some(next) = cursor.next_day() {
            if next > target_date {
                break;
            }
            balance += sums.get(&next).copied().unwrap_or(0);
            cursor = next;
        }
        return balance;
    }

    let mut cursor = target_date;
    while let Some(next) = cursor.next_day() {
        if next > anchor.date {
            break;
        }
        balance -= sums.get(&next).copied().unwrap_or(0);
        cursor = next;
    }
    balance
}

/// Compute one balance point per calendar day over `[start, end]`, inclusive.
///
/// An inverted range (`end` before `start`) yields an empty series.
pub fn walk_range(
    start: Date,
    end: Date,
    anchor: &BalanceAnchor,
    sums: &HashMap<Date, i64>,
) -> Vec<BalancePoint> {
    if end < start {
        return Vec::new();
    }

    let mut points = Vec::new();
    let mut running = balance_at(start, anchor, sums);
    let mut cursor = start;

    loop {
        if cursor != start {
            running += sums.get(&cursor).copied().unwrap_or(0);
        }
        points.push(BalancePoint {
            date: cursor,
            balance_cents: running,
        });

        if cursor == end {
            break;
        }
        match cursor.next_day() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    points
}

/// Accumulate a daily series over `[end_date - 29, end_date]`, seeded with
/// `start_balance_cents`.
///
/// Used after an import that carried a start balance to rematerialize the
/// trailing 30 days.
pub fn last_30_days(
    start_balance_cents: i64,
    transactions: &[Transaction],
    end_date: Date,
) -> Vec<BalancePoint> {
    let start_date = end_date - Duration::days(29);
    let sums = sum_by_date(transactions);

    let mut points = Vec::with_capacity(30);
    let mut cumulative = start_balance_cents;
    let mut cursor = start_date;

    while cursor <= end_date {
        cumulative += sums.get(&cursor).copied().unwrap_or(0);
        points.push(BalancePoint {
            date: cursor,
            balance_cents: cumulative,
        });
        match cursor.next_day() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    points
}

// ============================================================================
// TESTS
// ============================================================================
