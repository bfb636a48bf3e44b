//! Persisted daily balance snapshots.
//!
//! Snapshots are a derived cache over the ledger and the stored statements:
//! always re-derivable, replaced wholesale per date range, and removed
//! entirely on data purge.

use rusqlite::{Connection, Row};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    balance::walker::BalancePoint,
    database_id::{DatabaseId, UserId},
};

/// The currency every balance in this application is denominated in.
const CURRENCY: &str = "EUR";

/// One materialized end-of-day balance.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBalance {
    /// The ID of the snapshot row.
    pub id: DatabaseId,
    /// The ID of the user the balance belongs to.
    pub user_id: UserId,
    /// The day the balance is for.
    pub date: Date,
    /// The balance at the end of that day, in cents.
    pub balance_cents: i64,
    /// The ISO currency code of the balance.
    pub currency: String,
    /// When this snapshot was computed.
    pub computed_at: OffsetDateTime,
}

/// Create the daily balance snapshot table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_balance_daily_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS balance_daily (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                balance_cents INTEGER NOT NULL,
                currency TEXT NOT NULL DEFAULT 'EUR',
                computed_at TEXT NOT NULL,
                UNIQUE(user_id, date),
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// List the snapshots of `user_id` in `[start, end]`, ordered by date.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn list_balance_range(
    user_id: UserId,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<DailyBalance>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, date, balance_cents, currency, computed_at
             FROM balance_daily
             WHERE user_id = :user_id AND date >= :start AND date <= :end
             ORDER BY date ASC",
        )?
        .query_map(
            rusqlite::named_params! {":user_id": user_id, ":start": start, ":end": end},
            map_daily_balance_row,
        )?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Replace the persisted snapshots covering a computed series.
///
/// Deletes every snapshot of `user_id` in `[first point, last point]` and
/// inserts the new points, leaving exactly one row per date in the span.
/// Dates outside the span are untouched. An empty series is a no-op: an
/// import without balance information must not wipe prior history.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn materialize_series(
    user_id: UserId,
    points: &[BalancePoint],
    computed_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Ok(());
    };

    connection.execute(
        "DELETE FROM balance_daily WHERE user_id = ?1 AND date >= ?2 AND date <= ?3",
        (user_id, first.date, last.date),
    )?;

    let mut stmt = connection.prepare(
        "INSERT INTO balance_daily (user_id, date, balance_cents, currency, computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for point in points {
        stmt.execute((user_id, point.date, point.balance_cents, CURRENCY, computed_at))?;
    }

    Ok(())
}

/// Delete every snapshot of `user_id`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn delete_balances_for_user(user_id: UserId, connection: &Connection) -> Result<usize, Error> {
    connection
        .execute("DELETE FROM balance_daily WHERE user_id = ?1", (user_id,))
        .map_err(|error| error.into())
}

fn map_daily_balance_row(row: &Row) -> Result<DailyBalance, rusqlite::Error> {
    Ok(DailyBalance {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        balance_cents: row.get(3)?,
        currency: row.get(4)?,
        computed_at: row.get(5)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
