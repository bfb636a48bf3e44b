//! Balance queries answered on demand from the ledger and stored statements.

use rusqlite::Connection;
use time::{Date, UtcOffset};

use crate::{
    Error,
    artifact::list_active_artifacts,
    balance::{
        anchor::resolve_anchor,
        snapshot::{DailyBalance, list_balance_range},
        walker::{BalancePoint, balance_at, sum_by_date, walk_range},
    },
    database_id::UserId,
    transaction::list_active_transactions,
};

/// Compute the user's balance as of `today`.
///
/// Returns `Ok(None)` when no stored statement ever carried balance
/// information; a missing balance is an explicit unknown, never a fabricated
/// zero.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn current_balance(
    user_id: UserId,
    today: Date,
    local_offset: UtcOffset,
    connection: &Connection,
) -> Result<Option<i64>, Error> {
    let artifacts = list_active_artifacts(user_id, connection)?;
    let Some(anchor) = resolve_anchor(&artifacts, local_offset) else {
        return Ok(None);
    };

    let transactions = list_active_transactions(user_id, connection)?;
    let sums = sum_by_date(&transactions);

    Ok(Some(balance_at(today, &anchor, &sums)))
}

/// Compute one balance point per calendar day over `[start, end]`.
///
/// Returns an empty series when the range is inverted or no anchor exists.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn balance_range(
    user_id: UserId,
    start: Date,
    end: Date,
    local_offset: UtcOffset,
    connection: &Connection,
) -> Result<Vec<BalancePoint>, Error> {
    if end < start {
        return Ok(Vec::new());
    }

    let artifacts = list_active_artifacts(user_id, connection)?;
    let Some(anchor) = resolve_anchor(&artifacts, local_offset) else {
        return Ok(Vec::new());
    };

    let transactions = list_active_transactions(user_id, connection)?;
    let sums = sum_by_date(&transactions);

    Ok(walk_range(start, end, &anchor, &sums))
}

/// Read the previously materialized snapshots in `[start, end]`.
///
/// Unlike [balance_range] this does not re-walk anything; it only serves what
/// the materializer persisted.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn materialized_range(
    user_id: UserId,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<DailyBalance>, Error> {
    list_balance_range(user_id, start, end, connection)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod balance_service_tests {
    use rusqlite::Connection;
    use time::{UtcOffset, macros::date, macros::datetime};

    use crate::{
        artifact::insert_artifact,
        db::initialize,
        transaction::{Transaction, insert_transactions},
        user::{Locale, create_user},
    };

    use super::{balance_range, current_balance};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn test_user_id(conn: &Connection) -> i64 {
        create_user("test@example.com", Locale::English, conn)
            .expect("Could not create user")
            .id
    }

    const ANCHORED_STATEMENT: &str = "\
        \"Neuer Kontostand\";\"1.048,44 EUR\"\n\
        Buchungstag;Wertstellung (Valuta);Vorgang;Buchungstext;Umsatz in EUR\n\
        03.02.2026;;Gutschrift;Gehalt;993,44\n\
        02.02.2026;;Lastschrift;Miete;-45,00\n";

    fn seed_statement(user_id: i64, conn: &Connection) {
        insert_artifact(
            user_id,
            "umsaetze.csv",
            Some("text/csv"),
            ANCHORED_STATEMENT.as_bytes(),
            datetime!(2026-02-04 12:00 UTC),
            conn,
        )
        .unwrap();
        insert_transactions(
            user_id,
            &[
                Transaction::build(99_344, datetime!(2026-02-03 00:00)),
                Transaction::build(-4_500, datetime!(2026-02-02 00:00)),
            ],
            conn,
        )
        .unwrap();
    }

    #[test]
    fn current_balance_walks_from_the_anchor_to_today() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);
        seed_statement(user_id, &conn);

        let got = current_balance(user_id, date!(2026 - 02 - 04), UtcOffset::UTC, &conn).unwrap();

        // Anchor: 2026-02-01 at 10.000 cents, then -45,00 and +993,44.
        assert_eq!(got, Some(108_894));
    }

    #[test]
    fn current_balance_is_none_without_balance_bearing_statements() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);

        let got = current_balance(user_id, date!(2026 - 02 - 04), UtcOffset::UTC, &conn).unwrap();

        assert_eq!(got, None);
    }

    #[test]
    fn range_returns_one_point_per_day() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);
        seed_statement(user_id, &conn);

        let points = balance_range(
            user_id,
            date!(2026 - 02 - 01),
            date!(2026 - 02 - 03),
            UtcOffset::UTC,
            &conn,
        )
        .unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].balance_cents, 10_000);
        assert_eq!(points[1].balance_cents, 9_550);
        assert_eq!(points[2].balance_cents, 108_894);
    }

    #[test]
    fn range_without_anchor_is_empty() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);

        let points = balance_range(
            user_id,
            date!(2026 - 02 - 01),
            date!(2026 - 02 - 03),
            UtcOffset::UTC,
            &conn,
        )
        .unwrap();

        assert!(points.is_empty());
    }

    #[test]
    fn inverted_range_is_empty() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);
        seed_statement(user_id, &conn);

        let points = balance_range(
            user_id,
            date!(2026 - 02 - 03),
            date!(2026 - 02 - 01),
            UtcOffset::UTC,
            &conn,
        )
        .unwrap();

        assert!(points.is_empty());
    }
}
