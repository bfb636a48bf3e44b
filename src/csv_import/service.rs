//! The import flow: store the upload, parse it, merge it into the ledger and
//! refresh the materialized balance history.

use rusqlite::Connection;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    artifact::insert_artifact,
    balance::{last_30_days, materialize_series},
    category::AssignCategories,
    csv_import::{
        dedup::{merge_batch, sample_description},
        parse_statement,
    },
    transaction::{insert_transactions, list_active_transactions},
    user::User,
};

/// The largest statement upload the import accepts.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// What one statement import did.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    /// How many parsed transactions were new and persisted.
    pub accepted_count: usize,
    /// How many parsed transactions were dropped as duplicates.
    pub duplicate_count: usize,
    /// A human-readable description per dropped transaction.
    pub duplicate_samples: Vec<String>,
}

/// Import one uploaded statement file for `user`.
///
/// Everything — the stored artifact, the accepted transactions and the
/// refreshed balance snapshots — is written in a single database transaction,
/// so a failing step leaves no partial state behind. In particular, a
/// statement that fails to parse does not keep its artifact.
///
/// The trailing 30-day balance series (ending at `today`, the deployment's
/// local date) is rematerialized only when the statement carried a start
/// balance; imports without balance information leave the existing snapshots
/// alone.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyUpload] if `bytes` is empty,
/// - [Error::UploadTooLarge] if `bytes` exceeds [MAX_UPLOAD_BYTES],
/// - [Error::InvalidCsv] if the statement cannot be parsed,
/// - or [Error::SqlError] if there is an unexpected SQL error.
pub fn import_statement(
    user: &User,
    original_file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
    uploaded_at: OffsetDateTime,
    today: Date,
    assigner: &dyn AssignCategories,
    connection: &Connection,
) -> Result<ImportOutcome, Error> {
    if bytes.is_empty() {
        return Err(Error::EmptyUpload);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(Error::UploadTooLarge(bytes.len()));
    }

    // Dropping the transaction without committing rolls everything back.
    let tx = connection.unchecked_transaction()?;

    insert_artifact(
        user.id,
        original_file_name.unwrap_or("import.csv"),
        content_type,
        bytes,
        uploaded_at,
        &tx,
    )?;

    let parsed = parse_statement(bytes)?;
    let start_balance_cents = parsed.start_balance_cents;

    let existing = list_active_transactions(user.id, &tx)?;
    let locale = user.locale;
    let merge = merge_batch(&existing, parsed.transactions, |builder| {
        sample_description(builder, locale)
    });

    let mut accepted = merge.accepted;
    if !accepted.is_empty() {
        assigner.assign_for_import(user.id, &mut accepted)?;
        insert_transactions(user.id, &accepted, &tx)?;
    }

    if let Some(start_balance_cents) = start_balance_cents {
        let all_active = list_active_transactions(user.id, &tx)?;
        let points = last_30_days(start_balance_cents, &all_active, today);
        materialize_series(user.id, &points, uploaded_at, &tx)?;
    }

    tx.commit()?;

    tracing::info!(
        "Imported statement for user {}: {} accepted, {} duplicates",
        user.id,
        accepted.len(),
        merge.duplicate_count
    );

    Ok(ImportOutcome {
        accepted_count: accepted.len(),
        duplicate_count: merge.duplicate_count,
        duplicate_samples: merge.duplicate_samples,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod import_statement_tests {
    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        Error,
        balance::list_balance_range,
        category::{AssignCategories, NoCategoryAssigner},
        db::initialize,
        transaction::{TransactionBuilder, count_active_transactions, list_active_transactions},
        user::{Locale, User, create_user},
    };

    use super::{MAX_UPLOAD_BYTES, import_statement};

    const STATEMENT_CSV: &str = "\
        \"Neuer Kontostand\";\"1.048,44 EUR\"\n\
        Buchungstag;Wertstellung (Valuta);Vorgang;Buchungstext;Umsatz in EUR\n\
        03.02.2026;;Gutschrift;Auftraggeber: ACME GmbH Buchungstext: Gehalt Ref. GEHALT0226;993,44\n\
        02.02.2026;;Lastschrift;Auftraggeber: REWE Buchungstext: Einkauf Ref. 7788990/5566;-45,00\n";

    const STATEMENT_WITHOUT_BALANCE_CSV: &str = "\
        Buchungstag;Wertstellung (Valuta);Vorgang;Buchungstext;Umsatz in EUR\n\
        05.02.2026;;Lastschrift;Auftraggeber: Baeckerei Buchungstext: Broetchen Ref. B-1;-3,50\n";

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn test_user(conn: &Connection) -> User {
        create_user("test@example.com", Locale::German, conn).expect("Could not create user")
    }

    fn import(user: &User, bytes: &[u8], conn: &Connection) -> Result<super::ImportOutcome, Error> {
        import_statement(
            user,
            Some("umsaetze.csv"),
            Some("text/csv"),
            bytes,
            datetime!(2026-02-04 12:00 UTC),
            date!(2026 - 02 - 04),
            &NoCategoryAssigner,
            conn,
        )
    }

    #[test]
    fn first_import_accepts_every_row() {
        let conn = get_test_connection();
        let user = test_user(&conn);

        let outcome = import(&user, STATEMENT_CSV.as_bytes(), &conn).expect("import failed");

        assert_eq!(outcome.accepted_count, 2);
        assert_eq!(outcome.duplicate_count, 0);
        assert_eq!(count_active_transactions(user.id, &conn).unwrap(), 2);

        let artifact_count: u32 = conn
            .query_row("SELECT COUNT(id) FROM csv_artifact", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artifact_count, 1);
    }

    #[test]
    fn reimporting_the_same_file_accepts_nothing() {
        let conn = get_test_connection();
        let user = test_user(&conn);
        import(&user, STATEMENT_CSV.as_bytes(), &conn).unwrap();

        let second = import(&user, STATEMENT_CSV.as_bytes(), &conn).expect("import failed");

        assert_eq!(second.accepted_count, 0);
        assert_eq!(second.duplicate_count, 2);
        assert_eq!(second.duplicate_samples.len(), 2);
        assert_eq!(count_active_transactions(user.id, &conn).unwrap(), 2);

        // The artifact is still retained; it may carry a better anchor.
        let artifact_count: u32 = conn
            .query_row("SELECT COUNT(id) FROM csv_artifact", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artifact_count, 2);
    }

    #[test]
    fn duplicate_samples_use_the_user_locale() {
        let conn = get_test_connection();
        let user = test_user(&conn);
        import(&user, STATEMENT_CSV.as_bytes(), &conn).unwrap();

        let second = import(&user, STATEMENT_CSV.as_bytes(), &conn).unwrap();

        assert_eq!(
            second.duplicate_samples[0],
            "03.02.2026 - ACME GmbH - 993,44 EUR"
        );
    }

    #[test]
    fn empty_upload_is_rejected_without_side_effects() {
        let conn = get_test_connection();
        let user = test_user(&conn);

        let result = import(&user, b"", &conn);

        assert_eq!(result, Err(Error::EmptyUpload));
        let artifact_count: u32 = conn
            .query_row("SELECT COUNT(id) FROM csv_artifact", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artifact_count, 0);
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let conn = get_test_connection();
        let user = test_user(&conn);
        let bytes = vec![b'a'; MAX_UPLOAD_BYTES + 1];

        let result = import(&user, &bytes, &conn);

        assert!(matches!(result, Err(Error::UploadTooLarge(_))));
    }

    #[test]
    fn parse_failure_rolls_back_the_artifact() {
        let conn = get_test_connection();
        let user = test_user(&conn);

        let result = import(&user, b"not;a;statement\n", &conn);

        assert!(matches!(result, Err(Error::InvalidCsv(_))));
        let artifact_count: u32 = conn
            .query_row("SELECT COUNT(id) FROM csv_artifact", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artifact_count, 0, "failed import must not keep its artifact");
    }

    #[test]
    fn statement_with_start_balance_materializes_thirty_days() {
        let conn = get_test_connection();
        let user = test_user(&conn);

        import(&user, STATEMENT_CSV.as_bytes(), &conn).unwrap();

        let stored = list_balance_range(
            user.id,
            date!(2026 - 01 - 06),
            date!(2026 - 02 - 04),
            &conn,
        )
        .unwrap();
        assert_eq!(stored.len(), 30);
        // Seeded with the derived start balance of 100,00 EUR, then -45,00
        // and +993,44 inside the window.
        assert_eq!(stored[29].balance_cents, 104_844);
    }

    #[test]
    fn statement_without_balance_leaves_snapshots_untouched() {
        let conn = get_test_connection();
        let user = test_user(&conn);
        import(&user, STATEMENT_CSV.as_bytes(), &conn).unwrap();
        let before = list_balance_range(
            user.id,
            date!(2026 - 01 - 06),
            date!(2026 - 02 - 04),
            &conn,
        )
        .unwrap();

        import(&user, STATEMENT_WITHOUT_BALANCE_CSV.as_bytes(), &conn).unwrap();

        let after = list_balance_range(
            user.id,
            date!(2026 - 01 - 06),
            date!(2026 - 02 - 04),
            &conn,
        )
        .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn accepted_rows_pass_through_the_category_assigner() {
        struct GroceriesAssigner;

        impl AssignCategories for GroceriesAssigner {
            fn assign_for_import(
                &self,
                _user_id: i64,
                transactions: &mut [TransactionBuilder],
            ) -> Result<(), Error> {
                for transaction in transactions {
                    transaction.category = Some("Groceries".to_owned());
                }
                Ok(())
            }
        }

        let conn = get_test_connection();
        let user = test_user(&conn);

        import_statement(
            &user,
            Some("umsaetze.csv"),
            Some("text/csv"),
            STATEMENT_CSV.as_bytes(),
            datetime!(2026-02-04 12:00 UTC),
            date!(2026 - 02 - 04),
            &GroceriesAssigner,
            &conn,
        )
        .unwrap();

        let stored = list_active_transactions(user.id, &conn).unwrap();
        assert!(
            stored
                .iter()
                .all(|transaction| transaction.category.as_deref() == Some("Groceries"))
        );
    }
}
