//! Defines the core data models and database queries for ledger transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::{
    Error,
    database_id::{TransactionId, UserId},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a record is live or has been soft deleted.
///
/// Soft deletion is an explicit status rather than a nullable timestamp
/// column: every read site has to say which states it wants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RecordStatus {
    /// The record is live.
    Active,
    /// The record was soft deleted at the contained instant.
    Deleted(OffsetDateTime),
}

impl RecordStatus {
    /// Build a status from a `deleted_at` column value.
    pub fn from_deleted_at(deleted_at: Option<OffsetDateTime>) -> Self {
        match deleted_at {
            None => RecordStatus::Active,
            Some(at) => RecordStatus::Deleted(at),
        }
    }
}

/// A single booked bank transaction.
///
/// Created once during import merge and never mutated afterwards, apart from
/// the category label (assigned externally) and the soft-delete status.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The ID of the user owning the transaction.
    pub user_id: UserId,
    /// When the transaction was booked, in local time.
    pub booking_datetime: PrimitiveDateTime,
    /// The value date (Wertstellung), if the statement carried one.
    pub value_date: Option<Date>,
    /// The bank's transaction type tag, e.g. "Lastschrift".
    pub transaction_type: Option<String>,
    /// The name of the counterparty.
    pub partner_name: String,
    /// A text description of what the transaction was for.
    pub purpose_text: String,
    /// The verbatim booking text from the source statement.
    pub raw_booking_text: Option<String>,
    /// An explicit reference identifier, if the statement carried one.
    pub reference_text: Option<String>,
    /// The category label assigned by the external rule engine.
    pub category: Option<String>,
    /// The amount in cents. Negative values are debits, positive credits.
    pub amount_cents: i64,
    /// The ISO currency code of the amount.
    pub currency: String,
    /// Whether the transaction is live or soft deleted.
    pub status: RecordStatus,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(amount_cents: i64, booking_datetime: PrimitiveDateTime) -> TransactionBuilder {
        TransactionBuilder {
            booking_datetime,
            value_date: None,
            transaction_type: None,
            partner_name: String::new(),
            purpose_text: String::new(),
            raw_booking_text: None,
            reference_text: None,
            category: None,
            amount_cents,
        }
    }
}

/// A transaction that has been parsed from a statement but not yet inserted.
///
/// The owning user and the row ID are only known at insert time, so parsed
/// rows travel as builders until [insert_transactions] persists them.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBuilder {
    /// When the transaction was booked, in local time.
    pub booking_datetime: PrimitiveDateTime,
    /// The value date, if present.
    pub value_date: Option<Date>,
    /// The bank's transaction type tag.
    pub transaction_type: Option<String>,
    /// The name of the counterparty.
    pub partner_name: String,
    /// A text description of what the transaction was for.
    pub purpose_text: String,
    /// The verbatim booking text from the source statement.
    pub raw_booking_text: Option<String>,
    /// An explicit reference identifier, if present.
    pub reference_text: Option<String>,
    /// The category label assigned by the external rule engine.
    pub category: Option<String>,
    /// The amount in cents.
    pub amount_cents: i64,
}

impl TransactionBuilder {
    /// Set the counterparty name.
    pub fn partner_name(mut self, partner_name: &str) -> Self {
        self.partner_name = partner_name.to_owned();
        self
    }

    /// Set the purpose text.
    pub fn purpose_text(mut self, purpose_text: &str) -> Self {
        self.purpose_text = purpose_text.to_owned();
        self
    }

    /// Set the verbatim booking text.
    pub fn raw_booking_text(mut self, raw_booking_text: Option<String>) -> Self {
        self.raw_booking_text = raw_booking_text;
        self
    }

    /// Set the explicit reference identifier.
    pub fn reference_text(mut self, reference_text: Option<String>) -> Self {
        self.reference_text = reference_text;
        self
    }

    /// Set the transaction type tag.
    pub fn transaction_type(mut self, transaction_type: Option<String>) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    /// Set the value date.
    pub fn value_date(mut self, value_date: Option<Date>) -> Self {
        self.value_date = value_date;
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                booking_datetime TEXT NOT NULL,
                value_date TEXT,
                transaction_type TEXT,
                partner_name TEXT NOT NULL,
                purpose_text TEXT NOT NULL,
                raw_booking_text TEXT,
                reference_text TEXT,
                category TEXT,
                amount_cents INTEGER NOT NULL,
                currency TEXT NOT NULL DEFAULT 'EUR',
                deleted_at TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    // Composite index used by the active-ledger query on every import and
    // balance walk.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_booking
         ON \"transaction\"(user_id, deleted_at, booking_datetime);",
        (),
    )?;

    Ok(())
}

/// Insert a batch of parsed transactions for `user_id`.
///
/// Returns the inserted transactions, in input order.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn insert_transactions(
    user_id: UserId,
    builders: &[TransactionBuilder],
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut stmt = connection.prepare(
        "INSERT INTO \"transaction\" (
            user_id, booking_datetime, value_date, transaction_type, partner_name,
            purpose_text, raw_booking_text, reference_text, category, amount_cents
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         RETURNING id, user_id, booking_datetime, value_date, transaction_type,
                   partner_name, purpose_text, raw_booking_text, reference_text,
                   category, amount_cents, currency, deleted_at",
    )?;

    let mut inserted = Vec::with_capacity(builders.len());

    for builder in builders {
        let transaction = stmt.query_row(
            rusqlite::params![
                user_id,
                builder.booking_datetime,
                builder.value_date,
                builder.transaction_type,
                builder.partner_name,
                builder.purpose_text,
                builder.raw_booking_text,
                builder.reference_text,
                builder.category,
                builder.amount_cents,
            ],
            map_transaction_row,
        )?;

        inserted.push(transaction);
    }

    Ok(inserted)
}

/// List the active (not soft deleted) transactions for `user_id`, newest
/// booking first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn list_active_transactions(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, booking_datetime, value_date, transaction_type,
                    partner_name, purpose_text, raw_booking_text, reference_text,
                    category, amount_cents, currency, deleted_at
             FROM \"transaction\"
             WHERE user_id = :user_id AND deleted_at IS NULL
             ORDER BY booking_datetime DESC",
        )?
        .query_map(&[(":user_id", &user_id)], map_transaction_row)?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Get the number of active transactions for `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_active_transactions(user_id: UserId, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = :user_id AND deleted_at IS NULL",
            &[(":user_id", &user_id)],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Mark every active transaction of `user_id` as deleted at `deleted_at`.
///
/// Rows are kept in the database; only a full account purge removes them.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn soft_delete_transactions_for_user(
    user_id: UserId,
    deleted_at: OffsetDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "UPDATE \"transaction\" SET deleted_at = ?1 WHERE user_id = ?2 AND deleted_at IS NULL",
            (deleted_at, user_id),
        )
        .map_err(|error| error.into())
}

/// Physically delete every transaction of `user_id`, soft deleted or not.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn hard_delete_transactions_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute("DELETE FROM \"transaction\" WHERE user_id = ?1", (user_id,))
        .map_err(|error| error.into())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let deleted_at: Option<OffsetDateTime> = row.get(12)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        booking_datetime: row.get(2)?,
        value_date: row.get(3)?,
        transaction_type: row.get(4)?,
        partner_name: row.get(5)?,
        purpose_text: row.get(6)?,
        raw_booking_text: row.get(7)?,
        reference_text: row.get(8)?,
        category: row.get(9)?,
        amount_cents: row.get(10)?,
        currency: row.get(11)?,
        status: RecordStatus::from_deleted_at(deleted_at),
    })
}

// ============================================================================
// TESTS
// ============================================================================
