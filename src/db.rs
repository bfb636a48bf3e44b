//! Database initialization for the application's SQLite schema.

use rusqlite::Connection;

use crate::{
    artifact::create_artifact_table, balance::create_balance_daily_table,
    transaction::create_transaction_table, user::create_user_table,
};

/// Create the tables for all domain models.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    create_user_table(connection)?;
    create_transaction_table(connection)?;
    create_artifact_table(connection)?;
    create_balance_daily_table(connection)?;

    Ok(())
}
