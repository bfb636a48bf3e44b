//! Code for creating the user table and fetching users from the database.
//!
//! The app serves a single local user: authentication is handled outside of
//! this application, so [ensure_default_user] provisions one row at startup
//! and every handler operates on it.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::UserId};

/// The email address given to the provisioned default user.
pub const DEFAULT_USER_EMAIL: &str = "local@saldo";

/// The display locale for a user.
///
/// Controls how dates and amounts are rendered, e.g. in duplicate-import
/// descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    /// `2026-02-01`, `1,234.56 EUR`.
    English,
    /// `01.02.2026`, `1.234,56 EUR`.
    German,
}

impl Locale {
    /// The language tag stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::German => "de",
        }
    }

    /// Parse a language tag, defaulting to English for unknown tags.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("de") {
            Locale::German
        } else {
            Locale::English
        }
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The user's email address.
    pub email: String,
    /// The locale used to format dates and amounts for this user.
    pub locale: Locale,
}

/// Create the user table.
///
/// # Errors
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                locale TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn create_user(email: &str, locale: Locale, connection: &Connection) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (email, locale) VALUES (?1, ?2)",
        (email, locale.as_str()),
    )?;

    Ok(User {
        id: connection.last_insert_rowid(),
        email: email.to_owned(),
        locale,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `user_id` does not belong to a stored user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_user_by_id(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, locale FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the default user the application serves.
///
/// # Errors
/// Returns [Error::NotFound] if the default user has not been provisioned.
pub fn get_default_user(connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, locale FROM user WHERE email = :email")?
        .query_row(&[(":email", &DEFAULT_USER_EMAIL)], map_user_row)
        .map_err(|error| error.into())
}

/// Create the default user if it does not exist yet, and update its locale to
/// `locale` either way so a changed server flag takes effect on restart.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn ensure_default_user(locale: Locale, connection: &Connection) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (email, locale) VALUES (?1, ?2)
         ON CONFLICT(email) DO UPDATE SET locale = excluded.locale",
        (DEFAULT_USER_EMAIL, locale.as_str()),
    )?;

    get_default_user(connection)
}

fn map_user_row(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let id = row.get(0)?;
    let email = row.get(1)?;
    let locale: String = row.get(2)?;

    Ok(User {
        id,
        email,
        locale: Locale::from_tag(&locale),
    })
}
