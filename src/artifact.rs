//! Stored statement uploads.
//!
//! Every successful import keeps the uploaded file's bytes verbatim so that
//! balance anchors can be re-derived from any historical statement at any
//! time. The ledger is a cache; the artifacts are the source of truth.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{ArtifactId, UserId},
    transaction::RecordStatus,
};

/// One uploaded statement file.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvArtifact {
    /// The ID of the artifact.
    pub id: ArtifactId,
    /// The ID of the user who uploaded the file.
    pub user_id: UserId,
    /// The file name the upload was submitted with.
    pub original_file_name: String,
    /// The MIME type the upload was submitted with.
    pub content_type: Option<String>,
    /// The verbatim file contents.
    pub bytes: Vec<u8>,
    /// The size of `bytes`.
    pub size_bytes: i64,
    /// When the file was uploaded.
    pub uploaded_at: OffsetDateTime,
    /// Whether the artifact is live or soft deleted.
    pub status: RecordStatus,
}

/// Create the statement artifact table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_artifact_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS csv_artifact (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                original_file_name TEXT NOT NULL,
                content_type TEXT,
                bytes BLOB NOT NULL,
                size_bytes INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Store an uploaded statement file.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn insert_artifact(
    user_id: UserId,
    original_file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    uploaded_at: OffsetDateTime,
    connection: &Connection,
) -> Result<CsvArtifact, Error> {
    connection
        .prepare(
            "INSERT INTO csv_artifact (
                user_id, original_file_name, content_type, bytes, size_bytes, uploaded_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, user_id, original_file_name, content_type, bytes, size_bytes,
                       uploaded_at, deleted_at",
        )?
        .query_row(
            rusqlite::params![
                user_id,
                original_file_name,
                content_type,
                bytes,
                bytes.len() as i64,
                uploaded_at,
            ],
            map_artifact_row,
        )
        .map_err(|error| error.into())
}

/// List the active (not soft deleted) artifacts for `user_id`, including
/// their raw bytes, oldest upload first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn list_active_artifacts(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<CsvArtifact>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, original_file_name, content_type, bytes, size_bytes,
                    uploaded_at, deleted_at
             FROM csv_artifact
             WHERE user_id = :user_id AND deleted_at IS NULL
             ORDER BY uploaded_at ASC, id ASC",
        )?
        .query_map(&[(":user_id", &user_id)], map_artifact_row)?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Get the most recently uploaded active artifact for `user_id`, if any.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn most_recent_artifact(
    user_id: UserId,
    connection: &Connection,
) -> Result<Option<CsvArtifact>, Error> {
    let mut stmt = connection.prepare(
        "SELECT id, user_id, original_file_name, content_type, bytes, size_bytes,
                uploaded_at, deleted_at
         FROM csv_artifact
         WHERE user_id = :user_id AND deleted_at IS NULL
         ORDER BY uploaded_at DESC, id DESC
         LIMIT 1",
    )?;

    let mut rows = stmt.query_map(&[(":user_id", &user_id)], map_artifact_row)?;

    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Mark every active artifact of `user_id` as deleted at `deleted_at`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn soft_delete_artifacts_for_user(
    user_id: UserId,
    deleted_at: OffsetDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "UPDATE csv_artifact SET deleted_at = ?1 WHERE user_id = ?2 AND deleted_at IS NULL",
            (deleted_at, user_id),
        )
        .map_err(|error| error.into())
}

/// Physically delete every artifact of `user_id`, soft deleted or not.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn hard_delete_artifacts_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute("DELETE FROM csv_artifact WHERE user_id = ?1", (user_id,))
        .map_err(|error| error.into())
}

fn map_artifact_row(row: &Row) -> Result<CsvArtifact, rusqlite::Error> {
    let deleted_at: Option<OffsetDateTime> = row.get(7)?;

    Ok(CsvArtifact {
        id: row.get(0)?,
        user_id: row.get(1)?,
        original_file_name: row.get(2)?,
        content_type: row.get(3)?,
        bytes: row.get(4)?,
        size_bytes: row.get(5)?,
        uploaded_at: row.get(6)?,
        status: RecordStatus::from_deleted_at(deleted_at),
    })
}

#[cfg(test)]
mod artifact_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        db::initialize,
        user::{Locale, create_user},
    };

    use super::{
        hard_delete_artifacts_for_user, insert_artifact, list_active_artifacts,
        most_recent_artifact, soft_delete_artifacts_for_user,
    };

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

    #[test]
    fn insert_keeps_bytes_verbatim() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);
        let bytes = b"Buchungstag;Umsatz in EUR\n01.02.2026;-45,00\n";

        let artifact = insert_artifact(
            user_id,
            "umsaetze.csv",
            Some("text/csv"),
            bytes,
            datetime!(2026-02-04 12:00 UTC),
            &conn,
        )
        .expect("Could not insert artifact");

        assert_eq!(artifact.bytes, bytes);
        assert_eq!(artifact.size_bytes, bytes.len() as i64);
        assert_eq!(artifact.original_file_name, "umsaetze.csv");
    }

    #[test]
    fn most_recent_prefers_latest_upload() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);
        insert_artifact(
            user_id,
            "old.csv",
            None,
            b"old",
            datetime!(2026-01-01 08:00 UTC),
            &conn,
        )
        .unwrap();
        insert_artifact(
            user_id,
            "new.csv",
            None,
            b"new",
            datetime!(2026-02-01 08:00 UTC),
            &conn,
        )
        .unwrap();

        let got = most_recent_artifact(user_id, &conn)
            .unwrap()
            .expect("want an artifact");

        assert_eq!(got.original_file_name, "new.csv");
    }

    #[test]
    fn most_recent_is_none_without_uploads() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);

        assert_eq!(most_recent_artifact(user_id, &conn).unwrap(), None);
    }

    #[test]
    fn soft_deleted_artifacts_are_not_listed() {
        let conn = get_test_connection();
        let user_id = test_user_id(&conn);
        insert_artifact(
            user_id,
            "a.csv",
            None,
            b"a",
            datetime!(2026-01-01 08:00 UTC),
            &conn,
        )
        .unwrap();

        soft_delete_artifacts_for_user(user_id, datetime!(2026-03-01 08:00 UTC), &conn).unwrap();

        assert!(list_active_artifacts(user_id, &conn).unwrap().is_empty());

        let total: u32 = conn
            .query_row("SELECT COUNT(id) FROM csv_artifact", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 1, "soft delete must keep the row");

        hard_delete_artifacts_for_user(user_id, &conn).unwrap();
        let total: u32 = conn
            .query_row("SELECT COUNT(id) FROM csv_artifact", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 0);
    }
}
