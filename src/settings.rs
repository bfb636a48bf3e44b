//! Deleting stored data.
//!
//! "Delete all data" soft deletes the ledger and the stored statements and
//! purges the derived balance snapshots, keeping the rows recoverable.
//! Account deletion removes everything physically, including the user row.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    alert::Alert,
    artifact::{
        CsvArtifact, hard_delete_artifacts_for_user, most_recent_artifact,
        soft_delete_artifacts_for_user,
    },
    balance::delete_balances_for_user,
    database_id::UserId,
    endpoints,
    html::{BUTTON_DELETE_STYLE, PAGE_CONTAINER_STYLE, base},
    navigation::NavBar,
    transaction::{hard_delete_transactions_for_user, soft_delete_transactions_for_user},
    user::get_default_user,
};

/// Soft delete every transaction and statement of `user_id` and purge the
/// derived balance snapshots, as one atomic operation.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error; nothing
/// is deleted in that case.
pub fn soft_delete_all_data(
    user_id: UserId,
    deleted_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    soft_delete_transactions_for_user(user_id, deleted_at, &tx)?;
    soft_delete_artifacts_for_user(user_id, deleted_at, &tx)?;
    delete_balances_for_user(user_id, &tx)?;

    tx.commit()?;

    tracing::info!("Soft deleted all data for user {user_id}");

    Ok(())
}

/// Physically delete every row belonging to `user_id`, including the user
/// itself, as one atomic operation.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error; nothing
/// is deleted in that case.
pub fn hard_delete_account(user_id: UserId, connection: &Connection) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    hard_delete_transactions_for_user(user_id, &tx)?;
    hard_delete_artifacts_for_user(user_id, &tx)?;
    delete_balances_for_user(user_id, &tx)?;
    tx.execute("DELETE FROM user WHERE id = ?1", (user_id,))?;

    tx.commit()?;

    tracing::info!("Hard deleted account of user {user_id}");

    Ok(())
}

/// The state needed for the settings page and its endpoints.
#[derive(Debug, Clone)]
pub struct SettingsState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SettingsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn settings_view(last_import: Option<&CsvArtifact>) -> Markup {
    let nav_bar = NavBar::new(endpoints::SETTINGS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-4"
            {
                h1 class="text-2xl font-bold" { "Settings" }

                p id="last-import" class="text-sm text-gray-700 dark:text-gray-300"
                {
                    @match last_import
                    {
                        Some(artifact) => {
                            "Most recent import: " (artifact.original_file_name)
                            " (" (artifact.size_bytes) " bytes)"
                        }
                        None => {
                            "No statements imported yet."
                        }
                    }
                }

                p
                {
                    "Deleting your data removes all imported transactions, \
                    statements and balance history. This cannot be undone \
                    from the app."
                }

                form method="post" action=(endpoints::DELETE_DATA)
                {
                    button type="submit" class=(BUTTON_DELETE_STYLE)
                    {
                        "Delete all data"
                    }
                }

                form method="post" action=(endpoints::DELETE_ACCOUNT)
                {
                    button type="submit" class=(BUTTON_DELETE_STYLE)
                    {
                        "Delete account"
                    }
                }
            }
        }
    };

    base("Settings", &content)
}

/// Route handler for the settings page.
pub async fn get_settings_page(State(state): State<SettingsState>) -> Result<Response, Response> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_response()
    })?;

    let user = get_default_user(&connection).map_err(IntoResponse::into_response)?;
    let last_import =
        most_recent_artifact(user.id, &connection).map_err(IntoResponse::into_response)?;

    Ok(settings_view(last_import.as_ref()).into_response())
}

fn deletion_confirmation_view(alert: Alert) -> Markup {
    let nav_bar = NavBar::new(endpoints::SETTINGS_VIEW).into_html();
    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-4"
            {
                (alert.into_html())
            }
        }
    };

    base("Settings", &content)
}

/// Route handler that soft deletes all stored data of the default user.
pub async fn delete_data_endpoint(State(state): State<SettingsState>) -> Result<Response, Response> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_response()
    })?;

    let user = get_default_user(&connection).map_err(IntoResponse::into_response)?;

    soft_delete_all_data(user.id, OffsetDateTime::now_utc(), &connection)
        .map_err(IntoResponse::into_response)?;

    let view = deletion_confirmation_view(Alert::success(
        "Data deleted",
        "All imported data has been removed.",
    ));

    Ok((StatusCode::OK, view).into_response())
}

/// Route handler that physically deletes the default user and all their data.
///
/// The user is re-provisioned on the next server start.
pub async fn delete_account_endpoint(
    State(state): State<SettingsState>,
) -> Result<Response, Response> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_response()
    })?;

    let user = get_default_user(&connection).map_err(IntoResponse::into_response)?;

    hard_delete_account(user.id, &connection).map_err(IntoResponse::into_response)?;

    let view = deletion_confirmation_view(Alert::success(
        "Account deleted",
        "The account and all its data have been removed. \
        Restart the server to start over.",
    ));

    Ok((StatusCode::OK, view).into_response())
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod settings_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode};
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        artifact::insert_artifact,
        db::initialize,
        endpoints,
        test_utils::{assert_alert_message, assert_content_type, parse_html_document},
        transaction::{Transaction, count_active_transactions, insert_transactions},
        user::{Locale, ensure_default_user, get_default_user},
    };

    use super::{SettingsState, delete_data_endpoint, get_settings_page};

    fn get_test_state() -> (SettingsState, i64) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user_id = ensure_default_user(Locale::English, &conn).unwrap().id;

        (
            SettingsState {
                db_connection: Arc::new(Mutex::new(conn)),
            },
            user_id,
        )
    }

    #[tokio::test]
    async fn render_page_with_last_import() {
        let (state, user_id) = get_test_state();
        {
            let conn = state.db_connection.lock().unwrap();
            insert_artifact(
                user_id,
                "umsaetze.csv",
                Some("text/csv"),
                b"bytes",
                datetime!(2026-02-04 12:00 UTC),
                &conn,
            )
            .unwrap();
        }

        let response = get_settings_page(State(state)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_content_type(&response, "text/html; charset=utf-8");

        let html = parse_html_document(response).await;
        let last_import = html
            .select(&scraper::Selector::parse("#last-import").unwrap())
            .next()
            .expect("No last-import element found")
            .text()
            .collect::<String>();
        assert!(last_import.contains("umsaetze.csv"));

        let forms: Vec<_> = html
            .select(&scraper::Selector::parse("form").unwrap())
            .map(|form| form.value().attr("action").unwrap_or_default().to_owned())
            .collect();
        assert_eq!(
            forms,
            vec![
                endpoints::DELETE_DATA.to_owned(),
                endpoints::DELETE_ACCOUNT.to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn delete_data_removes_active_transactions() {
        let (state, user_id) = get_test_state();
        {
            let conn = state.db_connection.lock().unwrap();
            insert_transactions(
                user_id,
                &[Transaction::build(-4_500, datetime!(2026-02-02 00:00))],
                &conn,
            )
            .unwrap();
        }

        let response = delete_data_endpoint(State(state.clone())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let count = {
            let conn = state.db_connection.lock().unwrap();
            count_active_transactions(user_id, &conn).unwrap()
        };
        assert_eq!(count, 0);

        // The default user survives, so the app keeps working.
        {
            let conn = state.db_connection.lock().unwrap();
            get_default_user(&conn).expect("Default user must survive data deletion");
        }

        assert_alert_message(response, "Data deleted").await;
    }

    #[tokio::test]
    async fn delete_account_removes_the_default_user() {
        let (state, _) = get_test_state();

        let response = super::delete_account_endpoint(State(state.clone()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let conn = state.db_connection.lock().unwrap();
        assert!(
            get_default_user(&conn).is_err(),
            "account deletion must remove the default user"
        );
    }
}
