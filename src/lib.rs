//! Saldo is a web app that imports bank statement CSV exports, merges them
//! into a deduplicated transaction ledger and reconstructs a day-by-day
//! account balance history.
//!
//! Statements may overlap in date range and carry no stable transaction
//! identifier, so duplicates are detected heuristically; balances are
//! anchored on whichever stored statement carries the most trustworthy
//! balance information and walked day by day from there.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod artifact;
mod balance;
mod category;
mod csv_import;
mod database_id;
mod db;
mod endpoints;
mod html;
mod money;
mod navigation;
mod not_found;
mod routing;
mod settings;
#[cfg(test)]
mod test_utils;
mod timezone;
mod transaction;
mod user;

pub use app_state::AppState;
pub use balance::{BalancePoint, DailyBalance, balance_range, current_balance, materialized_range};
pub use category::{AssignCategories, NoCategoryAssigner};
pub use csv_import::{
    ImportOutcome, MAX_UPLOAD_BYTES, ParsedStatement, import_statement, parse_statement,
};
pub use db::initialize as initialize_db;
pub use routing::build_router;
pub use settings::{hard_delete_account, soft_delete_all_data};
pub use transaction::{RecordStatus, Transaction, TransactionBuilder, count_active_transactions};
pub use user::{Locale, User, create_user, ensure_default_user, get_default_user, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down
/// gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An uploaded statement file had no content.
    ///
    /// Nothing is persisted for such an upload.
    #[error("the uploaded file is empty")]
    EmptyUpload,

    /// An uploaded statement file exceeded the size ceiling.
    ///
    /// The contained value is the size of the rejected upload in bytes.
    #[error("the uploaded file is {0} bytes, which exceeds the limit of {MAX_UPLOAD_BYTES} bytes")]
    UploadTooLarge(usize),

    /// The multipart form could not be parsed as a list of CSV files.
    #[error("Could not parse multipart form: {0}")]
    MultipartError(String),

    /// The multipart form did not contain a CSV file.
    #[error("File is not a CSV")]
    NotCsv,

    /// The CSV had issues that prevented it from being parsed.
    #[error("Could not parse the CSV file: {0}")]
    InvalidCsv(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An error occurred while getting the local timezone from a canonical
    /// timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => not_found::get_404_not_found_response(),
            Error::EmptyUpload | Error::UploadTooLarge(_) | Error::NotCsv => {
                let description = self.to_string();
                (
                    StatusCode::BAD_REQUEST,
                    html::error_view(
                        "Upload rejected",
                        "Upload rejected",
                        &description,
                        "Choose a CSV statement export and try again.",
                    ),
                )
                    .into_response()
            }
            Error::InvalidCsv(details) => (
                StatusCode::BAD_REQUEST,
                html::error_view(
                    "Import failed",
                    "Could not read the statement",
                    &details,
                    "Check that the file is a CSV export from your bank.",
                ),
            )
                .into_response(),
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                html::error_view(
                    "Invalid timezone settings",
                    "Invalid timezone settings",
                    &format!(
                        "Could not get local timezone \"{timezone}\". Check your server settings \
                        and ensure the timezone has been set to a valid, canonical timezone string."
                    ),
                    "",
                ),
            )
                .into_response(),
            // Any errors that are not handled above are not intended to be
            // shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    html::error_view(
                        "Something went wrong",
                        "Sorry, something went wrong.",
                        "An unexpected error occurred.",
                        "Try again later or check the server logs.",
                    ),
                )
                    .into_response()
            }
        }
    }
}
