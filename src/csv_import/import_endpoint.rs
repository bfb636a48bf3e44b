use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Multipart, State, multipart::Field},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::html;
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    alert::Alert,
    category::NoCategoryAssigner,
    csv_import::service::{ImportOutcome, import_statement},
    endpoints,
    html::{PAGE_CONTAINER_STYLE, base},
    navigation::NavBar,
    timezone::local_today,
    user::get_default_user,
};

/// How many duplicate descriptions the result page shows at most.
const DUPLICATE_SAMPLE_LIMIT: usize = 5;

/// The state needed for importing statements.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name.
    pub local_timezone: String,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Route handler for importing transactions from uploaded CSV statements.
///
/// Each uploaded file is imported in its own database transaction; the
/// response sums the outcomes.
pub async fn import_statement_endpoint(
    State(state): State<ImportState>,
    mut multipart: Multipart,
) -> Result<Response, Response> {
    let mut uploads = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                tracing::error!("Could not read multipart form field: {error}");
                return Err(Error::MultipartError(error.to_string()).into_response());
            }
        };

        uploads.push(parse_multipart_field(field).await.map_err(|error| {
            tracing::debug!("Rejecting multipart field: {error}");
            import_error_response(error)
        })?);
    }

    let today = local_today(&state.local_timezone).map_err(IntoResponse::into_response)?;
    let uploaded_at = OffsetDateTime::now_utc();

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_response()
    })?;

    let user = get_default_user(&connection).map_err(IntoResponse::into_response)?;

    let mut accepted_count = 0;
    let mut duplicate_count = 0;
    let mut duplicate_samples = Vec::new();

    for (file_name, bytes) in uploads {
        let outcome = import_statement(
            &user,
            Some(&file_name),
            Some("text/csv"),
            &bytes,
            uploaded_at,
            today,
            &NoCategoryAssigner,
            &connection,
        )
        .map_err(|error| {
            tracing::error!("Failed to import {file_name}: {error}");
            import_error_response(error)
        })?;

        accepted_count += outcome.accepted_count;
        duplicate_count += outcome.duplicate_count;
        duplicate_samples.extend(outcome.duplicate_samples);
    }

    let outcome = ImportOutcome {
        accepted_count,
        duplicate_count,
        duplicate_samples,
    };

    Ok((StatusCode::CREATED, import_result_view(&outcome)).into_response())
}

async fn parse_multipart_field(field: Field<'_>) -> Result<(String, Vec<u8>), Error> {
    if field.content_type() != Some("text/csv") {
        return Err(Error::NotCsv);
    }

    let file_name = match field.file_name() {
        Some(file_name) => file_name.to_owned(),
        None => {
            return Err(Error::MultipartError(
                "Could not get file name from multipart form field".to_owned(),
            ));
        }
    };

    // Statements may be windows-1252 encoded, so the raw bytes are kept and
    // decoding is left to the parser.
    let bytes = field.bytes().await.map_err(|error| {
        tracing::error!("Could not read data from multipart form field: {error}");
        Error::MultipartError("Could not read data from multipart form field.".to_owned())
    })?;

    tracing::debug!("Received file '{}' that is {} bytes", file_name, bytes.len());

    Ok((file_name, bytes.to_vec()))
}

/// Render an upload or parse rejection as an alert page; other errors keep
/// their generic error pages.
fn import_error_response(error: Error) -> Response {
    let alert = match &error {
        Error::NotCsv => Alert::error("File type must be CSV.", ""),
        Error::EmptyUpload | Error::UploadTooLarge(_) => {
            Alert::error("Upload rejected", &error.to_string())
        }
        Error::InvalidCsv(_) => Alert::error(
            "Failed to parse CSV",
            "Check that the provided file is a valid statement export from your bank.",
        ),
        _ => return error.into_response(),
    };

    let nav_bar = NavBar::new(endpoints::IMPORT_VIEW).into_html();
    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-4"
            {
                (alert.into_html())

                a
                    href=(endpoints::IMPORT_VIEW)
                    class="text-blue-600 hover:text-blue-500 dark:text-blue-500 underline"
                {
                    "Back to import"
                }
            }
        }
    };

    (StatusCode::BAD_REQUEST, base("Import Failed", &content)).into_response()
}

fn import_result_view(outcome: &ImportOutcome) -> maud::Markup {
    let alert = match (outcome.accepted_count, outcome.duplicate_count) {
        (0, 0) => Alert::success("Import completed", "The statement contained no transactions."),
        (0, duplicates) => Alert::success(
            "Import completed",
            &format!("No new transactions; {duplicates} duplicates were skipped."),
        ),
        (accepted, 0) => Alert::success(
            "Import completed successfully!",
            &format!("Imported {accepted} transactions."),
        ),
        (accepted, duplicates) => Alert::success(
            "Import completed successfully!",
            &format!("Imported {accepted} transactions; {duplicates} duplicates were skipped."),
        ),
    };

    let nav_bar = NavBar::new(endpoints::IMPORT_VIEW).into_html();
    let shown_samples = outcome
        .duplicate_samples
        .iter()
        .take(DUPLICATE_SAMPLE_LIMIT);
    let hidden_count = outcome
        .duplicate_samples
        .len()
        .saturating_sub(DUPLICATE_SAMPLE_LIMIT);

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-4"
            {
                (alert.into_html())

                @if !outcome.duplicate_samples.is_empty()
                {
                    div class="text-sm text-gray-700 dark:text-gray-300"
                    {
                        p class="font-medium" { "Skipped duplicates:" }
                        ul class="list-disc list-inside"
                        {
                            @for sample in shown_samples
                            {
                                li { (sample) }
                            }
                        }
                        @if hidden_count > 0
                        {
                            p { "… and " (hidden_count) " more." }
                        }
                    }
                }

                a
                    href=(endpoints::BALANCES_VIEW)
                    class="text-blue-600 hover:text-blue-500 dark:text-blue-500 underline"
                {
                    "View balances"
                }
            }
        }
    };

    base("Import Result", &content)
}

// ============================================================================
// TESTS
// ============================================================================
