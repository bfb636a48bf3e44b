//! JSON endpoints serving balance series for a date range.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    balance::service::{balance_range, materialized_range},
    timezone::get_local_offset,
    user::get_default_user,
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// The state needed for the balance API endpoints.
#[derive(Debug, Clone)]
pub struct BalanceApiState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name.
    pub local_timezone: String,
}

impl FromRef<AppState> for BalanceApiState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The date range requested by the client, as ISO dates.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// The first day of the range.
    start: String,
    /// The last day of the range, inclusive.
    end: String,
}

impl RangeQuery {
    fn parse(&self) -> Result<(Date, Date), Response> {
        let parse = |value: &str| {
            Date::parse(value, DATE_FORMAT).map_err(|_| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("'{value}' is not a date in the form YYYY-MM-DD"),
                )
                    .into_response()
            })
        };

        Ok((parse(&self.start)?, parse(&self.end)?))
    }
}

/// One daily balance in a JSON response.
#[derive(Debug, Serialize)]
pub struct BalancePointDto {
    /// The day the balance is for, as an ISO date.
    pub date: String,
    /// The balance at the end of that day, in cents.
    pub balance_cents: i64,
}

/// Route handler computing a balance series on demand.
///
/// Responds with one point per calendar day in the requested range, or an
/// empty array when the user has no balance anchor yet.
pub async fn get_balance_range(
    State(state): State<BalanceApiState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<BalancePointDto>>, Response> {
    let (start, end) = query.parse()?;
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()).into_response())?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_response()
    })?;

    let user = get_default_user(&connection).map_err(IntoResponse::into_response)?;
    let points = balance_range(user.id, start, end, local_offset, &connection)
        .map_err(IntoResponse::into_response)?;

    Ok(Json(
        points
            .into_iter()
            .map(|point| BalancePointDto {
                date: point.date.to_string(),
                balance_cents: point.balance_cents,
            })
            .collect(),
    ))
}

/// Route handler serving the materialized daily snapshots.
///
/// Unlike [get_balance_range] this reads only what previous imports
/// persisted, making it cheap for large ranges.
pub async fn get_materialized_range(
    State(state): State<BalanceApiState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<BalancePointDto>>, Response> {
    let (start, end) = query.parse()?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_response()
    })?;

    let user = get_default_user(&connection).map_err(IntoResponse::into_response)?;
    let snapshots = materialized_range(user.id, start, end, &connection)
        .map_err(IntoResponse::into_response)?;

    Ok(Json(
        snapshots
            .into_iter()
            .map(|snapshot| BalancePointDto {
                date: snapshot.date.to_string(),
                balance_cents: snapshot.balance_cents,
            })
            .collect(),
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod balance_api_tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        artifact::insert_artifact,
        balance::{BalancePoint, materialize_series},
        db::initialize,
        transaction::{Transaction, insert_transactions},
        user::{Locale, ensure_default_user},
    };

    use super::{BalanceApiState, RangeQuery, get_balance_range, get_materialized_range};

    fn get_test_state() -> (BalanceApiState, i64) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user_id = ensure_default_user(Locale::English, &conn).unwrap().id;

        (
            BalanceApiState {
                db_connection: Arc::new(Mutex::new(conn)),
                local_timezone: "Europe/Berlin".to_owned(),
            },
            user_id,
        )
    }

    fn query(start: &str, end: &str) -> Query<RangeQuery> {
        Query(RangeQuery {
            start: start.to_owned(),
            end: end.to_owned(),
        })
    }

    #[tokio::test]
    async fn range_returns_one_point_per_day() {
        let (state, user_id) = get_test_state();
        {
            let conn = state.db_connection.lock().unwrap();
            insert_artifact(
                user_id,
                "umsaetze.csv",
                Some("text/csv"),
                "\"Neuer Kontostand\";\"1.048,44 EUR\"\n\
                 Buchungstag;Wertstellung (Valuta);Vorgang;Buchungstext;Umsatz in EUR\n\
                 03.02.2026;;Gutschrift;Gehalt;993,44\n\
                 02.02.2026;;Lastschrift;Miete;-45,00\n"
                    .as_bytes(),
                datetime!(2026-02-04 12:00 UTC),
                &conn,
            )
            .unwrap();
            insert_transactions(
                user_id,
                &[
                    Transaction::build(99_344, datetime!(2026-02-03 00:00)),
                    Transaction::build(-4_500, datetime!(2026-02-02 00:00)),
                ],
                &conn,
            )
            .unwrap();
        }

        let response = get_balance_range(State(state), query("2026-02-01", "2026-02-03"))
            .await
            .unwrap();

        let points = response.0;
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, "2026-02-01");
        assert_eq!(points[0].balance_cents, 10_000);
        assert_eq!(points[2].balance_cents, 108_894);
    }

    #[tokio::test]
    async fn range_without_anchor_is_empty() {
        let (state, _) = get_test_state();

        let response = get_balance_range(State(state), query("2026-02-01", "2026-02-03"))
            .await
            .unwrap();

        assert!(response.0.is_empty());
    }

    #[tokio::test]
    async fn invalid_date_is_rejected() {
        let (state, _) = get_test_state();

        let result = get_balance_range(State(state), query("02.02.2026", "2026-02-03")).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn materialized_range_serves_persisted_snapshots() {
        let (state, user_id) = get_test_state();
        {
            let conn = state.db_connection.lock().unwrap();
            materialize_series(
                user_id,
                &[
                    BalancePoint {
                        date: date!(2026 - 02 - 01),
                        balance_cents: 10_000,
                    },
                    BalancePoint {
                        date: date!(2026 - 02 - 02),
                        balance_cents: 9_550,
                    },
                ],
                datetime!(2026-02-03 12:00 UTC),
                &conn,
            )
            .unwrap();
        }

        let response = get_materialized_range(State(state), query("2026-02-01", "2026-02-28"))
            .await
            .unwrap();

        let points = response.0;
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].date, "2026-02-02");
        assert_eq!(points[1].balance_cents, 9_550);
    }
}
