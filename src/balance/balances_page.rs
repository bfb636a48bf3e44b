use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error,
    balance::{
        service::{balance_range, current_balance},
        walker::BalancePoint,
    },
    endpoints,
    html::{PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base},
    money::{format_cents, format_date},
    navigation::NavBar,
    timezone::{get_local_offset, local_today},
    user::{Locale, get_default_user},
};

/// The state needed for the balances page.
#[derive(Debug, Clone)]
pub struct BalancesPageState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name.
    pub local_timezone: String,
}

impl FromRef<AppState> for BalancesPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Route handler for the balances page.
///
/// Shows the current balance and the last 30 days, both computed on demand
/// from the stored statements, or an empty state when no statement ever
/// carried balance information.
pub async fn get_balances_page(State(state): State<BalancesPageState>) -> Result<Response, Response> {
    let today = local_today(&state.local_timezone).map_err(IntoResponse::into_response)?;
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()).into_response())?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_response()
    })?;

    let user = get_default_user(&connection).map_err(IntoResponse::into_response)?;

    let balance = current_balance(user.id, today, local_offset, &connection)
        .map_err(IntoResponse::into_response)?;
    let series = balance_range(
        user.id,
        today - Duration::days(29),
        today,
        local_offset,
        &connection,
    )
    .map_err(IntoResponse::into_response)?;

    Ok(balances_view(balance, &series, user.locale).into_response())
}

fn balances_view(balance: Option<i64>, series: &[BalancePoint], locale: Locale) -> Markup {
    let nav_bar = NavBar::new(endpoints::BALANCES_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-6"
            {
                div
                {
                    h1 class="text-2xl font-bold" { "Current balance" }
                    @match balance
                    {
                        Some(cents) => {
                            p id="current-balance" class="text-4xl font-extrabold"
                            {
                                (format_cents(cents, locale))
                            }
                        }
                        None => {
                            p id="current-balance" class="text-lg text-gray-500 dark:text-gray-400"
                            {
                                "No balance information yet. Import a statement \
                                that includes a balance to get started."
                            }
                        }
                    }
                }

                @if !series.is_empty()
                {
                    table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Balance" }
                            }
                        }
                        tbody
                        {
                            @for point in series.iter().rev()
                            {
                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td class=(TABLE_CELL_STYLE) { (format_date(point.date, locale)) }
                                    td class=(TABLE_CELL_STYLE) { (format_cents(point.balance_cents, locale)) }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base("Balances", &content)
}

// ============================================================================
// TESTS
// ============================================================================
