//! Application router configuration.

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::{
    AppState,
    balance::{get_balance_range, get_balances_page, get_materialized_range},
    csv_import::{get_import_page, import_statement_endpoint},
    endpoints,
    not_found::get_404_not_found,
    settings::{delete_account_endpoint, delete_data_endpoint, get_settings_page},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::BALANCES_VIEW, get(get_balances_page))
        .route(endpoints::IMPORT_VIEW, get(get_import_page))
        .route(endpoints::SETTINGS_VIEW, get(get_settings_page))
        .route(endpoints::IMPORT, post(import_statement_endpoint))
        .route(endpoints::BALANCES_API, get(get_balance_range))
        .route(endpoints::BALANCES_DAILY_API, get(get_materialized_range))
        .route(endpoints::DELETE_DATA, post(delete_data_endpoint))
        .route(endpoints::DELETE_ACCOUNT, post(delete_account_endpoint))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the balances page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::BALANCES_VIEW)
}

#[cfg(test)]
mod root_route_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{endpoints, routing::get_index_page};

    #[tokio::test]
    async fn root_redirects_to_balances() {
        let response = get_index_page().await.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get("location").unwrap();
        assert_eq!(location, endpoints::BALANCES_VIEW);
    }
}

#[cfg(test)]
mod router_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{AppState, build_router, endpoints, user::Locale};

    fn get_test_server() -> TestServer {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn, "Europe/Berlin", Locale::German).unwrap();
        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn balances_page_is_served() {
        let server = get_test_server();

        let response = server.get(endpoints::BALANCES_VIEW).await;

        response.assert_status_ok();
        assert!(response.text().contains("Current balance"));
    }

    #[tokio::test]
    async fn unknown_path_renders_404() {
        let server = get_test_server();

        let response = server.get("/does-not-exist").await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn balance_api_returns_json() {
        let server = get_test_server();

        let response = server
            .get(endpoints::BALANCES_API)
            .add_query_param("start", "2026-02-01")
            .add_query_param("end", "2026-02-03")
            .await;

        response.assert_status_ok();
        let points: Vec<serde_json::Value> = response.json();
        assert!(points.is_empty(), "no statements imported yet");
    }
}
