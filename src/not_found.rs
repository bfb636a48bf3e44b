//! The 404 not found page.

use axum::{http::StatusCode, response::Response};

use crate::html::{error_view, render};

/// Get a response containing the 404 not found page.
pub fn get_404_not_found_response() -> Response {
    render(
        StatusCode::NOT_FOUND,
        error_view(
            "Page not found",
            "404",
            "The page you are looking for does not exist.",
            "Check the address or head back to the balances page.",
        ),
    )
}

/// Route handler for unmatched paths.
pub async fn get_404_not_found() -> Response {
    get_404_not_found_response()
}
