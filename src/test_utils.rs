//! Shared helpers for endpoint and page tests.

use axum::{
    body,
    extract::{FromRequest, Multipart},
    http::Request,
    response::Response,
};
use scraper::{ElementRef, Html};

use crate::endpoints;

/// Assert that `response` has the given content type header.
#[track_caller]
pub fn assert_content_type(response: &Response, content_type: &str) {
    let got = response
        .headers()
        .get("content-type")
        .expect("No content-type header")
        .to_str()
        .unwrap()
        .to_owned();

    assert_eq!(got, content_type, "want content type {content_type}, got {got}");
}

/// Read the response body and parse it as an HTML document.
pub async fn parse_html_document(response: Response) -> Html {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Could not read response body");
    let text = String::from_utf8(bytes.to_vec()).expect("Response body is not UTF-8");

    Html::parse_document(&text)
}

/// Get the first form of the document, panicking if there is none.
#[track_caller]
pub fn must_get_form(html: &Html) -> ElementRef<'_> {
    html.select(&scraper::Selector::parse("form").unwrap())
        .next()
        .expect("No form found in document")
}

/// Assert that the page contains an alert with the given headline.
pub async fn assert_alert_message(response: Response, expected_message: &str) {
    let html = parse_html_document(response).await;

    let alert_container = html
        .select(&scraper::Selector::parse("#alert-container").unwrap())
        .next()
        .expect("No alert container found");

    let message = alert_container
        .select(&scraper::Selector::parse("p.text-sm.font-medium").unwrap())
        .next()
        .expect("No alert message found")
        .text()
        .collect::<String>();

    assert_eq!(message.trim(), expected_message);
}

/// Build a `Multipart` extractor carrying one CSV file per string.
pub async fn must_make_multipart_csv(csv_strings: &[&str]) -> Multipart {
    let boundary = "MY_BOUNDARY123456789";
    let boundary_start = format!("--{boundary}");
    let boundary_end = format!("--{boundary}--");

    let mut lines: Vec<&str> = Vec::new();

    for csv_string in csv_strings {
        lines.push(&boundary_start);
        lines.push("Content-Disposition: form-data; name=\"files\"; filename=\"umsaetze.CSV\";");
        lines.push("Content-Type: text/csv");
        lines.push("");
        lines.push(csv_string);
    }

    lines.push(&boundary_end);

    let data = lines.join("\r\n").into_bytes();

    let request = Request::builder()
        .method("POST")
        .uri(endpoints::IMPORT)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(data.into())
        .unwrap();

    Multipart::from_request(request, &{}).await.unwrap()
}

/// Build a `Multipart` extractor with one dummy file per content type.
pub async fn must_make_multipart(file_types: &[&str]) -> Multipart {
    let boundary = "MY_BOUNDARY123456789";
    let boundary_start = format!("--{boundary}");
    let boundary_end = format!("--{boundary}--");

    let mut lines: Vec<String> = Vec::new();

    for file_type in file_types {
        lines.push(boundary_start.clone());
        lines.push(
            "Content-Disposition: form-data; name=\"files\"; filename=\"umsaetze.CSV\";".to_owned(),
        );
        lines.push(format!("Content-Type: {file_type}"));
        lines.push("".to_owned());
        lines.push("foo".to_owned());
    }

    lines.push(boundary_end);

    let data = lines.join("\r\n").into_bytes();

    let request = Request::builder()
        .method("POST")
        .uri(endpoints::IMPORT)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(data.into())
        .unwrap();

    Multipart::from_request(request, &{}).await.unwrap()
}
