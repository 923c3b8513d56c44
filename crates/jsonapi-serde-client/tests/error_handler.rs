// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Decoding error documents of failed responses.

use jsonapi_serde_client::{handle_error_response, ErrorResponse, ErrorResponseError};
use serde_json::json;

const URL: &str = "https://api.test/articles/1";

fn respond<'a>(status: u16, content_type: Option<&'a str>, body: &'a [u8]) -> ErrorResponse<'a> {
    ErrorResponse {
        url: URL,
        status,
        content_type,
        body,
    }
}

#[test]
fn successful_responses_pass() {
    assert!(handle_error_response(&respond(200, Some("text/html"), b"<html>")).is_ok());
}

#[test]
fn error_document_becomes_api_error() {
    let body = json!({
        "errors": [
            { "status": "404", "code": "not_found", "title": "Not Found",
              "source": { "pointer": "/data" } }
        ],
        "meta": { "requestId": "abc" }
    })
    .to_string();

    let error = handle_error_response(&respond(
        404,
        Some("application/vnd.api+json; ext=\"https://a.test\""),
        body.as_bytes(),
    ))
    .expect_err("404 is an error");

    let ErrorResponseError::Api(error) = error else {
        panic!("expected API error, got {error:?}");
    };
    assert_eq!(error.message, "Failed to perform request to https://api.test/articles/1");
    assert_eq!(error.status, 404);
    assert_eq!(error.errors.len(), 1);
    assert_eq!(error.errors[0].code.as_deref(), Some("not_found"));
    assert_eq!(
        error.errors[0].source.as_ref().and_then(|source| source.pointer.as_deref()),
        Some("/data")
    );
    assert_eq!(
        error.meta.as_ref().and_then(|meta| meta.get("requestId")),
        Some(&json!("abc"))
    );
}

#[test]
fn wrong_content_type_is_reported() {
    let error = handle_error_response(&respond(500, Some("text/plain"), b"oops"))
        .expect_err("500 is an error");
    assert!(matches!(
        error,
        ErrorResponseError::InvalidContentType(Some(ref content_type)) if content_type == "text/plain"
    ));
    assert_eq!(
        error.to_string(),
        "Failed to parse error response, invalid content type: text/plain"
    );

    let error = handle_error_response(&respond(500, None, b"")).expect_err("500 is an error");
    assert!(matches!(error, ErrorResponseError::InvalidContentType(None)));
}

#[test]
fn invalid_error_documents_are_rejected() {
    let content_type = Some("application/vnd.api+json");

    let error = handle_error_response(&respond(400, content_type, b"{"))
        .expect_err("not json");
    assert!(matches!(error, ErrorResponseError::InvalidJson(_)));

    let error = handle_error_response(&respond(400, content_type, br#"{ "errors": [] }"#))
        .expect_err("empty errors");
    let ErrorResponseError::InvalidErrorDocument(validation) = error else {
        panic!("expected invalid document, got {error:?}");
    };
    assert_eq!(validation.issues()[0].code, "too_small");

    let error = handle_error_response(&respond(
        400,
        content_type,
        br#"{ "errors": [{ "title": "no status" }] }"#,
    ))
    .expect_err("status is required");
    assert!(matches!(error, ErrorResponseError::InvalidErrorDocument(_)));
}
