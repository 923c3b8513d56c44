// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Turning non-successful HTTP responses into typed JSON:API errors.
//!
//! The handler is transport-agnostic: callers copy the URL, status,
//! `Content-Type` header and body out of whatever HTTP client they use.

use std::sync::OnceLock;

use jsonapi_serde_core::json_api::{ErrorObject, Meta};
use jsonapi_serde_core::schema::{
    array, link, object, record, string, ObjectSchema, Schema, ValidationError,
};
use jsonapi_serde_core::JSONAPI_MEDIA_TYPE;
use serde_json::Value;
use thiserror::Error;

/// The parts of an HTTP response the handler looks at.
#[derive(Debug, Clone, Copy)]
pub struct ErrorResponse<'a> {
    /// Request URL, used in the error message.
    pub url: &'a str,
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<&'a str>,
    /// Raw response body.
    pub body: &'a [u8],
}

/// A JSON:API error document returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct JsonApiResponseError {
    /// `Failed to perform request to <url>`.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
    /// Error objects (at least one).
    pub errors: Vec<ErrorObject>,
    /// Document meta.
    pub meta: Option<Meta>,
}

/// Outcome of a non-successful response.
#[derive(Debug, Error)]
pub enum ErrorResponseError {
    /// The server answered with a JSON:API error document.
    #[error(transparent)]
    Api(#[from] JsonApiResponseError),
    /// The response is not a JSON:API document.
    #[error("Failed to parse error response, invalid content type: {}", .0.as_deref().unwrap_or("none"))]
    InvalidContentType(Option<String>),
    /// The body is not JSON.
    #[error("failed to parse error response body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The body is JSON but not a valid error document.
    #[error("invalid error document: {0}")]
    InvalidErrorDocument(#[from] ValidationError),
}

fn error_document_schema() -> &'static ObjectSchema {
    static SCHEMA: OnceLock<ObjectSchema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let error_object = object()
            .optional("id", string())
            .optional(
                "links",
                object().optional("about", link()).optional("type", link()),
            )
            .field("status", string())
            .optional("code", string())
            .optional("title", string())
            .optional("detail", string())
            .optional(
                "source",
                object()
                    .optional("pointer", string())
                    .optional("parameter", string())
                    .optional("header", string()),
            )
            .optional("meta", record());

        object()
            .field("errors", array(error_object).min_len(1))
            .optional("meta", record())
    })
}

/// Do nothing for 2xx responses; otherwise decode the error document.
pub fn handle_error_response(response: &ErrorResponse<'_>) -> Result<(), ErrorResponseError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }

    if !response
        .content_type
        .is_some_and(|content_type| content_type.starts_with(JSONAPI_MEDIA_TYPE))
    {
        return Err(ErrorResponseError::InvalidContentType(
            response.content_type.map(ToOwned::to_owned),
        ));
    }

    let body: Value = serde_json::from_slice(response.body)?;
    let document = error_document_schema()
        .validate(&body)
        .map_err(ValidationError::new)?;

    let errors: Vec<ErrorObject> = serde_json::from_value(
        document.get("errors").cloned().unwrap_or_default(),
    )?;
    let meta = document
        .get("meta")
        .and_then(Value::as_object)
        .cloned();

    Err(JsonApiResponseError {
        message: format!("Failed to perform request to {}", response.url),
        status: response.status,
        errors,
        meta,
    }
    .into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: Option<&'static str>, body: &'static str) -> ErrorResponse<'static> {
        ErrorResponse {
            url: "https://api.test/users",
            status,
            content_type,
            body: body.as_bytes(),
        }
    }

    #[test]
    fn success_is_ignored() {
        assert!(handle_error_response(&response(204, None, "")).is_ok());
    }

    #[test]
    fn error_document_links_are_optional_members() {
        let body = r#"{ "errors": [{ "status": "404", "links": { "about": "/docs/404" } }] }"#;
        let error = handle_error_response(&response(
            404,
            Some("application/vnd.api+json"),
            body,
        ))
        .unwrap_err();
        assert!(matches!(error, ErrorResponseError::Api(_)));
    }
}
