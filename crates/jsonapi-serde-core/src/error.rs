// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON:API error collection with HTTP status inference.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::warn;

use crate::document::JsonApiDocument;
use crate::json_api::{ErrorObject, ErrorSource, TopLevelMembers};
use crate::schema::{PathSegment, ValidationError};

/// Returned when a [`JsonApiError`] is built from an empty error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("at least one error must be supplied")]
pub struct NoErrorsSupplied;

/// Where validated input came from; decides status and `source` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSource {
    /// Request body: status 422, `source.pointer`.
    Body,
    /// Query string: status 400, `source.parameter`.
    Query,
}

/// One or more error objects plus the HTTP status inferred from them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("JSON:API error (status {status}, {} error object(s))", .errors.len())]
pub struct JsonApiError {
    errors: Vec<ErrorObject>,
    status: u16,
}

impl JsonApiError {
    /// Build from a non-empty error list.
    pub fn new(errors: Vec<ErrorObject>) -> Result<Self, NoErrorsSupplied> {
        if errors.is_empty() {
            return Err(NoErrorsSupplied);
        }
        let status = determine_status(&errors);
        Ok(Self { errors, status })
    }

    /// Build from a single error object.
    pub fn single(error: ErrorObject) -> Self {
        let errors = vec![error];
        let status = determine_status(&errors);
        Self { errors, status }
    }

    /// Error objects in order.
    pub fn errors(&self) -> &[ErrorObject] {
        &self.errors
    }

    /// Inferred HTTP status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Error document carrying the inferred status.
    pub fn to_document(&self) -> JsonApiDocument {
        JsonApiDocument::new(TopLevelMembers::Errors {
            errors: self.errors.clone(),
            links: None,
            meta: None,
        })
        .with_status(self.status)
    }

    /// Translate validation issues into error objects.
    ///
    /// Issue params (custom checks) override status, code and detail.
    pub fn from_validation(error: &ValidationError, source: IssueSource) -> Self {
        let default_status = match source {
            IssueSource::Body => 422,
            IssueSource::Query => 400,
        };

        let errors: Vec<ErrorObject> = error
            .issues()
            .iter()
            .map(|issue| {
                let params = issue.params.as_ref();
                ErrorObject {
                    status: Some(
                        params
                            .and_then(|params| params.status)
                            .unwrap_or(default_status)
                            .to_string(),
                    ),
                    code: Some(
                        params.map_or_else(|| issue.code.clone(), |params| params.code.clone()),
                    ),
                    title: Some(issue.message.clone()),
                    detail: params.and_then(|params| params.detail.clone()),
                    source: error_source(source, &issue.path),
                    ..ErrorObject::default()
                }
            })
            .collect();

        match Self::new(errors) {
            Ok(error) => error,
            Err(NoErrorsSupplied) => Self::single(ErrorObject {
                status: Some(default_status.to_string()),
                code: Some("validation_failed".to_owned()),
                title: Some("Validation failed".to_owned()),
                ..ErrorObject::default()
            }),
        }
    }
}

impl From<NoErrorsSupplied> for JsonApiError {
    fn from(_: NoErrorsSupplied) -> Self {
        Self::single(ErrorObject {
            status: Some("500".to_owned()),
            code: Some("internal_server_error".to_owned()),
            title: Some("Internal Server Error".to_owned()),
            ..ErrorObject::default()
        })
    }
}

fn error_source(source: IssueSource, path: &[PathSegment]) -> Option<ErrorSource> {
    match source {
        IssueSource::Body => {
            let pointer: String = path.iter().map(|segment| format!("/{segment}")).collect();
            Some(ErrorSource {
                pointer: Some(if pointer.is_empty() { "/".to_owned() } else { pointer }),
                ..ErrorSource::default()
            })
        }
        IssueSource::Query => {
            let (head, tail) = path.split_first()?;
            let parameter = tail
                .iter()
                .fold(head.to_string(), |acc, segment| format!("{acc}[{segment}]"));
            Some(ErrorSource {
                parameter: Some(parameter),
                ..ErrorSource::default()
            })
        }
    }
}

/// Collapse the statuses of several errors into one response status.
///
/// No status at all → 500; a single distinct status → that status; several
/// distinct statuses → 500 if any is 5xx, 400 otherwise. Status strings
/// without leading digits all count as one distinct value; if that is the
/// only value, the result is 500.
pub fn determine_status(errors: &[ErrorObject]) -> u16 {
    let statuses: BTreeSet<Option<u16>> = errors
        .iter()
        .filter_map(|error| error.status.as_deref())
        .map(parse_status)
        .collect();

    let mut iter = statuses.iter();
    match (iter.next(), iter.next()) {
        (None, _) => {
            warn!("no error contained a status code, falling back to 500");
            500
        }
        (Some(Some(status)), None) => *status,
        (Some(None), None) => {
            warn!("no error contained a numeric status code, falling back to 500");
            500
        }
        _ if statuses.iter().flatten().any(|status| (500..600).contains(status)) => 500,
        _ => 400,
    }
}

/// Parse the leading digits of a status string (`"422"`, `"404 Not Found"`).
fn parse_status(value: &str) -> Option<u16> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::{Issue, IssueParams};

    fn with_status(status: &str) -> ErrorObject {
        ErrorObject {
            status: Some(status.to_owned()),
            ..ErrorObject::default()
        }
    }

    #[test]
    fn status_inference_table() {
        assert_eq!(determine_status(&[ErrorObject::default()]), 500);
        assert_eq!(determine_status(&[with_status("404")]), 404);
        assert_eq!(
            determine_status(&[with_status("422"), with_status("422")]),
            422
        );
        assert_eq!(
            determine_status(&[with_status("422"), with_status("404")]),
            400
        );
        assert_eq!(
            determine_status(&[with_status("422"), with_status("503")]),
            500
        );
        assert_eq!(
            determine_status(&[with_status("409"), ErrorObject::default()]),
            409
        );
    }

    #[test]
    fn unparsable_statuses_count_as_one_distinct_status() {
        assert_eq!(
            determine_status(&[with_status("422"), with_status("abc")]),
            400
        );
        assert_eq!(
            determine_status(&[with_status("422"), with_status("abc"), with_status("")]),
            400
        );
        assert_eq!(
            determine_status(&[with_status("503"), with_status("abc")]),
            500
        );
        assert_eq!(
            determine_status(&[with_status("abc"), with_status("x")]),
            500
        );
        assert_eq!(determine_status(&[with_status("404 Not Found")]), 404);
    }

    #[test]
    fn empty_error_list_is_rejected() {
        assert_eq!(JsonApiError::new(Vec::new()), Err(NoErrorsSupplied));
    }

    #[test]
    fn to_document_uses_inferred_status() {
        let error = JsonApiError::single(with_status("406"));
        let document = error.to_document();
        assert_eq!(document.status(), 406);
        assert_eq!(
            document.body()["errors"],
            serde_json::json!([{ "status": "406" }])
        );
    }

    #[test]
    fn body_issues_become_pointers() {
        let validation = ValidationError::new(vec![
            Issue::invalid_type("string", "number")
                .at("name")
                .at("attributes")
                .at("data"),
            Issue::custom(
                "Type mismatch",
                IssueParams::new("type_mismatch")
                    .with_detail("Type 'pet' does not match 'user'")
                    .with_status(409),
            )
            .at("type")
            .at("data"),
        ]);

        let error = JsonApiError::from_validation(&validation, IssueSource::Body);
        let errors = error.errors();

        assert_eq!(errors[0].status.as_deref(), Some("422"));
        assert_eq!(errors[0].code.as_deref(), Some("invalid_type"));
        assert_eq!(
            errors[0].source.as_ref().unwrap().pointer.as_deref(),
            Some("/data/attributes/name")
        );
        assert_eq!(errors[1].status.as_deref(), Some("409"));
        assert_eq!(errors[1].code.as_deref(), Some("type_mismatch"));
        assert_eq!(
            errors[1].detail.as_deref(),
            Some("Type 'pet' does not match 'user'")
        );
        assert_eq!(error.status(), 400);
    }

    #[test]
    fn query_issues_become_parameters() {
        let validation = ValidationError::new(vec![
            Issue::new("custom", "Unknown resource field")
                .at("post")
                .at("fields"),
            Issue::new("unrecognized_keys", "Unrecognized key(s) in object: \"foo\""),
        ]);

        let error = JsonApiError::from_validation(&validation, IssueSource::Query);
        let errors = error.errors();

        assert_eq!(
            errors[0].source.as_ref().unwrap().parameter.as_deref(),
            Some("fields[post]")
        );
        assert_eq!(errors[1].source, None);
        assert_eq!(error.status(), 400);
    }
}
