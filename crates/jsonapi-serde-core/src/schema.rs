// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema capability used to validate untrusted JSON values.
//!
//! The engines never depend on a particular validation library. A schema is
//! anything implementing [`Schema`]: it takes a raw [`Value`] and returns the
//! parsed (possibly normalized) value or the complete list of [`Issue`]s.
//! Issue paths are relative to the validated value; callers re-root them.
//!
//! The [`builtin`] constructors cover the shapes JSON:API documents need
//! (objects, arrays, literals, links, open meta objects).

pub mod builtin;
mod issue;

use std::sync::Arc;

use serde_json::Value;

pub use builtin::{
    any, array, boolean, from_fn, integer, link, literal, nullable, number, object, record,
    string, top_level_links, ObjectSchema, UnknownKeys,
};
pub use issue::{Issue, IssueParams, PathSegment, ValidationError};

/// Validates a raw JSON value.
pub trait Schema: Send + Sync {
    /// Validate `value`, returning the parsed value or every issue found.
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>>;

    /// Short description of the expected input, used in "missing" messages.
    fn describe(&self) -> String {
        "value".to_owned()
    }
}

/// Shared, type-erased schema handle.
pub type SchemaRef = Arc<dyn Schema>;

impl<S: Schema + ?Sized> Schema for Arc<S> {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (**self).validate(value)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: Schema + ?Sized> Schema for Box<S> {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (**self).validate(value)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Wrap a concrete schema into a [`SchemaRef`].
pub fn shared(schema: impl Schema + 'static) -> SchemaRef {
    Arc::new(schema)
}

/// Validate `value` and push any issues, re-rooted under `path`, into `issues`.
///
/// Returns the parsed value on success.
pub fn validate_at(
    schema: &dyn Schema,
    value: &Value,
    path: &[PathSegment],
    issues: &mut Vec<Issue>,
) -> Option<Value> {
    match schema.validate(value) {
        Ok(parsed) => Some(parsed),
        Err(found) => {
            issues.extend(found.into_iter().map(|issue| issue.rooted(path)));
            None
        }
    }
}

/// JSON kind name of a value, as used in issue messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
