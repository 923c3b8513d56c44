// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in schemas.
//!
//! Every schema here collects all issues it can find instead of stopping at
//! the first one, so a caller can report a complete list in one response.

use std::fmt;

use serde_json::{Map, Value};

use super::{kind_of, shared, validate_at, Issue, PathSegment, Schema, SchemaRef};

/// Accepts any value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnySchema;

/// Schema accepting any value.
pub fn any() -> AnySchema {
    AnySchema
}

impl Schema for AnySchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        Ok(value.clone())
    }
}

/// Accepts strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSchema;

/// Schema accepting any string.
pub fn string() -> StringSchema {
    StringSchema
}

impl Schema for StringSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(vec![Issue::invalid_type("string", kind_of(other))]),
        }
    }

    fn describe(&self) -> String {
        "string".to_owned()
    }
}

/// Accepts numbers, optionally integers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberSchema {
    integer: bool,
}

/// Schema accepting any JSON number.
pub fn number() -> NumberSchema {
    NumberSchema { integer: false }
}

/// Schema accepting integral JSON numbers.
pub fn integer() -> NumberSchema {
    NumberSchema { integer: true }
}

impl Schema for NumberSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match value {
            Value::Number(number) if !self.integer || number.is_i64() || number.is_u64() => {
                Ok(value.clone())
            }
            Value::Number(_) => Err(vec![Issue::invalid_type("int", "number")]),
            other => Err(vec![Issue::invalid_type(&self.describe(), kind_of(other))]),
        }
    }

    fn describe(&self) -> String {
        let name = if self.integer { "int" } else { "number" };
        name.to_owned()
    }
}

/// Accepts booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanSchema;

/// Schema accepting `true`/`false`.
pub fn boolean() -> BooleanSchema {
    BooleanSchema
}

impl Schema for BooleanSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(vec![Issue::invalid_type("boolean", kind_of(other))]),
        }
    }

    fn describe(&self) -> String {
        "boolean".to_owned()
    }
}

/// Accepts exactly one string value.
#[derive(Debug, Clone)]
pub struct LiteralSchema {
    expected: String,
}

/// Schema accepting only the string `expected`.
pub fn literal(expected: impl Into<String>) -> LiteralSchema {
    LiteralSchema {
        expected: expected.into(),
    }
}

impl Schema for LiteralSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match value {
            Value::String(actual) if *actual == self.expected => Ok(value.clone()),
            _ => Err(vec![Issue::new(
                "invalid_value",
                format!("Invalid input: expected \"{}\"", self.expected),
            )]),
        }
    }

    fn describe(&self) -> String {
        format!("\"{}\"", self.expected)
    }
}

/// Accepts `null` or whatever the inner schema accepts.
pub struct NullableSchema {
    inner: SchemaRef,
}

/// Schema accepting `null` in addition to `inner`.
pub fn nullable(inner: impl Schema + 'static) -> NullableSchema {
    NullableSchema {
        inner: shared(inner),
    }
}

impl Schema for NullableSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.inner.validate(value)
    }

    fn describe(&self) -> String {
        format!("{} | null", self.inner.describe())
    }
}

/// Accepts arrays whose elements all satisfy the element schema.
pub struct ArraySchema {
    element: SchemaRef,
    min_len: usize,
}

/// Schema for arrays of `element`.
pub fn array(element: impl Schema + 'static) -> ArraySchema {
    ArraySchema {
        element: shared(element),
        min_len: 0,
    }
}

impl ArraySchema {
    /// Require at least `min_len` elements.
    pub fn min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }
}

impl Schema for ArraySchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        let Value::Array(elements) = value else {
            return Err(vec![Issue::invalid_type("array", kind_of(value))]);
        };

        let mut issues = Vec::new();
        let mut parsed = Vec::with_capacity(elements.len());

        for (index, element) in elements.iter().enumerate() {
            if let Some(value) = validate_at(
                self.element.as_ref(),
                element,
                &[PathSegment::Index(index)],
                &mut issues,
            ) {
                parsed.push(value);
            }
        }

        if elements.len() < self.min_len {
            issues.push(Issue::new(
                "too_small",
                format!(
                    "Too small: expected array to have >={} items",
                    self.min_len
                ),
            ));
        }

        if issues.is_empty() {
            Ok(Value::Array(parsed))
        } else {
            Err(issues)
        }
    }

    fn describe(&self) -> String {
        "array".to_owned()
    }
}

/// Accepts any object ("unknown meta").
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordSchema;

/// Schema accepting any JSON object.
pub fn record() -> RecordSchema {
    RecordSchema
}

impl Schema for RecordSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match value {
            Value::Object(_) => Ok(value.clone()),
            other => Err(vec![Issue::invalid_type("record", kind_of(other))]),
        }
    }

    fn describe(&self) -> String {
        "record".to_owned()
    }
}

/// Policy for object members that have no declared field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Drop unknown members from the output.
    #[default]
    Strip,
    /// Copy unknown members to the output unchanged.
    Passthrough,
    /// Report unknown members as an `unrecognized_keys` issue.
    Strict,
}

struct Field {
    name: String,
    schema: SchemaRef,
    required: bool,
}

/// Object schema with declared fields.
#[derive(Default)]
pub struct ObjectSchema {
    fields: Vec<Field>,
    unknown: UnknownKeys,
}

/// Empty object schema; add fields with [`ObjectSchema::field`].
pub fn object() -> ObjectSchema {
    ObjectSchema::default()
}

impl ObjectSchema {
    /// Declare a required member.
    pub fn field(mut self, name: impl Into<String>, schema: impl Schema + 'static) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema: shared(schema),
            required: true,
        });
        self
    }

    /// Declare a member that may be absent.
    pub fn optional(mut self, name: impl Into<String>, schema: impl Schema + 'static) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema: shared(schema),
            required: false,
        });
        self
    }

    /// Declare a required member from a shared schema.
    pub fn field_ref(mut self, name: impl Into<String>, schema: SchemaRef) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema,
            required: true,
        });
        self
    }

    /// Declare a member that may be absent, from a shared schema.
    pub fn optional_ref(mut self, name: impl Into<String>, schema: SchemaRef) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema,
            required: false,
        });
        self
    }

    /// Set the unknown-member policy.
    pub fn unknown_keys(mut self, policy: UnknownKeys) -> Self {
        self.unknown = policy;
        self
    }

    /// Shorthand for [`UnknownKeys::Strict`].
    pub fn strict(self) -> Self {
        self.unknown_keys(UnknownKeys::Strict)
    }

    /// Shorthand for [`UnknownKeys::Passthrough`].
    pub fn passthrough(self) -> Self {
        self.unknown_keys(UnknownKeys::Passthrough)
    }
}

impl fmt::Debug for ObjectSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSchema")
            .field(
                "fields",
                &self.fields.iter().map(|field| &field.name).collect::<Vec<_>>(),
            )
            .field("unknown", &self.unknown)
            .finish()
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        let Value::Object(members) = value else {
            return Err(vec![Issue::invalid_type("object", kind_of(value))]);
        };

        let mut issues = Vec::new();
        let mut parsed = Map::new();

        for field in &self.fields {
            match members.get(&field.name) {
                Some(member) => {
                    if let Some(value) = validate_at(
                        field.schema.as_ref(),
                        member,
                        &[PathSegment::Key(field.name.clone())],
                        &mut issues,
                    ) {
                        parsed.insert(field.name.clone(), value);
                    }
                }
                None if field.required => issues.push(
                    Issue::invalid_type(&field.schema.describe(), "undefined")
                        .at(field.name.as_str()),
                ),
                None => {}
            }
        }

        if self.unknown != UnknownKeys::Strip {
            let unknown: Vec<&String> = members
                .keys()
                .filter(|key| !self.fields.iter().any(|field| field.name == **key))
                .collect();

            match self.unknown {
                UnknownKeys::Strict if !unknown.is_empty() => {
                    let names = unknown
                        .iter()
                        .map(|key| format!("\"{key}\""))
                        .collect::<Vec<_>>()
                        .join(", ");
                    issues.push(Issue::new(
                        "unrecognized_keys",
                        format!("Unrecognized key(s) in object: {names}"),
                    ));
                }
                UnknownKeys::Passthrough => {
                    for key in unknown {
                        parsed.insert(key.clone(), members[key].clone());
                    }
                }
                _ => {}
            }
        }

        if issues.is_empty() {
            Ok(Value::Object(parsed))
        } else {
            Err(issues)
        }
    }

    fn describe(&self) -> String {
        "object".to_owned()
    }
}

/// Accepts a link: a URL string or a link object.
pub struct LinkSchema {
    object: ObjectSchema,
}

/// Schema for a JSON:API link.
pub fn link() -> LinkSchema {
    LinkSchema {
        object: object()
            .field("href", string())
            .optional("rel", string())
            .optional("describedby", string())
            .optional("title", string())
            .optional("type", string())
            .optional("hreflang", string())
            .optional("meta", record()),
    }
}

impl Schema for LinkSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match value {
            Value::String(_) => Ok(value.clone()),
            Value::Object(_) => self.object.validate(value),
            _ => Err(vec![Issue::new("invalid_union", "Invalid input")]),
        }
    }

    fn describe(&self) -> String {
        "link".to_owned()
    }
}

/// Schema for the top-level `links` object (each member nullish).
pub fn top_level_links() -> ObjectSchema {
    ["self", "related", "describedby", "first", "prev", "next", "last"]
        .into_iter()
        .fold(object(), |schema, name| schema.optional(name, nullable(link())))
}

/// Schema backed by a closure.
pub struct FnSchema<F> {
    validate: F,
}

/// Build a schema from a validation closure.
pub fn from_fn<F>(validate: F) -> FnSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    FnSchema { validate }
}

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (self.validate)(value)
    }
}
