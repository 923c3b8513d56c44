// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parsing JSON:API query parameters (`include`, `sort`, `fields`, `filter`, `page`).
//!
//! Only configured parameters are accepted. Search params are first decoded
//! into a nested object (`fields[post]=title` becomes
//! `{ "fields": { "post": "title" } }`), then each parameter is checked
//! against its options. Every problem is reported, each as its own error
//! object with `source.parameter` set.

use indexmap::IndexMap;
use jsonapi_serde_core::schema::{
    kind_of, shared, validate_at, Issue, IssueParams, PathSegment, Schema, SchemaRef,
    ValidationError,
};
use jsonapi_serde_core::{IssueSource, JsonApiError, SerializeOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::form_urlencoded;

const KNOWN_PARAMETERS: [&str; 5] = ["include", "sort", "fields", "filter", "page"];

/// Direction of a sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending (`field`).
    Asc,
    /// Descending (`-field`).
    Desc,
}

/// One requested sort field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Field name.
    pub field: String,
    /// Sort direction.
    pub order: SortOrder,
}

impl SortField {
    /// Ascending sort on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending sort on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    fn parse(raw: &str) -> Self {
        raw.strip_prefix('-')
            .map_or_else(|| Self::asc(raw), Self::desc)
    }
}

/// Options for `include`.
///
/// Allowing `comments.author` also allows `comments`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeOptions {
    /// Allowed include paths.
    pub allowed: Vec<String>,
    /// Paths used when the query has no `include`.
    #[serde(default)]
    pub default: Vec<String>,
}

impl IncludeOptions {
    /// Allow `paths`, without defaults.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: paths.into_iter().map(Into::into).collect(),
            default: Vec::new(),
        }
    }

    /// Paths used when the query has no `include`.
    pub fn with_default<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default = paths.into_iter().map(Into::into).collect();
        self
    }

    fn allows(&self, path: &str) -> bool {
        self.allowed.iter().any(|allowed| {
            allowed == path
                || allowed
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Options for `sort`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    /// Fields that may be sorted by.
    pub allowed: Vec<String>,
    /// Sort used when the query has no `sort`.
    #[serde(default)]
    pub default: Vec<SortField>,
    /// Whether more than one comma-separated field is accepted.
    #[serde(default)]
    pub multiple: bool,
}

impl SortOptions {
    /// Allow sorting by a single field out of `fields`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: fields.into_iter().map(Into::into).collect(),
            default: Vec::new(),
            multiple: false,
        }
    }

    /// Sort used when the query has no `sort`.
    pub fn with_default(mut self, sort: Vec<SortField>) -> Self {
        self.default = sort;
        self
    }

    /// Accept several sort fields.
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }
}

/// Options for sparse fieldsets (`fields[type]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsOptions {
    /// Allowed field names per resource type.
    pub allowed: IndexMap<String, Vec<String>>,
    /// Fieldsets applied to types the query does not mention.
    #[serde(default)]
    pub default: IndexMap<String, Vec<String>>,
}

impl FieldsOptions {
    /// No types allowed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `fields` for `resource_type`.
    pub fn allow<I, S>(mut self, resource_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.insert(
            resource_type.into(),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Default fieldset for `resource_type`.
    pub fn with_default<I, S>(mut self, resource_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default.insert(
            resource_type.into(),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }
}

/// Which query parameters an endpoint accepts. Unset parameters are rejected.
#[derive(Clone, Default)]
pub struct QueryParserOptions {
    include: Option<IncludeOptions>,
    sort: Option<SortOptions>,
    fields: Option<FieldsOptions>,
    filter: Option<SchemaRef>,
    page: Option<SchemaRef>,
}

impl std::fmt::Debug for QueryParserOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParserOptions")
            .field("include", &self.include)
            .field("sort", &self.sort)
            .field("fields", &self.fields)
            .field("filter", &self.filter.is_some())
            .field("page", &self.page.is_some())
            .finish()
    }
}

impl QueryParserOptions {
    /// Accept nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `include`.
    pub fn with_include(mut self, options: IncludeOptions) -> Self {
        self.include = Some(options);
        self
    }

    /// Accept `sort`.
    pub fn with_sort(mut self, options: SortOptions) -> Self {
        self.sort = Some(options);
        self
    }

    /// Accept `fields[...]`.
    pub fn with_fields(mut self, options: FieldsOptions) -> Self {
        self.fields = Some(options);
        self
    }

    /// Accept `filter`, validated by `schema`.
    pub fn with_filter(mut self, schema: impl Schema + 'static) -> Self {
        self.filter = Some(shared(schema));
        self
    }

    /// Accept `page`, validated by `schema`.
    pub fn with_page(mut self, schema: impl Schema + 'static) -> Self {
        self.page = Some(shared(schema));
        self
    }
}

/// Result of a successful parse.
///
/// A parameter the parser was not configured for is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Include paths (possibly the defaults).
    pub include: Option<Vec<String>>,
    /// Sort fields in request order.
    pub sort: Option<Vec<SortField>>,
    /// Sparse fieldsets per type, defaults merged under the request.
    pub fields: Option<IndexMap<String, Vec<String>>>,
    /// Validated `filter`, when present.
    pub filter: Option<Value>,
    /// Validated `page`, when present.
    pub page: Option<Value>,
}

impl ParsedQuery {
    /// Forward `include` and `fields` to serializer options.
    pub fn apply_to(&self, mut options: SerializeOptions) -> SerializeOptions {
        if let Some(include) = &self.include {
            options = options.with_include(include.iter().cloned());
        }
        for (resource_type, fields) in self.fields.iter().flatten() {
            options = options.with_fields(resource_type.as_str(), fields.iter().cloned());
        }
        options
    }
}

/// Validates query strings against a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    options: QueryParserOptions,
}

impl QueryParser {
    /// Parser accepting what `options` allow.
    pub fn new(options: QueryParserOptions) -> Self {
        Self { options }
    }

    /// Parse a raw query string; a leading `?` is ignored.
    pub fn parse(&self, query: &str) -> Result<ParsedQuery, JsonApiError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        self.parse_params(&decode_search_params(form_urlencoded::parse(
            query.as_bytes(),
        )))
    }

    /// Parse already split `(key, value)` pairs.
    pub fn parse_pairs<I, K, V>(&self, pairs: I) -> Result<ParsedQuery, JsonApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.parse_params(&decode_search_params(pairs))
    }

    #[instrument(skip_all, fields(parameters = params.len()))]
    fn parse_params(&self, params: &Map<String, Value>) -> Result<ParsedQuery, JsonApiError> {
        let mut issues = Vec::new();
        let options = &self.options;

        let parsed = ParsedQuery {
            include: options
                .include
                .as_ref()
                .map(|include| parse_include(include, params.get("include"), &mut issues)),
            sort: options
                .sort
                .as_ref()
                .map(|sort| parse_sort(sort, params.get("sort"), &mut issues)),
            fields: options
                .fields
                .as_ref()
                .map(|fields| parse_fields(fields, params.get("fields"), &mut issues)),
            filter: parse_schema(
                "filter",
                options.filter.as_ref(),
                params.get("filter"),
                &mut issues,
            ),
            page: parse_schema(
                "page",
                options.page.as_ref(),
                params.get("page"),
                &mut issues,
            ),
        };

        for name in KNOWN_PARAMETERS {
            let configured = match name {
                "include" => options.include.is_some(),
                "sort" => options.sort.is_some(),
                "fields" => options.fields.is_some(),
                "filter" => options.filter.is_some(),
                _ => options.page.is_some(),
            };
            if !configured && params.contains_key(name) {
                issues.push(
                    Issue::new(
                        "invalid_type",
                        format!("'{name}' parameter is not supported"),
                    )
                    .at(name),
                );
            }
        }

        let unknown: Vec<&str> = params
            .keys()
            .map(String::as_str)
            .filter(|key| !KNOWN_PARAMETERS.contains(key))
            .collect();
        if let Some(issue) = unrecognized_keys(&unknown) {
            issues.push(issue);
        }

        if issues.is_empty() {
            Ok(parsed)
        } else {
            debug!(issues = issues.len(), "query failed validation");
            Err(JsonApiError::from_validation(
                &ValidationError::new(issues),
                IssueSource::Query,
            ))
        }
    }
}

/// Split a comma-separated list; the empty string is the empty list.
fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        Vec::new()
    } else {
        value.split(',').map(ToOwned::to_owned).collect()
    }
}

/// A string parameter, or an `invalid_type` issue at `path`.
fn string_param<'v>(
    value: &'v Value,
    path: &[PathSegment],
    issues: &mut Vec<Issue>,
) -> Option<&'v str> {
    let text = value.as_str();
    if text.is_none() {
        issues.push(Issue::invalid_type("string", kind_of(value)).rooted(path));
    }
    text
}

fn parse_include(
    options: &IncludeOptions,
    value: Option<&Value>,
    issues: &mut Vec<Issue>,
) -> Vec<String> {
    let Some(value) = value else {
        return options.default.clone();
    };
    let Some(text) = string_param(value, &["include".into()], issues) else {
        return Vec::new();
    };

    let paths = split_list(text);
    for path in paths.iter().filter(|path| !options.allows(path)) {
        issues.push(
            Issue::custom(
                "Invalid include path",
                IssueParams::new("invalid_include_path")
                    .with_detail(format!("Path '{path}' cannot be included")),
            )
            .at("include"),
        );
    }
    paths
}

fn parse_sort(
    options: &SortOptions,
    value: Option<&Value>,
    issues: &mut Vec<Issue>,
) -> Vec<SortField> {
    let Some(value) = value else {
        return options.default.clone();
    };
    let Some(text) = string_param(value, &["sort".into()], issues) else {
        return Vec::new();
    };

    let sort: Vec<SortField> = split_list(text)
        .iter()
        .map(|raw| SortField::parse(raw))
        .collect();

    if sort.len() > 1 && !options.multiple {
        issues.push(
            Issue::custom(
                "Too many sort fields",
                IssueParams::new("too_many_sort_fields")
                    .with_detail("Only a single sort field is allowed"),
            )
            .at("sort"),
        );
        return sort;
    }

    for field in sort
        .iter()
        .filter(|field| !options.allowed.contains(&field.field))
    {
        issues.push(
            Issue::custom(
                "Invalid sort field",
                IssueParams::new("invalid_sort_field")
                    .with_detail(format!("Field '{}' cannot be sorted by", field.field)),
            )
            .at("sort"),
        );
    }
    sort
}

fn parse_fields(
    options: &FieldsOptions,
    value: Option<&Value>,
    issues: &mut Vec<Issue>,
) -> IndexMap<String, Vec<String>> {
    let mut fieldsets = options.default.clone();
    let Some(value) = value else {
        return fieldsets;
    };
    let Value::Object(requested) = value else {
        issues.push(Issue::invalid_type("object", kind_of(value)).at("fields"));
        return fieldsets;
    };

    let mut unknown = Vec::new();
    for (resource_type, value) in requested {
        let Some(allowed) = options.allowed.get(resource_type) else {
            unknown.push(resource_type.as_str());
            continue;
        };
        let path: [PathSegment; 2] = ["fields".into(), resource_type.as_str().into()];
        let Some(text) = string_param(value, &path, issues) else {
            continue;
        };

        let fields = split_list(text);
        for field in fields.iter().filter(|field| !allowed.contains(field)) {
            issues.push(
                Issue::custom(
                    "Unknown resource field",
                    IssueParams::new("unknown_resource_field").with_detail(format!(
                        "Resource '{resource_type}' has no field with name '{field}'"
                    )),
                )
                .rooted(&path),
            );
        }
        fieldsets.insert(resource_type.clone(), fields);
    }

    if let Some(issue) = unrecognized_keys(&unknown) {
        issues.push(issue.at("fields"));
    }
    fieldsets
}

fn parse_schema(
    name: &str,
    schema: Option<&SchemaRef>,
    value: Option<&Value>,
    issues: &mut Vec<Issue>,
) -> Option<Value> {
    validate_at(schema?.as_ref(), value?, &[name.into()], issues)
}

fn unrecognized_keys(keys: &[&str]) -> Option<Issue> {
    if keys.is_empty() {
        return None;
    }
    let names = keys
        .iter()
        .map(|key| format!("\"{key}\""))
        .collect::<Vec<_>>()
        .join(", ");
    Some(Issue::new(
        "unrecognized_keys",
        format!("Unrecognized key(s) in object: {names}"),
    ))
}

/// Decode `key=value` pairs into nested objects following bracket notation.
///
/// `a[b][c]=v` becomes `{ "a": { "b": { "c": "v" } } }`. A key whose
/// brackets do not close is used verbatim. Later pairs replace earlier ones.
pub fn decode_search_params<I, K, V>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut root = Map::new();

    for (key, value) in pairs {
        let segments = key_segments(key.as_ref());
        insert_nested(&mut root, &segments, Value::String(value.into()));
    }

    root
}

fn key_segments(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[').filter(|open| *open > 0) else {
        return vec![key];
    };

    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return vec![key];
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }

    if rest.is_empty() {
        segments
    } else {
        vec![key]
    }
}

fn insert_nested(target: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };

    if tail.is_empty() {
        target.insert((*head).to_owned(), value);
        return;
    }

    let slot = target
        .entry((*head).to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(nested) = slot {
        insert_nested(nested, tail, value);
    }
}
