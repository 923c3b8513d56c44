// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parsing JSON:API request bodies.
//!
//! Every entry point first validates the `Content-Type` header, then decodes
//! the body (if it arrived as text) and validates it against a schema built
//! from the caller's options. Validation failures become a [`JsonApiError`]
//! with one error object per issue and a `source.pointer` into the body.

use std::borrow::Cow;

use indexmap::IndexMap;
use jsonapi_serde_core::json_api::ErrorObject;
use jsonapi_serde_core::schema::{
    array, kind_of, literal, nullable, object, shared, string, Issue, IssueParams,
    ObjectSchema, Schema, SchemaRef, ValidationError,
};
use jsonapi_serde_core::{IssueSource, JsonApiError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::content_type::validate_content_type;

/// A request body as received by the host framework.
#[derive(Debug, Clone, Copy)]
pub enum Body<'a> {
    /// Raw body text, decoded here.
    Text(&'a str),
    /// Body the framework already decoded.
    Json(&'a Value),
}

/// Body plus the `Content-Type` header it was sent with.
#[derive(Debug, Clone, Copy)]
pub struct BodyContext<'a> {
    /// The body.
    pub body: Body<'a>,
    /// `Content-Type` header value, if present.
    pub content_type: Option<&'a str>,
}

impl<'a> BodyContext<'a> {
    /// Context for a raw text body.
    pub fn text(body: &'a str, content_type: Option<&'a str>) -> Self {
        Self {
            body: Body::Text(body),
            content_type,
        }
    }

    /// Context for an already decoded body.
    pub fn json(body: &'a Value, content_type: Option<&'a str>) -> Self {
        Self {
            body: Body::Json(body),
            content_type,
        }
    }
}

/// Accepts a string equal to a fixed resource type.
///
/// A different string is a conflict (409), not a validation failure.
#[derive(Debug, Clone)]
pub struct FixedTypeSchema {
    expected: String,
}

/// Schema for the `type` member of a resource the endpoint expects.
pub fn fixed_type(expected: impl Into<String>) -> FixedTypeSchema {
    FixedTypeSchema {
        expected: expected.into(),
    }
}

impl Schema for FixedTypeSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match value {
            Value::String(actual) if *actual == self.expected => Ok(value.clone()),
            Value::String(actual) => Err(vec![Issue::custom(
                "Type mismatch",
                IssueParams::new("type_mismatch")
                    .with_detail(format!(
                        "Type '{actual}' does not match '{}'",
                        self.expected
                    ))
                    .with_status(409),
            )]),
            other => Err(vec![Issue::invalid_type("string", kind_of(other))]),
        }
    }

    fn describe(&self) -> String {
        "string".to_owned()
    }
}

/// Rejects every value; used for members that must be absent.
struct Absent;

impl Schema for Absent {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        Err(vec![Issue::invalid_type("undefined", kind_of(value))])
    }

    fn describe(&self) -> String {
        "undefined".to_owned()
    }
}

/// Strict `{ type, id }` identifier schema.
pub fn resource_identifier(resource_type: impl Into<String>) -> ObjectSchema {
    resource_identifier_with_id(resource_type, string())
}

/// Strict `{ type, id }` identifier schema with a custom `id` schema.
pub fn resource_identifier_with_id(
    resource_type: impl Into<String>,
    id: impl Schema + 'static,
) -> ObjectSchema {
    object()
        .field("type", fixed_type(resource_type))
        .field("id", id)
        .strict()
}

/// Strict `{ type, lid }` identifier schema for resources created in the same request.
pub fn client_resource_identifier(resource_type: impl Into<String>) -> ObjectSchema {
    object()
        .field("type", fixed_type(resource_type))
        .field("lid", string())
        .strict()
}

/// Strict `{ data }` relationship schema around a linkage schema.
pub fn relationship(data: impl Schema + 'static) -> ObjectSchema {
    object().field("data", data).strict()
}

/// Schemas for one type of resource sent in `included`.
#[derive(Default, Clone)]
pub struct IncludedTypeSchemas {
    attributes: Option<SchemaRef>,
    relationships: Option<SchemaRef>,
}

impl IncludedTypeSchemas {
    /// No attributes or relationships allowed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require and validate `attributes`.
    pub fn attributes(mut self, schema: impl Schema + 'static) -> Self {
        self.attributes = Some(shared(schema));
        self
    }

    /// Require and validate `relationships`.
    pub fn relationships(mut self, schema: impl Schema + 'static) -> Self {
        self.relationships = Some(shared(schema));
        self
    }

    fn schema(&self, resource_type: &str) -> ObjectSchema {
        let schema = object()
            .field("lid", string())
            .field("type", literal(resource_type));
        let schema = with_member(schema, "attributes", self.attributes.as_ref());
        with_member(schema, "relationships", self.relationships.as_ref())
    }
}

fn with_member(schema: ObjectSchema, name: &str, declared: Option<&SchemaRef>) -> ObjectSchema {
    match declared {
        Some(declared) => schema.field_ref(name, SchemaRef::clone(declared)),
        None => schema.optional(name, Absent),
    }
}

/// Validates `included` entries against the schema of their `type`.
struct IncludedEntrySchema {
    types: IndexMap<String, ObjectSchema>,
}

impl Schema for IncludedEntrySchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        let Value::Object(members) = value else {
            return Err(vec![Issue::invalid_type("object", kind_of(value))]);
        };

        let schema = members
            .get("type")
            .and_then(Value::as_str)
            .and_then(|resource_type| self.types.get(resource_type));

        match schema {
            Some(schema) => schema.validate(value),
            None => Err(vec![Issue::new(
                "invalid_union",
                "Invalid input: no matching discriminator",
            )
            .at("type")]),
        }
    }

    fn describe(&self) -> String {
        "object".to_owned()
    }
}

/// What a resource endpoint accepts in its request body.
///
/// Members without a schema must be absent from the request; declared
/// members are required.
#[derive(Clone)]
pub struct ResourceRequestOptions {
    resource_type: String,
    id: Option<SchemaRef>,
    attributes: Option<SchemaRef>,
    relationships: Option<SchemaRef>,
    included_types: Option<IndexMap<String, IncludedTypeSchemas>>,
}

impl std::fmt::Debug for ResourceRequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRequestOptions")
            .field("resource_type", &self.resource_type)
            .field("id", &self.id.is_some())
            .field("attributes", &self.attributes.is_some())
            .field("relationships", &self.relationships.is_some())
            .field(
                "included_types",
                &self
                    .included_types
                    .as_ref()
                    .map(|types| types.keys().collect::<Vec<_>>()),
            )
            .finish()
    }
}

impl ResourceRequestOptions {
    /// Expect primary data of `resource_type`.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            attributes: None,
            relationships: None,
            included_types: None,
        }
    }

    /// Require a client-supplied `id` validated by `schema`.
    pub fn id(mut self, schema: impl Schema + 'static) -> Self {
        self.id = Some(shared(schema));
        self
    }

    /// Require `attributes` validated by `schema`.
    pub fn attributes(mut self, schema: impl Schema + 'static) -> Self {
        self.attributes = Some(shared(schema));
        self
    }

    /// Require `relationships` validated by `schema`.
    pub fn relationships(mut self, schema: impl Schema + 'static) -> Self {
        self.relationships = Some(shared(schema));
        self
    }

    /// Accept `included` resources of `resource_type`.
    pub fn included_type(
        mut self,
        resource_type: impl Into<String>,
        schemas: IncludedTypeSchemas,
    ) -> Self {
        self.included_types
            .get_or_insert_with(IndexMap::new)
            .insert(resource_type.into(), schemas);
        self
    }

    fn document_schema(&self) -> ObjectSchema {
        let mut data = object()
            .field("type", fixed_type(self.resource_type.as_str()));
        data = with_member(data, "id", self.id.as_ref());
        data = with_member(data, "attributes", self.attributes.as_ref());
        data = with_member(data, "relationships", self.relationships.as_ref());

        let document = object().field("data", data.strict()).strict();
        match &self.included_types {
            Some(types) => document.optional(
                "included",
                array(IncludedEntrySchema {
                    types: types
                        .iter()
                        .map(|(resource_type, schemas)| {
                            (resource_type.clone(), schemas.schema(resource_type))
                        })
                        .collect(),
                }),
            ),
            None => document.optional("included", Absent),
        }
    }
}

/// A resource sent in `included`, addressed by its local id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedResource {
    /// Local id.
    pub lid: String,
    /// Resource type.
    pub r#type: String,
    /// Validated attributes, when declared.
    pub attributes: Option<Value>,
    /// Validated relationships, when declared.
    pub relationships: Option<Value>,
}

/// Included resources of one type, keyed by `lid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedResourceMap {
    resource_type: String,
    resources: IndexMap<String, IncludedResource>,
}

impl IncludedResourceMap {
    fn new(resource_type: String) -> Self {
        Self {
            resource_type,
            resources: IndexMap::new(),
        }
    }

    /// The resource with `lid`, if it was included.
    pub fn safe_get(&self, lid: &str) -> Option<&IncludedResource> {
        self.resources.get(lid)
    }

    /// The resource with `lid`, or a 422 error when it was not included.
    pub fn get(&self, lid: &str) -> Result<&IncludedResource, JsonApiError> {
        self.resources.get(lid).ok_or_else(|| {
            JsonApiError::single(ErrorObject {
                status: Some("422".to_owned()),
                code: Some("missing_included_resource".to_owned()),
                title: Some("Missing included resource".to_owned()),
                detail: Some(format!(
                    "A referenced resource of type '{}' and lid '{lid}' is missing in the document",
                    self.resource_type
                )),
                ..ErrorObject::default()
            })
        })
    }

    /// Number of included resources of this type.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resource of this type was included.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in document order.
    pub fn iter(&self) -> impl Iterator<Item = &IncludedResource> {
        self.resources.values()
    }
}

/// Parsed primary resource of a create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// Client-supplied id, when an id schema was declared.
    pub id: Option<String>,
    /// The expected resource type.
    pub r#type: String,
    /// Validated attributes, when declared.
    pub attributes: Option<Value>,
    /// Validated relationships, when declared.
    pub relationships: Option<Value>,
    /// Included resources per declared type, when any type was declared.
    pub included_types: Option<IndexMap<String, IncludedResourceMap>>,
}

impl ResourceRequest {
    /// Convert the validated attributes into `T`.
    pub fn attributes_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.attributes.as_ref().unwrap_or(&Value::Null))
    }

    /// Convert the validated relationships into `T`.
    pub fn relationships_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.relationships.as_ref().unwrap_or(&Value::Null))
    }

    /// Included resources of `resource_type`.
    pub fn included(&self, resource_type: &str) -> Option<&IncludedResourceMap> {
        self.included_types.as_ref()?.get(resource_type)
    }
}

/// Parse a create/update request for a single resource.
#[instrument(skip_all, fields(resource_type = %options.resource_type))]
pub fn parse_resource_request(
    context: &BodyContext<'_>,
    options: &ResourceRequestOptions,
) -> Result<ResourceRequest, JsonApiError> {
    let body = parse_body(context)?;
    let document = validate(&options.document_schema(), &body)?;

    let data = document.get("data");
    let member = |name: &str| data.and_then(|data| data.get(name)).cloned();

    let included_types = options.included_types.as_ref().map(|types| {
        let mut maps: IndexMap<String, IncludedResourceMap> = types
            .keys()
            .map(|resource_type| {
                (
                    resource_type.clone(),
                    IncludedResourceMap::new(resource_type.clone()),
                )
            })
            .collect();

        let included = document
            .get("included")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for entry in included {
            let resource_type = entry.get("type").and_then(Value::as_str).unwrap_or_default();
            let lid = entry.get("lid").and_then(Value::as_str).unwrap_or_default();
            if let Some(map) = maps.get_mut(resource_type) {
                map.resources.insert(
                    lid.to_owned(),
                    IncludedResource {
                        lid: lid.to_owned(),
                        r#type: resource_type.to_owned(),
                        attributes: entry.get("attributes").cloned(),
                        relationships: entry.get("relationships").cloned(),
                    },
                );
            }
        }

        debug!(included = included.len(), "collected included resources");
        maps
    });

    Ok(ResourceRequest {
        id: member("id").and_then(|id| id.as_str().map(ToOwned::to_owned)),
        r#type: options.resource_type.clone(),
        attributes: member("attributes"),
        relationships: member("relationships"),
        included_types,
    })
}

fn linkage(resource_type: &str) -> ObjectSchema {
    object()
        .field("type", literal(resource_type))
        .field("id", string())
}

/// Parse a to-one relationship update and return the referenced id.
pub fn parse_relationship_request(
    context: &BodyContext<'_>,
    resource_type: &str,
) -> Result<String, JsonApiError> {
    let body = parse_body(context)?;
    let document = validate(&object().field("data", linkage(resource_type)), &body)?;

    Ok(document["data"]["id"]
        .as_str()
        .unwrap_or_default()
        .to_owned())
}

/// Parse a to-one relationship update that may clear the relationship with `data: null`.
pub fn parse_nullable_relationship_request(
    context: &BodyContext<'_>,
    resource_type: &str,
) -> Result<Option<String>, JsonApiError> {
    let body = parse_body(context)?;
    let document = validate(
        &object().field("data", nullable(linkage(resource_type))),
        &body,
    )?;

    Ok(document["data"]["id"].as_str().map(ToOwned::to_owned))
}

/// Parse a to-many relationship update and return the referenced ids in order.
pub fn parse_relationships_request(
    context: &BodyContext<'_>,
    resource_type: &str,
) -> Result<Vec<String>, JsonApiError> {
    let body = parse_body(context)?;
    let document = validate(
        &object().field("data", array(linkage(resource_type))),
        &body,
    )?;

    Ok(document["data"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|identifier| identifier["id"].as_str().map(ToOwned::to_owned))
        .collect())
}

fn validate(schema: &dyn Schema, body: &Value) -> Result<Value, JsonApiError> {
    schema.validate(body).map_err(|issues| {
        debug!(issues = issues.len(), "request body failed validation");
        JsonApiError::from_validation(&ValidationError::new(issues), IssueSource::Body)
    })
}

/// Validate the content type and decode the body.
fn parse_body<'a>(context: &BodyContext<'a>) -> Result<Cow<'a, Value>, JsonApiError> {
    validate_content_type(context.content_type)?;

    match context.body {
        Body::Json(value) => Ok(Cow::Borrowed(value)),
        Body::Text(text) => serde_json::from_str(text).map(Cow::Owned).map_err(|error| {
            JsonApiError::single(ErrorObject {
                status: Some("400".to_owned()),
                code: Some("invalid_json_body".to_owned()),
                title: Some("Invalid JSON body".to_owned()),
                detail: Some(error.to_string()),
                ..ErrorObject::default()
            })
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonapi_serde_core::schema::PathSegment;
    use serde_json::json;

    #[test]
    fn fixed_type_conflict_is_409() {
        let issues = fixed_type("user").validate(&json!("pet")).unwrap_err();
        let params = issues[0].params.as_ref().unwrap();
        assert_eq!(params.code, "type_mismatch");
        assert_eq!(params.status, Some(409));
        assert_eq!(
            params.detail.as_deref(),
            Some("Type 'pet' does not match 'user'")
        );

        let issues = fixed_type("user").validate(&json!(1)).unwrap_err();
        assert_eq!(issues[0].code, "invalid_type");
    }

    #[test]
    fn identifier_schemas_are_strict() {
        assert!(resource_identifier("user")
            .validate(&json!({ "type": "user", "id": "1" }))
            .is_ok());
        let issues = resource_identifier("user")
            .validate(&json!({ "type": "user", "id": "1", "lid": "x" }))
            .unwrap_err();
        assert_eq!(issues[0].code, "unrecognized_keys");

        assert!(client_resource_identifier("user")
            .validate(&json!({ "type": "user", "lid": "tmp-1" }))
            .is_ok());
        assert!(relationship(nullable(resource_identifier("user")))
            .validate(&json!({ "data": null }))
            .is_ok());
    }

    #[test]
    fn included_entries_dispatch_on_type() {
        let schema = IncludedEntrySchema {
            types: [("tag".to_owned(), IncludedTypeSchemas::new().schema("tag"))]
                .into_iter()
                .collect(),
        };

        assert!(schema
            .validate(&json!({ "type": "tag", "lid": "t1" }))
            .is_ok());
        let issues = schema
            .validate(&json!({ "type": "pet", "lid": "p1" }))
            .unwrap_err();
        assert_eq!(issues[0].path, vec![PathSegment::from("type")]);
        let issues = schema
            .validate(&json!({ "type": "tag", "lid": "t1", "attributes": {} }))
            .unwrap_err();
        assert_eq!(issues[0].path, vec![PathSegment::from("attributes")]);
    }
}
