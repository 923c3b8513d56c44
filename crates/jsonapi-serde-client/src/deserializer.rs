// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema-driven JSON:API document deserializer.
//!
//! A [`Deserializer`] is built once from a declared shape and then applied to
//! any number of untrusted documents. Each call:
//!
//! 1. validates the top-level document (primary data, `included` minimal
//!    shape, top-level `links` and declared `meta`), reporting every issue;
//! 2. indexes `included` by `(type, id)`;
//! 3. flattens primary data, resolving relationships that declared an
//!    included shape and validating each target against the schema for
//!    the relationship path that reached it.
//!
//! The same `(type, id)` reached through the same path twice yields the same
//! `Arc`. Resource schemas for included paths are compiled lazily and cached
//! for the lifetime of the deserializer.

mod included;
mod output;
mod shape;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use jsonapi_serde_core::json_api::TopLevelLinks;
use jsonapi_serde_core::schema::{
    array, object, string, top_level_links, ObjectSchema, PathSegment, Schema, ValidationError,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{instrument, trace};

use included::IncludedMap;
pub use output::{
    DeserializedData, DeserializedDocument, DeserializedRelationship, DeserializedResource,
    LINKS_KEY, META_KEY,
};
pub use shape::{Cardinality, DeserializerOptions, IncludedShape, RelationshipShape};

static NULL: Value = Value::Null;

/// Failure to deserialize a document.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// The document (or an included resource) did not match its schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A relationship expecting included data points at a resource that is
    /// not in `included`.
    #[error(
        "Relationship {field} of resource in path '{path}' is referencing missing resource of type {resource_type} with ID {id}"
    )]
    MissingIncluded {
        /// Relationship name.
        field: String,
        /// Dot-joined relationship path of the referencing resource.
        path: String,
        /// Referenced type.
        resource_type: String,
        /// Referenced id.
        id: String,
    },
    /// The input text is not JSON.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
    /// Flattened data did not fit the requested Rust type.
    #[error("failed to convert deserialized data: {0}")]
    Conversion(#[source] serde_json::Error),
}

/// Validates and flattens documents of one declared shape.
pub struct Deserializer {
    options: DeserializerOptions,
    document_schema: ObjectSchema,
    resource_schemas: RwLock<HashMap<String, Arc<ObjectSchema>>>,
}

impl std::fmt::Debug for Deserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deserializer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Deserializer {
    /// Compile the document schema for `options`.
    pub fn new(options: DeserializerOptions) -> Self {
        let included = array(
            object()
                .field("id", string())
                .field("type", string())
                .passthrough(),
        );

        let mut document_schema = object()
            .field_ref("data", options.data_schema())
            .optional("included", included)
            .optional("links", top_level_links());

        if let Some(meta) = &options.document_meta {
            document_schema = document_schema.field_ref("meta", Arc::clone(meta));
        }

        Self {
            options,
            document_schema,
            resource_schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Parse JSON text, then [`deserialize`](Self::deserialize) it.
    pub fn deserialize_str(&self, input: &str) -> Result<DeserializedDocument, DeserializeError> {
        let value: Value = serde_json::from_str(input)?;
        self.deserialize(&value)
    }

    /// Validate and flatten a document.
    #[instrument(skip_all, fields(resource_type = %self.options.resource_type))]
    pub fn deserialize(&self, input: &Value) -> Result<DeserializedDocument, DeserializeError> {
        let document = self
            .document_schema
            .validate(input)
            .map_err(ValidationError::new)?;

        let mut included = IncludedMap::new(document.get("included"));
        let shape = &self.options.shape;

        let data = match document.get("data").unwrap_or(&NULL) {
            Value::Null => DeserializedData::Null,
            Value::Array(resources) => DeserializedData::Many(
                resources
                    .iter()
                    .map(|resource| {
                        self.flatten_resource(resource, shape, &[], &mut included)
                            .map(Arc::new)
                    })
                    .collect::<Result<_, _>>()?,
            ),
            resource => DeserializedData::One(Arc::new(self.flatten_resource(
                resource,
                shape,
                &[],
                &mut included,
            )?)),
        };

        Ok(DeserializedDocument {
            data,
            links: document_links(&document)?,
            meta: document.get("meta").cloned(),
        })
    }

    fn flatten_resource(
        &self,
        resource: &Value,
        shape: &IncludedShape,
        path: &[String],
        included: &mut IncludedMap<'_>,
    ) -> Result<DeserializedResource, DeserializeError> {
        let mut flattened = DeserializedResource::reference(
            resource
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        );

        if let Some(Value::Object(attributes)) = resource.get("attributes") {
            flattened.attributes.clone_from(attributes);
        }

        let relationships = resource.get("relationships");
        for (field, relationship) in shape.declared_relationships() {
            let data = relationships
                .and_then(|relationships| relationships.get(field))
                .and_then(|relationship| relationship.get("data"))
                .unwrap_or(&NULL);

            let flattened_relationship = match data {
                Value::Null => DeserializedRelationship::Null,
                Value::Array(identifiers) => DeserializedRelationship::Many(
                    identifiers
                        .iter()
                        .map(|identifier| {
                            self.resolve(field, identifier, relationship, path, included)
                        })
                        .collect::<Result<_, _>>()?,
                ),
                identifier => DeserializedRelationship::One(self.resolve(
                    field,
                    identifier,
                    relationship,
                    path,
                    included,
                )?),
            };

            flattened
                .relationships
                .insert(field.clone(), flattened_relationship);
        }

        flattened.meta = resource.get("meta").cloned();
        flattened.links = resource.get("links").cloned();

        Ok(flattened)
    }

    fn resolve(
        &self,
        field: &str,
        identifier: &Value,
        relationship: &RelationshipShape,
        parent_path: &[String],
        included: &mut IncludedMap<'_>,
    ) -> Result<Arc<DeserializedResource>, DeserializeError> {
        let id = identifier
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(included_shape) = relationship.included_shape() else {
            return Ok(Arc::new(DeserializedResource::reference(id)));
        };

        let resource_type = relationship.resource_type();
        let Some(entry) = included.get(resource_type, id) else {
            return Err(DeserializeError::MissingIncluded {
                field: field.to_owned(),
                path: parent_path.join("."),
                resource_type: resource_type.to_owned(),
                id: id.to_owned(),
            });
        };

        let mut field_path = parent_path.to_vec();
        field_path.push(field.to_owned());
        let cache_key = field_path.join(".");

        if let Some(cached) = entry.processed(&cache_key) {
            trace!(resource_type, id, path = %cache_key, "reusing flattened resource");
            return Ok(cached);
        }

        let (index, raw) = (entry.index, entry.raw);
        let schema = self.resource_schema(&cache_key, resource_type, included_shape);
        let parsed = schema.validate(raw).map_err(|issues| {
            ValidationError::new(issues)
                .prefixed(&[PathSegment::from("included"), PathSegment::from(index)])
        })?;

        let resource = Arc::new(self.flatten_resource(
            &parsed,
            included_shape,
            &field_path,
            included,
        )?);
        included.store(resource_type, id, cache_key, Arc::clone(&resource));

        Ok(resource)
    }

    fn resource_schema(
        &self,
        path: &str,
        resource_type: &str,
        shape: &IncludedShape,
    ) -> Arc<ObjectSchema> {
        if let Some(schema) = self
            .resource_schemas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
        {
            return Arc::clone(schema);
        }

        let schema = Arc::new(shape.resource_schema(resource_type));
        let mut schemas = self
            .resource_schemas
            .write()
            .unwrap_or_else(|e| e.into_inner());
        Arc::clone(schemas.entry(path.to_owned()).or_insert(schema))
    }
}

fn document_links(document: &Value) -> Result<Option<TopLevelLinks>, DeserializeError> {
    document
        .get("links")
        .map(|links| serde_json::from_value(links.clone()).map_err(DeserializeError::Conversion))
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use jsonapi_serde_core::schema::{integer, literal};
    use serde_json::json;

    fn pet_owner() -> Deserializer {
        Deserializer::new(
            DeserializerOptions::new("user", Cardinality::One)
                .attributes(object().field("name", string()))
                .relationship(
                    "pet",
                    RelationshipShape::new("pet", Cardinality::OneNullable).included(
                        IncludedShape::new().attributes(object().field("species", string())),
                    ),
                ),
        )
    }

    #[test]
    fn schema_cache_is_filled_per_path() {
        let deserializer = pet_owner();
        let document = json!({
            "data": {
                "id": "u1",
                "type": "user",
                "attributes": { "name": "Alice" },
                "relationships": { "pet": { "data": { "type": "pet", "id": "p1" } } }
            },
            "included": [{ "id": "p1", "type": "pet", "attributes": { "species": "cat" } }]
        });

        deserializer.deserialize(&document).unwrap();
        deserializer.deserialize(&document).unwrap();

        let schemas = deserializer.resource_schemas.read().unwrap();
        assert_eq!(schemas.keys().collect::<Vec<_>>(), ["pet"]);
    }

    #[test]
    fn declared_document_meta_is_required() {
        let deserializer = Deserializer::new(
            DeserializerOptions::new("user", Cardinality::Many)
                .document_meta(object().field("total", integer())),
        );

        let error = deserializer
            .deserialize(&json!({ "data": [] }))
            .unwrap_err();
        let DeserializeError::Validation(error) = error else {
            panic!("expected validation error, got {error:?}");
        };
        assert_eq!(error.issues()[0].path, vec![PathSegment::from("meta")]);

        let document = deserializer
            .deserialize(&json!({ "data": [], "meta": { "total": 0 } }))
            .unwrap();
        assert_eq!(document.meta, Some(json!({ "total": 0 })));
    }

    #[test]
    fn undeclared_document_meta_is_dropped() {
        let deserializer = Deserializer::new(DeserializerOptions::new("user", Cardinality::Many));
        let document = deserializer
            .deserialize(&json!({ "data": [], "meta": { "total": 0 } }))
            .unwrap();
        assert_eq!(document.meta, None);
    }

    #[test]
    fn unconvertible_links_are_a_conversion_error() {
        let links = document_links(&json!({ "links": { "self": "/users" } })).unwrap();
        assert_eq!(
            links.and_then(|links| links.self_link),
            Some("/users".into())
        );

        let error = document_links(&json!({ "links": { "self": 5 } })).unwrap_err();
        assert!(matches!(error, DeserializeError::Conversion(_)));
        assert!(document_links(&json!({})).unwrap().is_none());
    }

    #[test]
    fn invalid_json_text_is_reported() {
        let error = pet_owner().deserialize_str("{ not json").unwrap_err();
        assert!(matches!(error, DeserializeError::Json(_)));
    }

    #[test]
    fn wrong_primary_type_is_a_validation_issue() {
        let error = pet_owner()
            .deserialize(&json!({
                "data": {
                    "id": "u1",
                    "type": "pet",
                    "attributes": { "name": "Alice" },
                    "relationships": { "pet": { "data": null } }
                }
            }))
            .unwrap_err();
        let DeserializeError::Validation(error) = error else {
            panic!("expected validation error, got {error:?}");
        };
        assert_eq!(
            error.issues()[0].path,
            vec![PathSegment::from("data"), PathSegment::from("type")]
        );
        assert_eq!(
            error.issues()[0].message,
            literal("user")
                .validate(&json!("pet"))
                .unwrap_err()[0]
                .message
        );
    }
}
