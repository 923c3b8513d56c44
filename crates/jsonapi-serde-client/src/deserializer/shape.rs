// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Declared document shapes and the resource schemas compiled from them.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use jsonapi_serde_core::schema::{
    array, literal, nullable, object, shared, string, ObjectSchema, Schema, SchemaRef,
};

/// How many resources a `data` member holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Exactly one resource.
    One,
    /// One resource or `null`.
    OneNullable,
    /// An array of resources (possibly empty).
    Many,
}

impl Cardinality {
    fn wrap(self, schema: impl Schema + 'static) -> SchemaRef {
        match self {
            Self::One => shared(schema),
            Self::OneNullable => shared(nullable(schema)),
            Self::Many => shared(array(schema)),
        }
    }
}

/// Expected shape of a resource: attribute, relationship, link and meta
/// schemas. Members without a schema are dropped during validation.
#[derive(Clone, Default)]
pub struct IncludedShape {
    attributes: Option<SchemaRef>,
    relationships: IndexMap<String, RelationshipShape>,
    links: Option<SchemaRef>,
    meta: Option<SchemaRef>,
}

impl IncludedShape {
    /// Shape that keeps only `id`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for `attributes`.
    pub fn attributes(mut self, schema: impl Schema + 'static) -> Self {
        self.attributes = Some(shared(schema));
        self
    }

    /// Declare a relationship. Declared relationships are required.
    pub fn relationship(mut self, name: impl Into<String>, shape: RelationshipShape) -> Self {
        self.relationships.insert(name.into(), shape);
        self
    }

    /// Schema for resource `links`.
    pub fn links(mut self, schema: impl Schema + 'static) -> Self {
        self.links = Some(shared(schema));
        self
    }

    /// Schema for resource `meta`.
    pub fn meta(mut self, schema: impl Schema + 'static) -> Self {
        self.meta = Some(shared(schema));
        self
    }

    pub(crate) fn declared_relationships(
        &self,
    ) -> impl Iterator<Item = (&String, &RelationshipShape)> {
        self.relationships.iter()
    }

    /// Compile the resource schema for `resource_type`.
    pub(crate) fn resource_schema(&self, resource_type: &str) -> ObjectSchema {
        let mut schema = object()
            .field("id", string())
            .field("type", literal(resource_type));

        if let Some(attributes) = &self.attributes {
            schema = schema.field_ref("attributes", Arc::clone(attributes));
        }

        if !self.relationships.is_empty() {
            let relationships = self
                .relationships
                .iter()
                .fold(object(), |relationships, (name, shape)| {
                    relationships.field(name.clone(), shape.schema())
                });
            schema = schema.field("relationships", relationships);
        }

        if let Some(links) = &self.links {
            schema = schema.field_ref("links", Arc::clone(links));
        }

        if let Some(meta) = &self.meta {
            schema = schema.field_ref("meta", Arc::clone(meta));
        }

        schema
    }
}

impl fmt::Debug for IncludedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncludedShape")
            .field("attributes", &self.attributes.is_some())
            .field("relationships", &self.relationships)
            .field("links", &self.links.is_some())
            .field("meta", &self.meta.is_some())
            .finish()
    }
}

/// Expected shape of one relationship.
#[derive(Debug, Clone)]
pub struct RelationshipShape {
    resource_type: String,
    cardinality: Cardinality,
    included: Option<Box<IncludedShape>>,
}

impl RelationshipShape {
    /// Relationship to resources of `resource_type`, flattened to `{ id }`.
    pub fn new(resource_type: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            resource_type: resource_type.into(),
            cardinality,
            included: None,
        }
    }

    /// Resolve targets from `included` and validate them against `shape`.
    pub fn included(mut self, shape: IncludedShape) -> Self {
        self.included = Some(Box::new(shape));
        self
    }

    /// Related resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Declared cardinality.
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub(crate) fn included_shape(&self) -> Option<&IncludedShape> {
        self.included.as_deref()
    }

    fn schema(&self) -> ObjectSchema {
        let identifier = object()
            .field("id", string())
            .field("type", literal(self.resource_type.as_str()));
        object().field_ref("data", self.cardinality.wrap(identifier))
    }
}

/// Declared shape of a whole document.
#[derive(Clone)]
pub struct DeserializerOptions {
    pub(crate) resource_type: String,
    pub(crate) cardinality: Cardinality,
    pub(crate) shape: IncludedShape,
    pub(crate) document_meta: Option<SchemaRef>,
}

impl DeserializerOptions {
    /// Primary data of `resource_type` with the given cardinality.
    pub fn new(resource_type: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            resource_type: resource_type.into(),
            cardinality,
            shape: IncludedShape::default(),
            document_meta: None,
        }
    }

    /// Schema for primary resource `attributes`.
    pub fn attributes(mut self, schema: impl Schema + 'static) -> Self {
        self.shape = self.shape.attributes(schema);
        self
    }

    /// Declare a primary resource relationship.
    pub fn relationship(mut self, name: impl Into<String>, shape: RelationshipShape) -> Self {
        self.shape = self.shape.relationship(name, shape);
        self
    }

    /// Schema for primary resource `links`.
    pub fn links(mut self, schema: impl Schema + 'static) -> Self {
        self.shape = self.shape.links(schema);
        self
    }

    /// Schema for primary resource `meta`.
    pub fn meta(mut self, schema: impl Schema + 'static) -> Self {
        self.shape = self.shape.meta(schema);
        self
    }

    /// Schema for the top-level `meta` member; when set, `meta` is required.
    pub fn document_meta(mut self, schema: impl Schema + 'static) -> Self {
        self.document_meta = Some(shared(schema));
        self
    }

    pub(crate) fn data_schema(&self) -> SchemaRef {
        self.cardinality
            .wrap(self.shape.resource_schema(&self.resource_type))
    }
}

impl fmt::Debug for DeserializerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeserializerOptions")
            .field("resource_type", &self.resource_type)
            .field("cardinality", &self.cardinality)
            .field("shape", &self.shape)
            .field("document_meta", &self.document_meta.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonapi_serde_core::schema::{integer, PathSegment};
    use serde_json::json;

    #[test]
    fn resource_schema_requires_declared_relationships() {
        let shape = IncludedShape::new()
            .attributes(object().field("name", string()))
            .relationship("owner", RelationshipShape::new("user", Cardinality::One));

        let issues = shape
            .resource_schema("pet")
            .validate(&json!({ "id": "p1", "type": "pet", "attributes": { "name": "Rex" } }))
            .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, vec![PathSegment::from("relationships")]);
    }

    #[test]
    fn relationship_data_follows_cardinality() {
        let many = RelationshipShape::new("tag", Cardinality::Many).schema();
        assert!(many.validate(&json!({ "data": [] })).is_ok());
        assert!(many.validate(&json!({ "data": null })).is_err());

        let nullable = RelationshipShape::new("tag", Cardinality::OneNullable).schema();
        assert!(nullable.validate(&json!({ "data": null })).is_ok());

        let issues = nullable
            .validate(&json!({ "data": { "id": "1", "type": "label" } }))
            .unwrap_err();
        assert_eq!(
            issues[0].path,
            vec![PathSegment::from("data"), PathSegment::from("type")]
        );
    }

    #[test]
    fn undeclared_members_are_stripped() {
        let parsed = IncludedShape::new()
            .meta(object().field("rank", integer()))
            .resource_schema("pet")
            .validate(&json!({
                "id": "p1",
                "type": "pet",
                "attributes": { "name": "Rex" },
                "meta": { "rank": 1 }
            }))
            .unwrap();
        assert_eq!(
            parsed,
            json!({ "id": "p1", "type": "pet", "meta": { "rank": 1 } })
        );
    }
}
