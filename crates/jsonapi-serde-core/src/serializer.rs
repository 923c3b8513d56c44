// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compound-document serializer.
//!
//! A [`DocumentSerializer`] is a registry of per-type [`EntitySerializer`]s.
//! Serializing walks the entity graph: each entity becomes a resource object,
//! and relationship identifiers that carry an attached entity are handed to
//! the include collection, which serializes them into `included` when their
//! relationship path was requested.
//!
//! # Invariants
//!
//! - `included` never holds two resources with the same `(type, id)`; the
//!   first one added wins. The same check stops cycles (A → B → A).
//! - `included` is absent unless at least one include path was requested.
//! - A sparse fieldset that leaves `attributes` or `relationships` empty
//!   removes the member entirely.
//!
//! Recursion depth follows the include paths through the entity graph; no
//! explicit depth limit is enforced.

mod include;

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::document::{JsonApiDocument, MediaTypeOptions};
use crate::json_api::{Attributes, Links, Meta, PrimaryData, TopLevelLinks, TopLevelMembers};
use include::IncludeCollection;

/// Serializer misconfiguration. These indicate a programming error in the
/// registry setup, not bad input data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    /// No serializer is registered for the resource type.
    #[error("type '{0}' is not registered in serializer")]
    UnregisteredType(String),
    /// The entity passed for a type is not the registered entity type.
    #[error("entity for type '{resource_type}' is not a `{expected}`")]
    EntityTypeMismatch {
        /// Resource type name.
        resource_type: String,
        /// Rust type the registered serializer expects.
        expected: &'static str,
    },
    /// The context supplied for a type is not the registered context type.
    #[error("context for type '{resource_type}' is not a `{expected}`")]
    ContextTypeMismatch {
        /// Resource type name.
        resource_type: String,
        /// Rust type the registered serializer expects.
        expected: &'static str,
    },
}

/// Converts one entity type into a partial resource object.
pub trait EntitySerializer: Send + Sync + 'static {
    /// Entity type this serializer accepts.
    type Entity: Any;
    /// Per-call context type; use `()` when unused.
    type Context: Any;

    /// Resource id of `entity`.
    fn id(&self, entity: &Self::Entity) -> String;

    /// Attributes, relationships, meta and links of `entity`.
    ///
    /// Related entities may be attached to relationship identifiers by
    /// reference; they become candidates for `included`.
    fn serialize<'a>(
        &self,
        entity: &'a Self::Entity,
        context: Option<&Self::Context>,
    ) -> SerializedEntity<'a>;
}

/// A relationship identifier that may carry the related entity.
#[derive(Clone)]
pub struct IncludableIdentifier<'a> {
    /// Related resource type (also selects the serializer for inclusion).
    pub r#type: String,
    /// Related resource id.
    pub id: String,
    /// Identifier meta.
    pub meta: Option<Meta>,
    /// Related entity, serialized into `included` when its path is requested.
    pub entity: Option<&'a dyn Any>,
}

impl<'a> IncludableIdentifier<'a> {
    /// Identifier without an attached entity.
    pub fn new(r#type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            id: id.into(),
            meta: None,
            entity: None,
        }
    }

    /// Attach the related entity.
    pub fn with_entity<T: Any>(mut self, entity: &'a T) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Attach identifier meta.
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl fmt::Debug for IncludableIdentifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncludableIdentifier")
            .field("type", &self.r#type)
            .field("id", &self.id)
            .field("meta", &self.meta)
            .field("entity", &self.entity.is_some())
            .finish()
    }
}

/// Linkage of an includable relationship.
#[derive(Debug, Clone)]
pub enum IncludableData<'a> {
    /// Empty to-one linkage.
    Null,
    /// To-one linkage.
    One(IncludableIdentifier<'a>),
    /// To-many linkage.
    Many(Vec<IncludableIdentifier<'a>>),
}

/// A relationship whose identifiers may carry entities.
#[derive(Debug, Clone, Default)]
pub struct IncludableRelationship<'a> {
    /// Linkage; `None` leaves `data` out of the relationship object.
    pub data: Option<IncludableData<'a>>,
    /// Relationship links.
    pub links: Option<Links>,
    /// Relationship meta.
    pub meta: Option<Meta>,
}

impl<'a> IncludableRelationship<'a> {
    /// To-one relationship.
    pub fn one(identifier: IncludableIdentifier<'a>) -> Self {
        Self {
            data: Some(IncludableData::One(identifier)),
            ..Self::default()
        }
    }

    /// To-one relationship that may be empty.
    pub fn optional(identifier: Option<IncludableIdentifier<'a>>) -> Self {
        identifier.map_or_else(Self::null, Self::one)
    }

    /// To-many relationship.
    pub fn many(identifiers: impl IntoIterator<Item = IncludableIdentifier<'a>>) -> Self {
        Self {
            data: Some(IncludableData::Many(identifiers.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Empty to-one relationship (`data: null`).
    pub fn null() -> Self {
        Self {
            data: Some(IncludableData::Null),
            ..Self::default()
        }
    }

    /// Attach relationship links.
    pub fn with_links(mut self, links: Links) -> Self {
        self.links = Some(links);
        self
    }

    /// Attach relationship meta.
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Output of an [`EntitySerializer`]: a partial resource object.
#[derive(Debug, Clone, Default)]
pub struct SerializedEntity<'a> {
    /// Attributes.
    pub attributes: Option<Attributes>,
    /// Relationships in declaration order.
    pub relationships: Option<Vec<(String, IncludableRelationship<'a>)>>,
    /// Resource meta.
    pub meta: Option<Meta>,
    /// Resource links.
    pub links: Option<Links>,
}

impl<'a> SerializedEntity<'a> {
    /// Empty partial resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one attribute.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .get_or_insert_with(Attributes::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replace all attributes.
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Add one relationship.
    pub fn relationship(
        mut self,
        name: impl Into<String>,
        relationship: IncludableRelationship<'a>,
    ) -> Self {
        self.relationships
            .get_or_insert_with(Vec::new)
            .push((name.into(), relationship));
        self
    }

    /// Set resource meta.
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Set resource links.
    pub fn links(mut self, links: Links) -> Self {
        self.links = Some(links);
        self
    }
}

/// Options for a single serialize call.
#[derive(Default)]
pub struct SerializeOptions {
    context: HashMap<String, Box<dyn Any + Send + Sync>>,
    /// HTTP status of the document (default 200).
    pub status: Option<u16>,
    /// Dot-separated relationship paths to side-load.
    pub include: Option<Vec<String>>,
    /// Per-type allowlist of attribute/relationship names.
    pub fields: Option<HashMap<String, Vec<String>>>,
    /// Top-level links.
    pub links: Option<TopLevelLinks>,
    /// Top-level meta.
    pub meta: Option<Meta>,
    /// Applied extension URIs.
    pub extensions: Vec<String>,
    /// Applied profile URIs.
    pub profiles: Vec<String>,
}

impl SerializeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context forwarded to the serializer of `resource_type`.
    pub fn with_context<C: Any + Send + Sync>(
        mut self,
        resource_type: impl Into<String>,
        context: C,
    ) -> Self {
        self.context.insert(resource_type.into(), Box::new(context));
        self
    }

    /// Set the document status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the include paths.
    pub fn with_include<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Set the sparse fieldset for one type.
    pub fn with_fields<I, S>(mut self, resource_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .get_or_insert_with(HashMap::new)
            .insert(
                resource_type.into(),
                fields.into_iter().map(Into::into).collect(),
            );
        self
    }

    /// Set top-level links.
    pub fn with_links(mut self, links: TopLevelLinks) -> Self {
        self.links = Some(links);
        self
    }

    /// Set top-level meta.
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Set applied extension URIs.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set applied profile URIs.
    pub fn with_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    fn context_for(&self, resource_type: &str) -> Option<&dyn Any> {
        self.context
            .get(resource_type)
            .map(|context| &**context as &dyn Any)
    }

    fn fields_for(&self, resource_type: &str) -> Option<&[String]> {
        self.fields
            .as_ref()
            .and_then(|fields| fields.get(resource_type))
            .map(Vec::as_slice)
    }
}

impl fmt::Debug for SerializeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializeOptions")
            .field("context", &self.context.keys().collect::<Vec<_>>())
            .field("status", &self.status)
            .field("include", &self.include)
            .field("fields", &self.fields)
            .field("links", &self.links)
            .field("meta", &self.meta)
            .field("extensions", &self.extensions)
            .field("profiles", &self.profiles)
            .finish()
    }
}

/// Primary entities handed to [`DocumentSerializer::serialize`].
#[derive(Clone)]
pub enum EntityInput<'a> {
    /// `data: null`.
    Null,
    /// A single resource.
    One(&'a dyn Any),
    /// A resource collection.
    Many(Vec<&'a dyn Any>),
}

impl<'a> EntityInput<'a> {
    /// Single entity.
    pub fn one<T: Any>(entity: &'a T) -> Self {
        Self::One(entity)
    }

    /// Collection of entities.
    pub fn many<T: Any>(entities: impl IntoIterator<Item = &'a T>) -> Self {
        Self::Many(
            entities
                .into_iter()
                .map(|entity| entity as &dyn Any)
                .collect(),
        )
    }
}

/// Type-erased view of an [`EntitySerializer`].
trait ErasedSerializer: Send + Sync {
    fn erased_id(&self, resource_type: &str, entity: &dyn Any) -> Result<String, SerializeError>;

    fn erased_serialize<'a>(
        &self,
        resource_type: &str,
        entity: &'a dyn Any,
        context: Option<&dyn Any>,
    ) -> Result<SerializedEntity<'a>, SerializeError>;
}

impl<S: EntitySerializer> ErasedSerializer for S {
    fn erased_id(&self, resource_type: &str, entity: &dyn Any) -> Result<String, SerializeError> {
        let entity = downcast_entity::<S::Entity>(resource_type, entity)?;
        Ok(self.id(entity))
    }

    fn erased_serialize<'a>(
        &self,
        resource_type: &str,
        entity: &'a dyn Any,
        context: Option<&dyn Any>,
    ) -> Result<SerializedEntity<'a>, SerializeError> {
        let entity = downcast_entity::<S::Entity>(resource_type, entity)?;
        let context = context
            .map(|context| {
                context.downcast_ref::<S::Context>().ok_or_else(|| {
                    SerializeError::ContextTypeMismatch {
                        resource_type: resource_type.to_owned(),
                        expected: type_name::<S::Context>(),
                    }
                })
            })
            .transpose()?;
        Ok(self.serialize(entity, context))
    }
}

fn downcast_entity<'a, T: Any>(
    resource_type: &str,
    entity: &'a dyn Any,
) -> Result<&'a T, SerializeError> {
    entity
        .downcast_ref::<T>()
        .ok_or_else(|| SerializeError::EntityTypeMismatch {
            resource_type: resource_type.to_owned(),
            expected: type_name::<T>(),
        })
}

/// Builder registering one [`EntitySerializer`] per resource type.
#[derive(Default)]
pub struct SerializeBuilder {
    serializers: HashMap<String, Box<dyn ErasedSerializer>>,
}

impl SerializeBuilder {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `serializer` for `resource_type`, replacing any earlier one.
    pub fn add(
        mut self,
        resource_type: impl Into<String>,
        serializer: impl EntitySerializer,
    ) -> Self {
        self.serializers
            .insert(resource_type.into(), Box::new(serializer));
        self
    }

    /// Finish the registry.
    pub fn build(self) -> DocumentSerializer {
        DocumentSerializer {
            serializers: self.serializers,
        }
    }
}

/// Serializes entities into JSON:API documents.
pub struct DocumentSerializer {
    serializers: HashMap<String, Box<dyn ErasedSerializer>>,
}

impl fmt::Debug for DocumentSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.serializers.keys().collect();
        types.sort();
        f.debug_struct("DocumentSerializer")
            .field("types", &types)
            .finish()
    }
}

impl DocumentSerializer {
    /// Whether a serializer is registered for `resource_type`.
    pub fn is_registered(&self, resource_type: &str) -> bool {
        self.serializers.contains_key(resource_type)
    }

    fn get(&self, resource_type: &str) -> Result<&dyn ErasedSerializer, SerializeError> {
        self.serializers
            .get(resource_type)
            .map(|serializer| serializer.as_ref())
            .ok_or_else(|| SerializeError::UnregisteredType(resource_type.to_owned()))
    }

    /// Serialize `input` as primary data of `resource_type`.
    #[instrument(skip_all, fields(resource_type = resource_type))]
    pub fn serialize(
        &self,
        resource_type: &str,
        input: EntityInput<'_>,
        options: &SerializeOptions,
    ) -> Result<JsonApiDocument, SerializeError> {
        let mut collection = IncludeCollection::new(self, options);

        let data = match input {
            EntityInput::Null => PrimaryData::Null,
            EntityInput::One(entity) => PrimaryData::One(Box::new(
                collection.serialize_resource(resource_type, entity, "")?,
            )),
            EntityInput::Many(entities) => PrimaryData::Many(
                entities
                    .into_iter()
                    .map(|entity| collection.serialize_resource(resource_type, entity, ""))
                    .collect::<Result<_, _>>()?,
            ),
        };

        let members = TopLevelMembers::Data {
            data,
            included: collection.into_included(),
            links: options.links.clone(),
            meta: options.meta.clone(),
        };

        Ok(JsonApiDocument::new(members)
            .with_status(options.status.unwrap_or(200))
            .with_media_type_options(MediaTypeOptions {
                extensions: options.extensions.clone(),
                profiles: options.profiles.clone(),
            }))
    }

    /// Serialize a single entity.
    pub fn serialize_one<T: Any>(
        &self,
        resource_type: &str,
        entity: &T,
        options: &SerializeOptions,
    ) -> Result<JsonApiDocument, SerializeError> {
        self.serialize(resource_type, EntityInput::one(entity), options)
    }

    /// Serialize a collection of entities.
    pub fn serialize_many<'a, T: Any>(
        &self,
        resource_type: &str,
        entities: impl IntoIterator<Item = &'a T>,
        options: &SerializeOptions,
    ) -> Result<JsonApiDocument, SerializeError> {
        self.serialize(resource_type, EntityInput::many(entities), options)
    }

    /// Serialize an empty to-one document (`data: null`).
    pub fn serialize_null(
        &self,
        resource_type: &str,
        options: &SerializeOptions,
    ) -> Result<JsonApiDocument, SerializeError> {
        self.serialize(resource_type, EntityInput::Null, options)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Tag {
        id: u32,
        label: &'static str,
    }

    struct TagSerializer;

    impl EntitySerializer for TagSerializer {
        type Entity = Tag;
        type Context = String;

        fn id(&self, entity: &Tag) -> String {
            entity.id.to_string()
        }

        fn serialize<'a>(&self, entity: &'a Tag, context: Option<&String>) -> SerializedEntity<'a> {
            let serialized = SerializedEntity::new().attribute("label", entity.label);
            match context {
                Some(prefix) => {
                    serialized.attribute("prefixed", format!("{prefix}{}", entity.label))
                }
                None => serialized,
            }
        }
    }

    fn registry() -> DocumentSerializer {
        SerializeBuilder::new().add("tag", TagSerializer).build()
    }

    #[test]
    fn null_input_yields_null_data() {
        let document = registry()
            .serialize_null("tag", &SerializeOptions::new())
            .unwrap();
        assert_eq!(
            document.body(),
            json!({ "jsonapi": { "version": "1.1" }, "data": null })
        );
    }

    #[test]
    fn context_is_forwarded_per_type() {
        let tag = Tag { id: 7, label: "rust" };
        let options = SerializeOptions::new().with_context("tag", "#".to_owned());
        let document = registry().serialize_one("tag", &tag, &options).unwrap();
        assert_eq!(
            document.body()["data"],
            json!({
                "id": "7",
                "type": "tag",
                "attributes": { "label": "rust", "prefixed": "#rust" }
            })
        );
    }

    #[test]
    fn wrong_context_type_is_reported() {
        let tag = Tag { id: 1, label: "x" };
        let options = SerializeOptions::new().with_context("tag", 5_u8);
        let error = registry().serialize_one("tag", &tag, &options).unwrap_err();
        assert!(matches!(error, SerializeError::ContextTypeMismatch { .. }));
    }

    #[test]
    fn wrong_entity_type_is_reported() {
        let error = registry()
            .serialize_one("tag", &"not a tag", &SerializeOptions::new())
            .unwrap_err();
        assert!(matches!(error, SerializeError::EntityTypeMismatch { .. }));
    }

    #[test]
    fn unregistered_primary_type_is_reported() {
        let tag = Tag { id: 1, label: "x" };
        let error = registry()
            .serialize_one("label", &tag, &SerializeOptions::new())
            .unwrap_err();
        assert_eq!(error, SerializeError::UnregisteredType("label".into()));
    }

    #[test]
    fn relationship_constructors() {
        let tag = Tag { id: 3, label: "x" };

        let one = IncludableRelationship::one(IncludableIdentifier::new("tag", "3").with_entity(&tag));
        assert!(matches!(
            one.data,
            Some(IncludableData::One(IncludableIdentifier { entity: Some(_), .. }))
        ));
        assert!(matches!(
            IncludableRelationship::optional(None).data,
            Some(IncludableData::Null)
        ));
        assert!(matches!(
            IncludableRelationship::many(Vec::new()).data,
            Some(IncludableData::Many(identifiers)) if identifiers.is_empty()
        ));
        assert!(IncludableRelationship::default().data.is_none());
    }
}
