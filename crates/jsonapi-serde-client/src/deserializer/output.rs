// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Flattened deserializer output.

use std::sync::Arc;

use indexmap::IndexMap;
use jsonapi_serde_core::json_api::{Attributes, TopLevelLinks};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::DeserializeError;

/// Key under which resource `meta` appears in the flattened object.
pub const META_KEY: &str = "$meta";

/// Key under which resource `links` appear in the flattened object.
pub const LINKS_KEY: &str = "$links";

/// A resource with attributes and relationships lifted to the top level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializedResource {
    /// Resource id.
    pub id: String,
    /// Validated attributes.
    pub attributes: Attributes,
    /// Declared relationships, in declaration order.
    pub relationships: IndexMap<String, DeserializedRelationship>,
    /// Validated resource meta, when a schema was declared.
    pub meta: Option<Value>,
    /// Validated resource links, when a schema was declared.
    pub links: Option<Value>,
}

impl DeserializedResource {
    pub(crate) fn reference(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
            relationships: IndexMap::new(),
            meta: None,
            links: None,
        }
    }

    /// Attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&DeserializedRelationship> {
        self.relationships.get(name)
    }

    /// Field of the flattened object, i.e. `to_value()[field]` without
    /// building the object. Later members win: relationships shadow
    /// attributes, and attributes shadow `id`.
    pub fn get(&self, field: &str) -> Option<Value> {
        let special = match field {
            META_KEY => self.meta.as_ref(),
            LINKS_KEY => self.links.as_ref(),
            _ => None,
        };

        if let Some(value) = special {
            return Some(value.clone());
        }

        if let Some(relationship) = self.relationships.get(field) {
            return Some(relationship.to_value());
        }

        self.attributes
            .get(field)
            .cloned()
            .or_else(|| (field == "id").then(|| Value::String(self.id.clone())))
    }

    /// The flattened JSON object.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_owned(), Value::String(self.id.clone()));

        for (name, value) in &self.attributes {
            object.insert(name.clone(), value.clone());
        }

        for (name, relationship) in &self.relationships {
            object.insert(name.clone(), relationship.to_value());
        }

        if let Some(meta) = &self.meta {
            object.insert(META_KEY.to_owned(), meta.clone());
        }

        if let Some(links) = &self.links {
            object.insert(LINKS_KEY.to_owned(), links.clone());
        }

        Value::Object(object)
    }
}

/// A flattened relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeserializedRelationship {
    /// Empty to-one relationship.
    Null,
    /// To-one relationship.
    One(Arc<DeserializedResource>),
    /// To-many relationship.
    Many(Vec<Arc<DeserializedResource>>),
}

impl DeserializedRelationship {
    /// The related resource of a to-one relationship.
    pub fn as_one(&self) -> Option<&Arc<DeserializedResource>> {
        match self {
            Self::One(resource) => Some(resource),
            _ => None,
        }
    }

    /// The related resources of a to-many relationship.
    pub fn as_many(&self) -> Option<&[Arc<DeserializedResource>]> {
        match self {
            Self::Many(resources) => Some(resources),
            _ => None,
        }
    }

    /// Flattened JSON form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::One(resource) => resource.to_value(),
            Self::Many(resources) => {
                Value::Array(resources.iter().map(|resource| resource.to_value()).collect())
            }
        }
    }
}

/// Flattened primary data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeserializedData {
    /// `data: null`.
    Null,
    /// Single resource.
    One(Arc<DeserializedResource>),
    /// Resource collection.
    Many(Vec<Arc<DeserializedResource>>),
}

impl DeserializedData {
    /// The single primary resource.
    pub fn as_one(&self) -> Option<&Arc<DeserializedResource>> {
        match self {
            Self::One(resource) => Some(resource),
            _ => None,
        }
    }

    /// The primary resource collection.
    pub fn as_many(&self) -> Option<&[Arc<DeserializedResource>]> {
        match self {
            Self::Many(resources) => Some(resources),
            _ => None,
        }
    }

    /// Whether `data` was `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Flattened JSON form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::One(resource) => resource.to_value(),
            Self::Many(resources) => {
                Value::Array(resources.iter().map(|resource| resource.to_value()).collect())
            }
        }
    }
}

/// A validated, flattened document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializedDocument {
    /// Primary data.
    pub data: DeserializedData,
    /// Top-level links.
    pub links: Option<TopLevelLinks>,
    /// Top-level meta, when a document meta schema was declared.
    pub meta: Option<Value>,
}

impl DeserializedDocument {
    /// Flattened JSON form: `{ data, links?, meta? }`.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("data".to_owned(), self.data.to_value());

        if let Some(links) = &self.links {
            object.insert(
                "links".to_owned(),
                serde_json::to_value(links).unwrap_or(Value::Null),
            );
        }

        if let Some(meta) = &self.meta {
            object.insert("meta".to_owned(), meta.clone());
        }

        Value::Object(object)
    }

    /// Convert the flattened primary data into a caller-defined type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, DeserializeError> {
        serde_json::from_value(self.data.to_value()).map_err(DeserializeError::Conversion)
    }
}
