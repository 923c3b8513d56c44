// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON:API wire types (resource objects, relationships, links, errors).
//!
//! These are plain serde DTOs. Optional members are skipped when absent so a
//! serialized value never carries `"attributes": null` or empty placeholders.
//! Object members keep insertion order (`serde_json/preserve_order`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arbitrary metadata object allowed anywhere in a JSON:API document.
pub type Meta = serde_json::Map<String, Value>;

/// Resource attributes (key/value pairs).
pub type Attributes = serde_json::Map<String, Value>;

/// A link object with optional attributes for rich linking information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkObject {
    /// Target URI.
    pub href: String,
    /// Link relation type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    /// Link to a description document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub describedby: Option<String>,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Media type of the target.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Language(s) of the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hreflang: Option<String>,
    /// Non-standard meta information about the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A link is either a plain URL string or a full [`LinkObject`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    /// Plain URL.
    Url(String),
    /// Link object.
    Object(LinkObject),
}

impl Link {
    /// The target URL regardless of representation.
    pub fn href(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Object(object) => &object.href,
        }
    }
}

impl From<&str> for Link {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<String> for Link {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

/// Named links; a `None` value serializes as an explicit `null` link.
pub type Links = IndexMap<String, Option<Link>>;

/// Standard top-level links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLevelLinks {
    /// Link that generated the current document.
    #[serde(default, rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<Link>,
    /// Related resource link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<Link>,
    /// Link to a description document (e.g. OpenAPI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub describedby: Option<Link>,
    /// First page of data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Link>,
    /// Previous page of data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<Link>,
    /// Next page of data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
    /// Last page of data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Link>,
}

/// A reference to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Resource type.
    pub r#type: String,
    /// Resource id.
    pub id: String,
    /// Non-standard meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ResourceIdentifier {
    /// Create an identifier without meta.
    pub fn new(r#type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            id: id.into(),
            meta: None,
        }
    }
}

/// Resource linkage of a relationship.
///
/// Serialized untagged: an object, an array or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    /// To-one linkage.
    One(ResourceIdentifier),
    /// To-many linkage (possibly empty).
    Many(Vec<ResourceIdentifier>),
    /// Empty to-one linkage.
    Null,
}

/// A relationship describes links and/or resource linkage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Resource linkage; `None` means the member is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RelationshipData>,
    /// Relationship links (`self`, `related`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    /// Non-standard meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Relationships of a resource, in declaration order.
pub type Relationships = IndexMap<String, Relationship>;

/// A full resource object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource id.
    pub id: String,
    /// Resource type.
    pub r#type: String,
    /// Attributes; absent when there are none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
    /// Relationships; absent when there are none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationships>,
    /// Resource links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    /// Non-standard meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Primary data of a data document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    /// Single resource.
    One(Box<Resource>),
    /// Resource collection.
    Many(Vec<Resource>),
    /// Empty single-resource document.
    Null,
}

/// Location of the cause of an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    /// JSON pointer into the request document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    /// Query parameter that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    /// Request header that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

/// A JSON:API error object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Unique identifier for this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `about` / `type` links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    /// HTTP status code as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Application-specific error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short summary of the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Explanation specific to this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Source of the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    /// Non-standard meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// The `jsonapi` top-level member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonApiImplementation {
    /// Highest supported specification version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Applied extension URIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Vec<String>>,
    /// Applied profile URIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,
    /// Non-standard meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Top-level members of a document.
///
/// Exactly one of `data`, `errors` or `meta` is the primary content; error
/// documents never carry data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopLevelMembers {
    /// Data document.
    Data {
        /// Primary data.
        data: PrimaryData,
        /// Side-loaded resources; absent unless inclusion was requested.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        included: Option<Vec<Resource>>,
        /// Top-level links.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        links: Option<TopLevelLinks>,
        /// Top-level meta.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Meta>,
    },
    /// Error document.
    Errors {
        /// One or more error objects.
        errors: Vec<ErrorObject>,
        /// Top-level links.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        links: Option<TopLevelLinks>,
        /// Top-level meta.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Meta>,
    },
    /// Meta-only document.
    Meta {
        /// Top-level meta.
        meta: Meta,
        /// Top-level links.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        links: Option<TopLevelLinks>,
    },
}
