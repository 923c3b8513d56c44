// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Response document envelope with status and content-type accessors.
//!
//! HTTP adapters read [`JsonApiDocument::status`],
//! [`JsonApiDocument::content_type`] and [`JsonApiDocument::body`]
//! independently; the document itself never touches a transport.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::JsonApiError;
use crate::json_api::{ErrorObject, JsonApiImplementation, Meta, TopLevelMembers};

/// Media type of every JSON:API document.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Specification version advertised in the `jsonapi` member.
pub const JSONAPI_VERSION: &str = "1.1";

/// Applied extension and profile URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTypeOptions {
    /// Extension URIs (`ext` parameter).
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Profile URIs (`profile` parameter).
    #[serde(default)]
    pub profiles: Vec<String>,
}

/// A JSON:API media range the client accepts, reduced to its `ext` and
/// `profile` URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptMediaType {
    /// Extension URIs the client supports.
    #[serde(default)]
    pub ext: Vec<String>,
    /// Profile URIs the client requested.
    #[serde(default)]
    pub profile: Vec<String>,
}

/// A JSON:API response document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonApiDocument {
    members: TopLevelMembers,
    status: u16,
    media_type: MediaTypeOptions,
}

#[derive(Serialize)]
struct Body<'a> {
    jsonapi: JsonApiImplementation,
    #[serde(flatten)]
    members: &'a TopLevelMembers,
}

impl JsonApiDocument {
    /// Document with status 200 and no extensions or profiles.
    pub fn new(members: TopLevelMembers) -> Self {
        Self {
            members,
            status: 200,
            media_type: MediaTypeOptions::default(),
        }
    }

    /// Override the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Attach extension/profile URIs.
    pub fn with_media_type_options(mut self, options: MediaTypeOptions) -> Self {
        self.media_type = options;
        self
    }

    /// HTTP status for the response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Top-level members without the `jsonapi` object.
    pub fn members(&self) -> &TopLevelMembers {
        &self.members
    }

    /// Consume the document, returning its members.
    pub fn into_members(self) -> TopLevelMembers {
        self.members
    }

    /// Applied extension/profile URIs.
    pub fn media_type_options(&self) -> &MediaTypeOptions {
        &self.media_type
    }

    fn implementation(&self) -> JsonApiImplementation {
        let non_empty = |uris: &Vec<String>| (!uris.is_empty()).then(|| uris.clone());
        JsonApiImplementation {
            version: Some(JSONAPI_VERSION.to_owned()),
            ext: non_empty(&self.media_type.extensions),
            profile: non_empty(&self.media_type.profiles),
            meta: None,
        }
    }

    /// Full response body (`jsonapi` member first, then the members).
    pub fn body(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// `Content-Type` header value including `ext`/`profile` parameters.
    pub fn content_type(&self) -> String {
        let mut parameters = Vec::new();

        if !self.media_type.extensions.is_empty() {
            parameters.push(format!("ext=\"{}\"", self.media_type.extensions.join(" ")));
        }

        if !self.media_type.profiles.is_empty() {
            parameters.push(format!(
                "profile=\"{}\"",
                self.media_type.profiles.join(" ")
            ));
        }

        if parameters.is_empty() {
            return JSONAPI_MEDIA_TYPE.to_owned();
        }

        format!("{JSONAPI_MEDIA_TYPE};{}", parameters.join(";"))
    }

    /// Check that at least one accepted media type supports every applied
    /// extension, failing with `406 Not Acceptable` otherwise.
    pub fn verify_accept_media_type(
        &self,
        acceptable: &[AcceptMediaType],
    ) -> Result<(), JsonApiError> {
        let applied = &self.media_type.extensions;
        let matches = acceptable
            .iter()
            .any(|accept| accept.ext.iter().all(|ext| applied.contains(ext)));

        if matches {
            return Ok(());
        }

        let meta = (!applied.is_empty()).then(|| {
            let mut meta = Meta::new();
            meta.insert("appliedExtensions".to_owned(), Value::from(applied.clone()));
            meta
        });

        Err(JsonApiError::single(ErrorObject {
            status: Some("406".to_owned()),
            code: Some("not_acceptable".to_owned()),
            title: Some("Not Acceptable".to_owned()),
            detail: Some(format!(
                "No valid accept types provided, you must accept {JSONAPI_MEDIA_TYPE}"
            )),
            meta,
            ..ErrorObject::default()
        }))
    }
}

impl Serialize for JsonApiDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Body {
            jsonapi: self.implementation(),
            members: &self.members,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::json_api::{Meta, PrimaryData};
    use serde_json::json;

    fn null_document() -> JsonApiDocument {
        JsonApiDocument::new(TopLevelMembers::Data {
            data: PrimaryData::Null,
            included: None,
            links: None,
            meta: None,
        })
    }

    #[test]
    fn body_leads_with_jsonapi_member() {
        let body = null_document().body();
        assert_eq!(body, json!({ "jsonapi": { "version": "1.1" }, "data": null }));
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["jsonapi", "data"]);
    }

    #[test]
    fn content_type_carries_parameters() {
        assert_eq!(null_document().content_type(), "application/vnd.api+json");

        let document = null_document().with_media_type_options(MediaTypeOptions {
            extensions: vec!["https://a.test/ext".into(), "https://b.test/ext".into()],
            profiles: vec!["https://p.test".into()],
        });
        assert_eq!(
            document.content_type(),
            "application/vnd.api+json;ext=\"https://a.test/ext https://b.test/ext\";profile=\"https://p.test\""
        );
        assert_eq!(
            document.body()["jsonapi"],
            json!({
                "version": "1.1",
                "ext": ["https://a.test/ext", "https://b.test/ext"],
                "profile": ["https://p.test"]
            })
        );
    }

    #[test]
    fn status_defaults_to_ok() {
        assert_eq!(null_document().status(), 200);
        assert_eq!(null_document().with_status(201).status(), 201);
    }

    #[test]
    fn meta_only_document() {
        let mut meta = Meta::new();
        meta.insert("total".into(), json!(0));
        let document = JsonApiDocument::new(TopLevelMembers::Meta { meta, links: None });
        assert_eq!(
            document.body(),
            json!({ "jsonapi": { "version": "1.1" }, "meta": { "total": 0 } })
        );
    }

    fn accepting(ext: &[&str]) -> AcceptMediaType {
        AcceptMediaType {
            ext: ext.iter().map(|uri| (*uri).to_owned()).collect(),
            profile: Vec::new(),
        }
    }

    #[test]
    fn accept_requires_every_requested_extension_to_be_applied() {
        let document = null_document().with_media_type_options(MediaTypeOptions {
            extensions: vec!["ext1".into()],
            profiles: Vec::new(),
        });

        assert!(document.verify_accept_media_type(&[accepting(&["ext1"])]).is_ok());
        assert!(document
            .verify_accept_media_type(&[accepting(&["ext2"]), accepting(&[])])
            .is_ok());

        let error = document
            .verify_accept_media_type(&[accepting(&["ext1", "ext2"])])
            .unwrap_err();
        assert_eq!(error.status(), 406);
        assert_eq!(error.errors()[0].code.as_deref(), Some("not_acceptable"));
        assert_eq!(
            error.errors()[0].detail.as_deref(),
            Some("No valid accept types provided, you must accept application/vnd.api+json")
        );
        assert_eq!(
            error.errors()[0].meta.as_ref().map(|meta| &meta["appliedExtensions"]),
            Some(&json!(["ext1"]))
        );
    }

    #[test]
    fn nothing_acceptable_without_extensions_has_no_meta() {
        let error = null_document()
            .verify_accept_media_type(&[accepting(&["x"])])
            .unwrap_err();
        assert_eq!(error.status(), 406);
        assert_eq!(error.errors()[0].meta, None);

        assert!(null_document().verify_accept_media_type(&[]).is_err());
    }
}
