// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Server-side request parsing for JSON:API endpoints.
//!
//! - [`content_type`]: validate the `Content-Type` of request bodies and
//!   read the JSON:API media types a client accepts.
//! - [`body`]: parse resource and relationship request documents.
//! - [`query`]: parse `include`, `sort`, `fields`, `filter` and `page`.
//!
//! Every failure is a [`JsonApiError`] ready to be rendered as an error
//! document with [`JsonApiError::to_document`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

pub mod body;
pub mod content_type;
pub mod query;

pub use body::{
    client_resource_identifier, fixed_type, parse_nullable_relationship_request,
    parse_relationship_request, parse_relationships_request, parse_resource_request,
    relationship, resource_identifier, resource_identifier_with_id, Body, BodyContext,
    IncludedResource, IncludedResourceMap, IncludedTypeSchemas, ResourceRequest,
    ResourceRequestOptions,
};
pub use content_type::{
    acceptable_media_types, parse_accept, validate_accept, validate_content_type, ContentType,
    MediaRange, MediaTypeError,
};
pub use jsonapi_serde_core::AcceptMediaType;
pub use jsonapi_serde_core::JsonApiError;
pub use query::{
    decode_search_params, FieldsOptions, IncludeOptions, ParsedQuery, QueryParser,
    QueryParserOptions, SortField, SortOptions, SortOrder,
};
