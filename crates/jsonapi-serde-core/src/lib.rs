// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared JSON:API building blocks.
//!
//! `jsonapi-serde-core` holds everything both sides of the wire need:
//!
//! - [`json_api`]: typed JSON:API 1.1 document members.
//! - [`schema`]: the validation capability the parsers are generic over.
//! - [`serializer`]: entity → compound document conversion with
//!   `include` side-loading and sparse fieldsets.
//! - [`document`]: the response envelope (status, content type, body).
//! - [`error`]: error documents with HTTP status inference.
//!
//! The client and server crates build their parsers on top of these.
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

pub mod document;
pub mod error;
pub mod json_api;
pub mod schema;
pub mod serializer;

pub use document::{
    AcceptMediaType, JsonApiDocument, MediaTypeOptions, JSONAPI_MEDIA_TYPE, JSONAPI_VERSION,
};
pub use error::{determine_status, IssueSource, JsonApiError, NoErrorsSupplied};
pub use schema::{Issue, IssueParams, PathSegment, Schema, SchemaRef, ValidationError};
pub use serializer::{
    DocumentSerializer, EntityInput, EntitySerializer, IncludableData, IncludableIdentifier,
    IncludableRelationship, SerializeBuilder, SerializeError, SerializeOptions, SerializedEntity,
};
