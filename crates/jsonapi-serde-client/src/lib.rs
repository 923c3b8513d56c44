// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Consuming JSON:API documents.
//!
//! - [`deserializer`]: validate a response document against a declared shape
//!   and flatten it, resolving `included` resources per relationship path.
//! - [`pagination`]: read and write `page[...]` parameters of pagination links.
//! - [`error_handler`]: decode error documents of failed responses.
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

pub mod deserializer;
pub mod error_handler;
pub mod pagination;

pub use deserializer::{
    Cardinality, DeserializeError, DeserializedData, DeserializedDocument,
    DeserializedRelationship, DeserializedResource, Deserializer, DeserializerOptions,
    IncludedShape, RelationshipShape,
};
pub use error_handler::{
    handle_error_response, ErrorResponse, ErrorResponseError, JsonApiResponseError,
};
pub use pagination::{
    extract_page_params, inject_page_params, PageParams, PaginationError, PaginationPageParams,
};
