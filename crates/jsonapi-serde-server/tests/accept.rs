// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `Accept` negotiation: header parsing and the response-side 406 check.

use jsonapi_serde_core::json_api::{PrimaryData, TopLevelMembers};
use jsonapi_serde_core::{JsonApiDocument, MediaTypeOptions};
use jsonapi_serde_server::{acceptable_media_types, validate_accept, AcceptMediaType};

fn accept(ext: &[&str], profile: &[&str]) -> AcceptMediaType {
    AcceptMediaType {
        ext: ext.iter().map(|uri| (*uri).to_owned()).collect(),
        profile: profile.iter().map(|uri| (*uri).to_owned()).collect(),
    }
}

fn document_with_extensions(extensions: &[&str]) -> JsonApiDocument {
    JsonApiDocument::new(TopLevelMembers::Data {
        data: PrimaryData::Null,
        included: None,
        links: None,
        meta: None,
    })
    .with_media_type_options(MediaTypeOptions {
        extensions: extensions.iter().map(|uri| (*uri).to_owned()).collect(),
        profiles: Vec::new(),
    })
}

#[test]
fn only_jsonapi_ranges_are_acceptable() {
    let cases: [(Option<&str>, Vec<AcceptMediaType>); 7] = [
        (None, vec![accept(&[], &[])]),
        (Some(""), vec![accept(&[], &[])]),
        (Some("*/*"), vec![accept(&[], &[])]),
        (Some("application/json"), Vec::new()),
        (Some("application/vnd.api+json;charset=utf-8"), Vec::new()),
        (Some("application/vnd.api+json;ext=foo;bad=param"), Vec::new()),
        (
            Some(r#"application/vnd.api+json;ext="foo bar";profile="baz qux""#),
            vec![accept(&["foo", "bar"], &["baz", "qux"])],
        ),
    ];

    for (header, expected) in cases {
        assert_eq!(
            acceptable_media_types(header).expect("valid header"),
            expected,
            "header {header:?}"
        );
    }
}

#[test]
fn acceptable_types_follow_weight_order() {
    let types = acceptable_media_types(Some(
        r#"application/vnd.api+json;ext=a;q=0.2, application/*;q=0.8, text/html"#,
    ))
    .expect("valid header");

    assert_eq!(types, [accept(&[], &[]), accept(&["a"], &[])]);
}

#[test]
fn malformed_accept_is_a_bad_request() {
    let error = validate_accept(Some("application/vnd.api+json;q=abc")).expect_err("bad weight");

    assert_eq!(error.status(), 400);
    assert_eq!(error.errors()[0].code.as_deref(), Some("bad_request"));
    assert_eq!(
        error.errors()[0].detail.as_deref(),
        Some("invalid weight: abc")
    );
    assert_eq!(
        error.errors()[0]
            .source
            .as_ref()
            .and_then(|source| source.header.as_deref()),
        Some("Accept")
    );
}

#[test]
fn requested_extension_must_be_applied() {
    let acceptable = validate_accept(Some(r#"application/vnd.api+json;ext="https://a.test/ext""#))
        .expect("valid header");

    let plain = document_with_extensions(&[]);
    let error = plain
        .verify_accept_media_type(&acceptable)
        .expect_err("extension not applied");
    assert_eq!(error.status(), 406);
    assert_eq!(error.errors()[0].code.as_deref(), Some("not_acceptable"));
    assert_eq!(error.to_document().status(), 406);

    document_with_extensions(&["https://a.test/ext"])
        .verify_accept_media_type(&acceptable)
        .expect("extension applied");
}

#[test]
fn wildcard_accepts_documents_with_extensions() {
    let acceptable = validate_accept(None).expect("missing header");
    document_with_extensions(&["https://a.test/ext"])
        .verify_accept_media_type(&acceptable)
        .expect("plain JSON:API is acceptable");

    let none = validate_accept(Some("text/html")).expect("valid header");
    assert!(document_with_extensions(&[])
        .verify_accept_media_type(&none)
        .is_err());
}
