// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reading and writing `page[...]` parameters.

use jsonapi_serde_client::{
    extract_page_params, inject_page_params, PageParams, PaginationError, PaginationPageParams,
};
use jsonapi_serde_core::json_api::{Link, LinkObject, TopLevelLinks};
use proptest::prelude::*;
use url::Url;

fn params(pairs: &[(&str, &str)]) -> PageParams {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

#[test]
fn extracts_params_from_every_pagination_link() {
    let links = TopLevelLinks {
        self_link: Some(Link::from("/articles?page[number]=2")),
        first: Some(Link::from("/articles?page[number]=1&page[size]=10")),
        next: Some(Link::Object(LinkObject {
            href: "https://api.test/articles?page[number]=3&page[size]=10&sort=-title".into(),
            rel: None,
            describedby: None,
            title: None,
            media_type: None,
            hreflang: None,
            meta: None,
        })),
        ..TopLevelLinks::default()
    };

    let extracted = extract_page_params(&links, None).expect("page params");

    assert_eq!(
        extracted,
        PaginationPageParams {
            first: Some(params(&[("number", "1"), ("size", "10")])),
            prev: None,
            next: Some(params(&[("number", "3"), ("size", "10")])),
            last: None,
        }
    );
}

#[test]
fn link_without_page_params_is_rejected() {
    let links = TopLevelLinks {
        last: Some(Link::from("/articles?sort=title")),
        ..TopLevelLinks::default()
    };

    let error = extract_page_params(&links, None).expect_err("no page params");
    assert_eq!(
        error,
        PaginationError::NoPageParams("http://localhost/articles?sort=title".into())
    );
    assert_eq!(
        error.to_string(),
        "No page params found in link http://localhost/articles?sort=title"
    );
}

#[test]
fn expected_params_must_be_present() {
    let links = TopLevelLinks {
        next: Some(Link::from("/articles?page[cursor]=abc")),
        ..TopLevelLinks::default()
    };

    assert!(extract_page_params(&links, Some(&["cursor"][..])).is_ok());

    let error = extract_page_params(&links, Some(&["cursor", "size"][..])).expect_err("size missing");
    assert_eq!(
        error.to_string(),
        "Page params 'size' is missing in link http://localhost/articles?page[cursor]=abc"
    );
}

#[test]
fn injection_replaces_existing_page_params() {
    let mut url = Url::parse("https://api.test/articles?page[number]=1&sort=title").expect("url");

    inject_page_params(&mut url, Some(&params(&[("number", "4")])));
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        [
            ("sort".to_owned(), "title".to_owned()),
            ("page[number]".to_owned(), "4".to_owned())
        ]
    );

    let before = url.clone();
    inject_page_params(&mut url, None);
    assert_eq!(url, before);
}

proptest! {
    #[test]
    fn injected_params_are_extracted_again(
        values in prop::collection::btree_map("[a-z][a-z0-9]{0,7}", "[a-zA-Z0-9]{1,8}", 1..5)
    ) {
        let mut url = Url::parse("https://api.test/items").expect("url");
        inject_page_params(&mut url, Some(&values));

        let links = TopLevelLinks {
            next: Some(Link::from(url.as_str())),
            ..TopLevelLinks::default()
        };
        let extracted = extract_page_params(&links, None).expect("page params");
        prop_assert_eq!(extracted.next, Some(values));
    }
}
