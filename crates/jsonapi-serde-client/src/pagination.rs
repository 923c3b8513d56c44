// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Page parameters carried in `page[<name>]` query keys of pagination links.

use std::collections::BTreeMap;

use jsonapi_serde_core::json_api::{Link, TopLevelLinks};
use thiserror::Error;
use url::Url;

/// Page parameters of one link, keyed by the name inside `page[...]`.
pub type PageParams = BTreeMap<String, String>;

/// Base for resolving relative pagination links.
const RELATIVE_BASE: &str = "http://localhost";

/// Page parameters of the four pagination links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationPageParams {
    /// Parameters of the `first` link.
    pub first: Option<PageParams>,
    /// Parameters of the `prev` link.
    pub prev: Option<PageParams>,
    /// Parameters of the `next` link.
    pub next: Option<PageParams>,
    /// Parameters of the `last` link.
    pub last: Option<PageParams>,
}

/// Failure to read page parameters from a link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// The link is not a valid URL, even relative to the fallback base.
    #[error("invalid pagination link '{link}': {source}")]
    InvalidLink {
        /// The offending link.
        link: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// The link carries no `page[...]` parameters.
    #[error("No page params found in link {0}")]
    NoPageParams(String),
    /// An expected parameter is absent.
    #[error("Page params '{param}' is missing in link {link}")]
    MissingParam {
        /// Expected parameter name.
        param: String,
        /// The resolved link.
        link: String,
    },
}

/// Read the page parameters of the `first`, `prev`, `next` and `last` links.
///
/// When `expected` is given every link present must carry all of them.
pub fn extract_page_params(
    links: &TopLevelLinks,
    expected: Option<&[&str]>,
) -> Result<PaginationPageParams, PaginationError> {
    Ok(PaginationPageParams {
        first: page_params_from_link(links.first.as_ref(), expected)?,
        prev: page_params_from_link(links.prev.as_ref(), expected)?,
        next: page_params_from_link(links.next.as_ref(), expected)?,
        last: page_params_from_link(links.last.as_ref(), expected)?,
    })
}

fn page_params_from_link(
    link: Option<&Link>,
    expected: Option<&[&str]>,
) -> Result<Option<PageParams>, PaginationError> {
    let Some(link) = link else {
        return Ok(None);
    };

    let url = resolve(link.href())?;
    let params: PageParams = url
        .query_pairs()
        .filter_map(|(key, value)| {
            page_param_name(&key).map(|name| (name.to_owned(), value.into_owned()))
        })
        .collect();

    if params.is_empty() {
        return Err(PaginationError::NoPageParams(url.to_string()));
    }

    if let Some(missing) = expected
        .unwrap_or_default()
        .iter()
        .find(|param| !params.contains_key(**param))
    {
        return Err(PaginationError::MissingParam {
            param: (*missing).to_owned(),
            link: url.to_string(),
        });
    }

    Ok(Some(params))
}

fn resolve(href: &str) -> Result<Url, PaginationError> {
    let invalid = |source| PaginationError::InvalidLink {
        link: href.to_owned(),
        source,
    };
    let base = Url::parse(RELATIVE_BASE).map_err(invalid)?;
    base.join(href).map_err(invalid)
}

/// `page[number]` → `number`; names are ASCII alphanumeric.
fn page_param_name(key: &str) -> Option<&str> {
    let name = key.strip_prefix("page[")?.strip_suffix(']')?;
    (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())).then_some(name)
}

/// Set `page[<name>]=<value>` on `url` for every entry of `params`,
/// replacing existing values.
pub fn inject_page_params(url: &mut Url, params: Option<&PageParams>) {
    let Some(params) = params.filter(|params| !params.is_empty()) else {
        return;
    };

    let keys: Vec<String> = params.keys().map(|name| format!("page[{name}]")).collect();
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !keys.iter().any(|page_key| page_key == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear();
    query.extend_pairs(retained);
    for (name, value) in params {
        query.append_pair(&format!("page[{name}]"), value);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn param_names_must_be_alphanumeric() {
        assert_eq!(page_param_name("page[number]"), Some("number"));
        assert_eq!(page_param_name("page[size2]"), Some("size2"));
        assert_eq!(page_param_name("page[]"), None);
        assert_eq!(page_param_name("page[a-b]"), None);
        assert_eq!(page_param_name("filter[x]"), None);
    }

    #[test]
    fn relative_links_resolve_against_localhost() {
        let url = resolve("/articles?page[cursor]=abc").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.path(), "/articles");
    }
}
