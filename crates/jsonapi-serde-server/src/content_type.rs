// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `Content-Type` and `Accept` header parsing.
//!
//! A request body must be sent as `application/vnd.api+json`, optionally with
//! the `ext` and `profile` media type parameters. Any other parameter is
//! rejected with `415 Unsupported Media Type`.
//!
//! The `Accept` header is reduced to the JSON:API media ranges it contains.
//! A response document then checks them with
//! [`JsonApiDocument::verify_accept_media_type`](jsonapi_serde_core::JsonApiDocument::verify_accept_media_type).

use std::cmp::Reverse;

use jsonapi_serde_core::json_api::{ErrorObject, ErrorSource};
use jsonapi_serde_core::{AcceptMediaType, JsonApiError, JSONAPI_MEDIA_TYPE};
use thiserror::Error;
use tracing::debug;

/// Media type parameters a JSON:API request may carry.
const ALLOWED_PARAMETERS: [&str; 2] = ["ext", "profile"];

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// `type/subtype`, lower-cased.
    pub media_type: String,
    /// Parameters in header order; names are lower-cased.
    pub parameters: Vec<(String, String)>,
}

/// Syntax error in a media type header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaTypeError {
    /// The header ended where more input was required.
    #[error("unexpected end of header")]
    UnexpectedEnd,
    /// A character that is not allowed at this position.
    #[error("unexpected character at pos {0}")]
    UnexpectedChar(usize),
    /// A quoted parameter value without closing quote.
    #[error("unclosed quoted string")]
    UnclosedQuote,
    /// A `q` parameter outside `0..=1` or with more than three decimals.
    #[error("invalid weight: {0}")]
    InvalidWeight(String),
}

impl ContentType {
    /// Parse a header value such as `application/vnd.api+json; ext="a b"`.
    pub fn parse(header: &str) -> Result<Self, MediaTypeError> {
        let mut cursor = Cursor::new(header);

        cursor.skip_whitespace();
        let main = cursor.token()?.to_ascii_lowercase();
        cursor.consume(b'/')?;
        let sub = cursor.token()?.to_ascii_lowercase();
        cursor.skip_whitespace();

        let mut parameters = Vec::new();
        if !cursor.at_end() {
            cursor.consume(b';')?;
            while !cursor.at_end() {
                parameters.push(cursor.parameter()?);

                cursor.skip_whitespace();
                if cursor.at_end() {
                    break;
                }
                cursor.consume(b';')?;
            }
        }

        Ok(Self {
            media_type: format!("{main}/{sub}"),
            parameters,
        })
    }

    /// Value of the first parameter named `name`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Extension URIs from the space-separated `ext` parameter.
    pub fn extensions(&self) -> Vec<&str> {
        self.parameter("ext")
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Profile URIs from the space-separated `profile` parameter.
    pub fn profiles(&self) -> Vec<&str> {
        self.parameter("profile")
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Check that a request body is declared as JSON:API.
///
/// A header that fails to parse is treated like a missing one.
pub fn validate_content_type(header: Option<&str>) -> Result<ContentType, JsonApiError> {
    let parsed = header
        .filter(|header| !header.trim().is_empty())
        .and_then(|header| {
            ContentType::parse(header)
                .map_err(|error| debug!(%error, header, "malformed Content-Type header"))
                .ok()
        });

    let Some(content_type) = parsed else {
        return Err(unsupported_media_type(format!(
            "Media type is missing, use '{JSONAPI_MEDIA_TYPE}'"
        )));
    };

    if content_type.media_type != JSONAPI_MEDIA_TYPE {
        return Err(unsupported_media_type(format!(
            "Unsupported media type '{}', use '{JSONAPI_MEDIA_TYPE}'",
            content_type.media_type
        )));
    }

    let unknown: Vec<&str> = content_type
        .parameters
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| !ALLOWED_PARAMETERS.contains(name))
        .collect();

    if !unknown.is_empty() {
        return Err(unsupported_media_type(format!(
            "Unknown media type parameters: {}",
            unknown.join(", ")
        )));
    }

    Ok(content_type)
}

/// One media range of an `Accept` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    /// `type/subtype`, lower-cased; either part may be `*`.
    pub media_type: String,
    /// Media type parameters preceding `q`; names are lower-cased.
    pub parameters: Vec<(String, String)>,
    /// Quality weight in thousandths (`q=0.5` is 500).
    pub weight: u16,
    /// Accept-extension parameters following `q`.
    pub accept_extensions: Vec<(String, String)>,
}

impl MediaRange {
    fn any() -> Self {
        Self::new("*/*".to_owned())
    }

    fn new(media_type: String) -> Self {
        Self {
            media_type,
            parameters: Vec::new(),
            weight: 1000,
            accept_extensions: Vec::new(),
        }
    }

    fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether the range covers `application/vnd.api+json` with nothing but
    /// `ext` and `profile` parameters.
    fn is_jsonapi(&self) -> bool {
        let (main, sub) = self
            .media_type
            .split_once('/')
            .unwrap_or((self.media_type.as_str(), ""));

        matches!(main, "*" | "application")
            && matches!(sub, "*" | "vnd.api+json")
            && self
                .parameters
                .iter()
                .all(|(name, _)| ALLOWED_PARAMETERS.contains(&name.as_str()))
    }
}

/// Parse an `Accept` header into media ranges ordered by descending weight.
///
/// Ranges of equal weight keep their header order. An empty header accepts
/// anything (`*/*`).
pub fn parse_accept(header: &str) -> Result<Vec<MediaRange>, MediaTypeError> {
    let mut cursor = Cursor::new(header);
    cursor.skip_whitespace();

    if cursor.at_end() {
        return Ok(vec![MediaRange::any()]);
    }

    let mut ranges = Vec::new();
    loop {
        let (range, more) = cursor.media_range()?;
        ranges.push(range);
        if !more {
            break;
        }
    }

    ranges.sort_by_key(|range| Reverse(range.weight));
    Ok(ranges)
}

/// JSON:API media types acceptable per the `Accept` header.
///
/// A missing header is treated like an empty one. Ranges for other media
/// types, or carrying parameters besides `ext` and `profile`, are skipped.
pub fn acceptable_media_types(
    header: Option<&str>,
) -> Result<Vec<AcceptMediaType>, MediaTypeError> {
    let ranges = parse_accept(header.unwrap_or_default())?;

    Ok(ranges
        .iter()
        .filter(|range| range.is_jsonapi())
        .map(|range| {
            let uris = |name: &str| -> Vec<String> {
                range
                    .parameter(name)
                    .map(|value| value.split(' ').map(str::to_owned).collect())
                    .unwrap_or_default()
            };
            AcceptMediaType {
                ext: uris("ext"),
                profile: uris("profile"),
            }
        })
        .collect())
}

/// [`acceptable_media_types`], failing with `400 Bad Request` when the
/// header is malformed.
pub fn validate_accept(header: Option<&str>) -> Result<Vec<AcceptMediaType>, JsonApiError> {
    acceptable_media_types(header).map_err(|error| {
        debug!(%error, header, "malformed Accept header");
        JsonApiError::single(ErrorObject {
            status: Some("400".to_owned()),
            code: Some("bad_request".to_owned()),
            title: Some("Bad Request".to_owned()),
            detail: Some(error.to_string()),
            source: Some(ErrorSource {
                header: Some("Accept".to_owned()),
                ..ErrorSource::default()
            }),
            ..ErrorObject::default()
        })
    })
}

fn unsupported_media_type(detail: String) -> JsonApiError {
    JsonApiError::single(ErrorObject {
        status: Some("415".to_owned()),
        code: Some("unsupported_media_type".to_owned()),
        title: Some("Unsupported Media Type".to_owned()),
        detail: Some(detail),
        source: Some(ErrorSource {
            header: Some("Content-Type".to_owned()),
            ..ErrorSource::default()
        }),
        ..ErrorObject::default()
    })
}

struct Cursor<'h> {
    header: &'h str,
    index: usize,
}

impl<'h> Cursor<'h> {
    fn new(header: &'h str) -> Self {
        Self { header, index: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.header.as_bytes().get(self.index).copied()
    }

    fn at_end(&self) -> bool {
        self.index >= self.header.len()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.index += 1;
        }
    }

    fn consume(&mut self, expected: u8) -> Result<(), MediaTypeError> {
        match self.peek() {
            None => Err(MediaTypeError::UnexpectedEnd),
            Some(byte) if byte == expected => {
                self.index += 1;
                Ok(())
            }
            Some(_) => Err(MediaTypeError::UnexpectedChar(self.index)),
        }
    }

    fn token(&mut self) -> Result<&'h str, MediaTypeError> {
        let start = self.index;
        while self.peek().is_some_and(is_tchar) {
            self.index += 1;
        }

        if start == self.index {
            return Err(if self.at_end() {
                MediaTypeError::UnexpectedEnd
            } else {
                MediaTypeError::UnexpectedChar(self.index)
            });
        }

        // Token characters are ASCII, so both ends are char boundaries.
        self.header
            .get(start..self.index)
            .ok_or(MediaTypeError::UnexpectedChar(start))
    }

    fn parameter(&mut self) -> Result<(String, String), MediaTypeError> {
        self.skip_whitespace();
        let name = self.token()?.to_ascii_lowercase();
        self.consume(b'=')?;
        let value = if self.peek() == Some(b'"') {
            self.quoted()?
        } else {
            self.token()?.to_owned()
        };
        Ok((name, value))
    }

    /// One `Accept` media range; the flag tells whether another follows.
    fn media_range(&mut self) -> Result<(MediaRange, bool), MediaTypeError> {
        let main = self.token()?.to_ascii_lowercase();
        self.consume(b'/')?;
        let sub = self.token()?.to_ascii_lowercase();
        let mut range = MediaRange::new(format!("{main}/{sub}"));
        self.skip_whitespace();

        match self.peek() {
            None => return Ok((range, false)),
            Some(b',') => {
                self.index += 1;
                self.skip_whitespace();
                return Ok((range, true));
            }
            Some(b';') => self.index += 1,
            Some(_) => return Err(MediaTypeError::UnexpectedChar(self.index)),
        }

        let mut after_weight = false;
        while !self.at_end() {
            let (name, value) = self.parameter()?;

            if name == "q" {
                range.weight = parse_weight(&value)?;
                after_weight = true;
            } else if after_weight {
                range.accept_extensions.push((name, value));
            } else {
                range.parameters.push((name, value));
            }

            self.skip_whitespace();
            if self.at_end() || self.peek() == Some(b',') {
                break;
            }
            self.consume(b';')?;
        }

        self.skip_whitespace();
        let more = !self.at_end();
        if more {
            self.consume(b',')?;
            self.skip_whitespace();
        }

        Ok((range, more))
    }

    fn quoted(&mut self) -> Result<String, MediaTypeError> {
        self.consume(b'"')?;
        let mut value = Vec::new();

        loop {
            let Some(byte) = self.peek() else {
                return Err(MediaTypeError::UnclosedQuote);
            };
            self.index += 1;

            match byte {
                b'"' => break,
                b'\\' => {
                    let escaped = self.peek().ok_or(MediaTypeError::UnexpectedEnd)?;
                    if !is_qchar(escaped) {
                        return Err(MediaTypeError::UnexpectedChar(self.index));
                    }
                    self.index += 1;
                    value.push(escaped);
                }
                byte if is_qdtext(byte) => value.push(byte),
                _ => return Err(MediaTypeError::UnexpectedChar(self.index - 1)),
            }
        }

        String::from_utf8(value).map_err(|_| MediaTypeError::UnexpectedChar(self.index))
    }
}

/// `q` value in thousandths: `0`, `1` or up to three decimals.
fn parse_weight(value: &str) -> Result<u16, MediaTypeError> {
    let invalid = || MediaTypeError::InvalidWeight(value.to_owned());
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));

    if fraction.len() > 3 || !fraction.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }

    let thousandths = format!("{fraction:0<3}").parse::<u16>().map_err(|_| invalid())?;
    match whole {
        "0" => Ok(thousandths),
        "1" if thousandths == 0 => Ok(1000),
        _ => Err(invalid()),
    }
}

// RFC 9110 token characters.
fn is_tchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}

fn is_qdtext(byte: u8) -> bool {
    matches!(byte, b'\t' | b' ' | 0x21 | 0x23..=0x5b | 0x5d..=0x7e | 0x80..=0xff)
}

fn is_qchar(byte: u8) -> bool {
    matches!(byte, b'\t' | b' ' | 0x21..=0x7e | 0x80..=0xff)
}
