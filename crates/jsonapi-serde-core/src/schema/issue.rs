// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Validation issues and the aggregate [`ValidationError`].

use std::fmt;

use thiserror::Error;

/// One step of an issue path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member name.
    Key(String),
    /// Array position.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Overrides attached to a custom issue that shape the resulting error object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueParams {
    /// Error code replacing the issue code.
    pub code: String,
    /// Optional detailed explanation.
    pub detail: Option<String>,
    /// Optional HTTP status (e.g. 409).
    pub status: Option<u16>,
}

impl IssueParams {
    /// Params with only a code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: None,
            status: None,
        }
    }

    /// Attach a detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach an HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// A single validation failure located by `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Machine-readable code (`invalid_type`, `invalid_value`, `custom`, ...).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Location of the offending value, outermost segment first.
    pub path: Vec<PathSegment>,
    /// Overrides for custom issues.
    pub params: Option<IssueParams>,
}

impl Issue {
    /// Issue at the root path.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: Vec::new(),
            params: None,
        }
    }

    /// `invalid_type` issue for `expected`, given the received kind.
    pub fn invalid_type(expected: &str, received: &str) -> Self {
        Self::new(
            "invalid_type",
            format!("Invalid input: expected {expected}, received {received}"),
        )
    }

    /// `custom` issue carrying error-object overrides.
    pub fn custom(message: impl Into<String>, params: IssueParams) -> Self {
        Self {
            params: Some(params),
            ..Self::new("custom", message)
        }
    }

    /// Prepend `segment` to the path.
    pub fn at(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    /// Prepend all of `root` to the path.
    pub fn rooted(mut self, root: &[PathSegment]) -> Self {
        let mut path = root.to_vec();
        path.append(&mut self.path);
        self.path = path;
        self
    }
}

/// A structured validation failure listing every issue found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", summarize(.issues))]
pub struct ValidationError {
    issues: Vec<Issue>,
}

fn summarize(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|issue| {
            let path = issue
                .path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            format!("[{path}] {}", issue.message)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Wrap a list of issues.
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// All issues, in discovery order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Consume and return the issues.
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    /// Re-root every issue under `root` (e.g. `["included", 3]`).
    pub fn prefixed(self, root: &[PathSegment]) -> Self {
        Self {
            issues: self
                .issues
                .into_iter()
                .map(|issue| issue.rooted(root))
                .collect(),
        }
    }
}

impl From<Vec<Issue>> for ValidationError {
    fn from(issues: Vec<Issue>) -> Self {
        Self::new(issues)
    }
}
