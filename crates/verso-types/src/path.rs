//! Slash-separated document paths.
//!
//! A path such as `orders/2024/q1` names the leaf `q1` inside folder
//! `orders/2024`. A single leading `/` is tolerated and ignored; every other
//! segment must be non-empty.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// A validated, non-empty document path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// Parse and validate a path string.
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        let trimmed = path.strip_prefix(SEPARATOR).unwrap_or(path);
        if trimmed.is_empty() {
            return Err(TypeError::InvalidPath {
                path: path.to_string(),
                reason: "path must not be empty".into(),
            });
        }
        let segments: Vec<String> = trimmed.split(SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TypeError::InvalidPath {
                path: path.to_string(),
                reason: "path segments must not be empty".into(),
            });
        }
        Ok(Self { segments })
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let joined = segments.join("/");
        if segments.is_empty() || segments.iter().any(|s| s.is_empty() || s.contains(SEPARATOR)) {
            return Err(TypeError::InvalidPath {
                path: joined,
                reason: "segments must be non-empty and contain no separator".into(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }

    /// The final segment (the document name within its folder).
    pub fn leaf(&self) -> &str {
        // Construction guarantees at least one segment.
        &self.segments[self.segments.len() - 1]
    }

    /// Folder segments leading to the leaf.
    pub fn folders(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Append a child segment.
    pub fn child(&self, name: &str) -> Result<Self, TypeError> {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self::from_segments(segments)
    }

    /// Whether this path starts with all segments of `prefix`.
    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for DocPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.to_string()
    }
}
