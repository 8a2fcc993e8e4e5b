//! Perspective and tag name validation.
//!
//! Valid names:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..`
//! - Must not start or end with `.` or `/`
//! - Must not contain consecutive slashes (`//`)

use crate::error::{RefError, Result};

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a perspective name.
///
/// ```
/// use verso_refs::names::validate_perspective_name;
///
/// assert!(validate_perspective_name("main").is_ok());
/// assert!(validate_perspective_name("team/reporting").is_ok());
/// assert!(validate_perspective_name("").is_err());
/// assert!(validate_perspective_name("bad..name").is_err());
/// ```
pub fn validate_perspective_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }
    if name.contains("//") {
        return Err(invalid(name, "must not contain '//'"));
    }
    Ok(())
}

/// Validate a tag name. Same rules as perspective names.
pub fn validate_tag_name(name: &str) -> Result<()> {
    validate_perspective_name(name)
}
