//! Subject naming rules and wildcard matching.
//!
//! Subjects are dot-delimited tokens (`orders.cancel.eu`). Subscription
//! patterns may also use `*` to match exactly one token and a trailing `>`
//! to match one or more remaining tokens.

use crate::error::{MonitorError, Result};

/// Token separator.
pub const SEPARATOR: char = '.';

/// Matches exactly one token.
pub const SINGLE_WILDCARD: &str = "*";

/// Matches one or more trailing tokens.
pub const TAIL_WILDCARD: &str = ">";

/// Pattern matching every subject.
pub const ALL_SUBJECTS: &str = ">";

/// Split a subject or pattern into tokens.
pub fn tokens(subject: &str) -> impl Iterator<Item = &str> {
    subject.split(SEPARATOR)
}

/// Check that a concrete subject can be published.
pub fn validate_subject(subject: &str) -> Result<()> {
    if subject.is_empty() {
        return Err(MonitorError::InvalidSubject(subject.to_string()));
    }
    for token in tokens(subject) {
        if token.is_empty() || token == SINGLE_WILDCARD || token == TAIL_WILDCARD {
            return Err(MonitorError::InvalidSubject(subject.to_string()));
        }
    }
    Ok(())
}

/// Check that a subscription pattern is well formed.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(MonitorError::InvalidSubject(pattern.to_string()));
    }
    let parts: Vec<&str> = tokens(pattern).collect();
    let last = parts.len() - 1;
    for (i, token) in parts.iter().enumerate() {
        if token.is_empty() || (*token == TAIL_WILDCARD && i != last) {
            return Err(MonitorError::InvalidSubject(pattern.to_string()));
        }
    }
    Ok(())
}

/// Whether `subject` is matched by `pattern`.
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = tokens(pattern);
    let mut subject_tokens = tokens(subject);

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(TAIL_WILDCARD), Some(_)) => return true,
            (Some(SINGLE_WILDCARD), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Prefix string for a navigation path: `"a.b."`, or `""` at the root.
pub fn path_prefix<S: AsRef<str>>(path: &[S]) -> String {
    let mut prefix = String::new();
    for token in path {
        prefix.push_str(token.as_ref());
        prefix.push(SEPARATOR);
    }
    prefix
}
