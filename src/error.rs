//! Error types for the stream routing engine.

use std::fmt;

pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors raised while compiling stream rules into an engine.
///
/// These only ever surface during engine construction. The routing path
/// (`match_message`, `test_match`) never returns an error; every failure
/// there degrades to a non-match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A rule carries a type outside the recognized set.
    UnknownRuleType(String),
    /// A regex rule's pattern failed to compile.
    InvalidRegex(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::UnknownRuleType(field) => {
                write!(f, "Unknown stream rule type on field: {field}")
            }
            RouterError::InvalidRegex(msg) => write!(f, "Invalid regex pattern: {msg}"),
        }
    }
}

impl std::error::Error for RouterError {}
