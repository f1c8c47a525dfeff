//! Rule set load errors

use super::PatchError;

/// Creates a malformed rule set error
pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> PatchError {
    PatchError::MalformedRuleSet {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a duplicate rule key error
pub fn duplicate_key(key: impl Into<String>) -> PatchError {
    PatchError::DuplicateRuleKey { key: key.into() }
}

/// Creates a no-op rule error
pub fn no_op(key: impl Into<String>) -> PatchError {
    PatchError::NoOpRule { key: key.into() }
}

/// Creates an empty match error
pub fn empty_match(key: impl Into<String>) -> PatchError {
    PatchError::EmptyMatch { key: key.into() }
}

/// Creates an invalid scope error
pub fn invalid_scope(
    key: impl Into<String>,
    scope: impl Into<String>,
    reason: impl Into<String>,
) -> PatchError {
    PatchError::InvalidScope {
        key: key.into(),
        scope: scope.into(),
        reason: reason.into(),
    }
}
