//! Provenance persistence errors

use super::PatchError;

/// Creates a provenance persist failed error
pub fn persist_failed(path: impl Into<String>, reason: impl ToString) -> PatchError {
    PatchError::ProvenancePersistFailed {
        path: path.into(),
        reason: reason.to_string(),
    }
}
