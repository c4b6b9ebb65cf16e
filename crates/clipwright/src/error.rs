//! Engine errors.

use crate::handle::SegmentKey;
use crate::journal::Primitive;
use crate::primitives::Beat;
use crate::store::StoreError;

/// Why an edit did not complete.
///
/// `Store` failures leave the timeline at whatever step they stopped; the
/// caller must re-read the track. The validation variants are raised before
/// any mutation.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Store call {step} failed after {completed} completed calls: {source}")]
    Store {
        step: Primitive,
        completed: usize,
        source: StoreError,
    },

    #[error("Invalid split point {point}: {reason}")]
    InvalidSplitPoint { point: Beat, reason: String },

    #[error("Invalid range: {reason}")]
    InvalidRange { reason: String },

    #[error("No segment matches {key}")]
    StaleReference { key: SegmentKey },

    #[error("Verification failed: {reason}")]
    Verification { reason: String },
}

impl EditError {
    /// Short machine-readable name for tool surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            EditError::Store { .. } => "store_error",
            EditError::InvalidSplitPoint { .. } => "invalid_split_point",
            EditError::InvalidRange { .. } => "invalid_range",
            EditError::StaleReference { .. } => "stale_reference",
            EditError::Verification { .. } => "verification_failed",
        }
    }

    /// The primitive that failed, for store errors.
    pub fn failed_step(&self) -> Option<Primitive> {
        match self {
            EditError::Store { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub(crate) fn range(reason: impl Into<String>) -> Self {
        EditError::InvalidRange {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_names_step() {
        let err = EditError::Store {
            step: Primitive::Duplicate,
            completed: 3,
            source: StoreError::HostUnavailable,
        };
        assert_eq!(err.failed_step(), Some(Primitive::Duplicate));
        assert_eq!(err.kind(), "store_error");
        let message = err.to_string();
        assert!(message.contains("duplicate"));
        assert!(message.contains("3 completed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_errors_have_no_step() {
        let err = EditError::range("target length must be positive");
        assert_eq!(err.failed_step(), None);
        assert_eq!(err.kind(), "invalid_range");
    }
}
