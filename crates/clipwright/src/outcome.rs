//! Operation results reported to callers.

use serde::{Deserialize, Serialize};

use crate::error::EditError;
use crate::handle::SegmentHandle;
use crate::journal::Primitive;
use crate::primitives::Beat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Full,
    /// Succeeded, but the content ran out before the requested length.
    Capped,
    NoChange,
    Error,
}

impl Outcome {
    /// Classify a length change by what was actually achieved.
    pub fn classify(original: Beat, requested: Beat, achieved: Beat) -> Outcome {
        if !achieved.after(original) {
            Outcome::NoChange
        } else if achieved.before(requested) {
            Outcome::Capped
        } else {
            Outcome::Full
        }
    }
}

/// Error details carried by an `Outcome::Error` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Primitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub outcome: Outcome,
    /// Resulting segments in timeline order
    pub segments: Vec<SegmentHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_length: Option<Beat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_length: Option<Beat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl OperationResult {
    pub fn new(outcome: Outcome, segments: Vec<SegmentHandle>) -> Self {
        Self {
            outcome,
            segments,
            requested_length: None,
            achieved_length: None,
            error: None,
        }
    }

    pub fn with_lengths(mut self, requested: Beat, achieved: Beat) -> Self {
        self.requested_length = Some(requested);
        self.achieved_length = Some(achieved);
        self
    }

    /// Render an engine error for tool surfaces.
    pub fn failed(error: &EditError) -> Self {
        Self {
            outcome: Outcome::Error,
            segments: Vec::new(),
            requested_length: None,
            achieved_length: None,
            error: Some(OperationError {
                kind: error.kind().to_string(),
                message: error.to_string(),
                step: error.failed_step(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome != Outcome::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_classify() {
        assert_eq!(Outcome::classify(Beat(4.0), Beat(8.0), Beat(8.0)), Outcome::Full);
        assert_eq!(Outcome::classify(Beat(4.0), Beat(8.0), Beat(6.0)), Outcome::Capped);
        assert_eq!(Outcome::classify(Beat(4.0), Beat(8.0), Beat(4.0)), Outcome::NoChange);
    }

    #[test]
    fn test_failed_result_serializes_error() {
        let err = EditError::Store {
            step: Primitive::SetMarkers,
            completed: 2,
            source: StoreError::HostUnavailable,
        };
        let result = OperationResult::failed(&err);
        assert!(!result.is_success());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "error");
        assert_eq!(json["error"]["kind"], "store_error");
        assert_eq!(json["error"]["step"], "set_markers");
        assert!(json.get("requested_length").is_none());
    }
}
