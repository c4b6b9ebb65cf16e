//! The segment store seam.
//!
//! `SegmentStore` is the only boundary with the host timeline. Everything
//! the engine does is composed from these six primitives, whose semantics
//! are the host's, not ours:
//!
//! - Placing a segment over existing ones truncates them at the overlap
//!   boundary and discards everything past it. Nothing is ever split.
//! - Some segment kinds ignore extent changes made through markers.
//! - Duplicating a positioned segment onto a target another positioned
//!   segment overlaps takes the host down.

use serde::{Deserialize, Serialize};

use crate::primitives::{Beat, ContentRef, MarkerUpdate, SegmentId, SegmentProps, TrackId};

/// Host behavior the engine cannot infer from the primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Marker writes past the end of the content are clamped by the host.
    pub self_clamping: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            self_clamping: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    #[error("Segment not found: {0}")]
    NotFound(SegmentId),

    #[error("Segment reference is stale: {0}")]
    StaleReference(SegmentId),

    #[error("Host rejected the call: {reason}")]
    Rejected { reason: String },

    #[error("Host crashed: {reason}")]
    HostCrashed { reason: String },

    #[error("Host is unavailable")]
    HostUnavailable,
}

/// Timeline host primitives.
///
/// Implementations replicate their host's semantics; the engine works
/// around them rather than expecting them to be fixed.
pub trait SegmentStore {
    /// What the host does on its own when markers run past the content.
    fn capabilities(&self) -> HostCapabilities;

    /// Place fresh content at `[position, position + length)`.
    ///
    /// Existing segments under the new extent are truncated or discarded.
    fn create(
        &mut self,
        track: TrackId,
        position: Beat,
        length: Beat,
        content: &ContentRef,
    ) -> Result<SegmentId, StoreError>;

    /// Copy a segment, markers included, to `target` on the same track.
    fn duplicate(&mut self, source: &SegmentId, target: Beat) -> Result<SegmentId, StoreError>;

    fn delete(&mut self, id: &SegmentId) -> Result<(), StoreError>;

    /// Write the provided markers. Only resizable, non-looping segments
    /// change extent as a result.
    fn set_markers(&mut self, id: &SegmentId, update: &MarkerUpdate) -> Result<(), StoreError>;

    fn properties(&self, id: &SegmentId) -> Result<SegmentProps, StoreError>;

    /// Current segments on a track, ordered by start.
    fn list_segments(&self, track: TrackId) -> Result<Vec<SegmentId>, StoreError>;
}
