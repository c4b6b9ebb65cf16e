//! Stable keys and validity-tagged segment handles.
//!
//! A `SegmentId` is a capability that expires on the next structural
//! mutation of its track. Callers hold a `SegmentHandle` instead, which
//! always carries the stable key and only sometimes a token still believed
//! fresh.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::primitives::{Beat, ContentRef, SegmentId, TrackId};

/// Stable key for finding a segment again: track, start, content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentKey {
    pub track: TrackId,
    pub start: Beat,
    pub content: ContentRef,
}

impl SegmentKey {
    pub fn new(track: TrackId, start: Beat, content: ContentRef) -> Self {
        Self {
            track,
            start,
            content,
        }
    }

    /// Same key with a different start, for segments that moved.
    pub fn at(&self, start: Beat) -> Self {
        Self {
            track: self.track,
            start,
            content: self.content.clone(),
        }
    }

    pub fn matches(&self, track: TrackId, start: Beat, content: &ContentRef) -> bool {
        self.track == track && self.start.approx_eq(start) && &self.content == content
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({})", self.track, self.start, self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SegmentHandle {
    Fresh { id: SegmentId, key: SegmentKey },
    Stale { key: SegmentKey },
}

impl SegmentHandle {
    pub fn fresh(id: SegmentId, key: SegmentKey) -> Self {
        SegmentHandle::Fresh { id, key }
    }

    pub fn key(&self) -> &SegmentKey {
        match self {
            SegmentHandle::Fresh { key, .. } | SegmentHandle::Stale { key } => key,
        }
    }

    /// The token, only while the handle is still fresh.
    pub fn id(&self) -> Option<SegmentId> {
        match self {
            SegmentHandle::Fresh { id, .. } => Some(*id),
            SegmentHandle::Stale { .. } => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, SegmentHandle::Fresh { .. })
    }

    /// Drop the token after a structural mutation.
    pub fn into_stale(self) -> Self {
        match self {
            SegmentHandle::Fresh { key, .. } | SegmentHandle::Stale { key } => {
                SegmentHandle::Stale { key }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SegmentKey {
        SegmentKey::new(TrackId(2), Beat(4.0), ContentRef::new("drums"))
    }

    #[test]
    fn test_into_stale_keeps_key() {
        let handle = SegmentHandle::fresh(SegmentId::new(TrackId(2), 7, 3), key());
        assert!(handle.is_fresh());
        assert!(handle.id().is_some());

        let stale = handle.into_stale();
        assert!(!stale.is_fresh());
        assert_eq!(stale.id(), None);
        assert_eq!(stale.key(), &key());
    }

    #[test]
    fn test_key_matching_tolerates_rounding() {
        let k = key();
        assert!(k.matches(TrackId(2), Beat(4.0 + 1e-12), &ContentRef::new("drums")));
        assert!(!k.matches(TrackId(1), Beat(4.0), &ContentRef::new("drums")));
        assert!(!k.matches(TrackId(2), Beat(4.5), &ContentRef::new("drums")));
        assert!(!k.matches(TrackId(2), Beat(4.0), &ContentRef::new("bass")));
    }

    #[test]
    fn test_key_at_moves_start() {
        let moved = key().at(Beat(12.0));
        assert_eq!(moved.start, Beat(12.0));
        assert_eq!(moved.content, ContentRef::new("drums"));
    }
}
