//! Core primitives for clipwright
//!
//! Time units, store identities, and the segment property record that every
//! engine component reads.
//!
//! Two coordinate spaces exist and never mix implicitly:
//! - `Beat` is absolute arrangement time.
//! - `ContentPos` is a position inside a segment's content.
//!
//! The only bridges are `SegmentProps::content_position` and
//! `SegmentProps::arrangement_position`.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::handle::SegmentKey;

/// Tolerance for comparing positions that went through float arithmetic.
pub const EPSILON: f64 = 1e-9;

// =============================================================================
// TIME TYPES
// =============================================================================

/// Arrangement time in beats (quarter notes)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
pub struct Beat(pub f64);

impl Beat {
    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn approx_eq(self, other: Beat) -> bool {
        (self.0 - other.0).abs() <= EPSILON
    }

    /// Strictly earlier, ignoring rounding noise.
    pub fn before(self, other: Beat) -> bool {
        self.0 < other.0 - EPSILON
    }

    /// Strictly later, ignoring rounding noise.
    pub fn after(self, other: Beat) -> bool {
        self.0 > other.0 + EPSILON
    }

    pub fn is_positive(self) -> bool {
        self.0 > EPSILON
    }

    pub fn max(self, other: Beat) -> Beat {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }

    pub fn min(self, other: Beat) -> Beat {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }
}

impl Add for Beat {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Beat(self.0 + rhs.0)
    }
}

impl Sub for Beat {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Beat((self.0 - rhs.0).max(0.0))
    }
}

impl fmt::Display for Beat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position inside a segment's content, in the content's own beats
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
pub struct ContentPos(pub f64);

impl ContentPos {
    /// Boundary reported for content that can be extended indefinitely.
    pub const UNBOUNDED: ContentPos = ContentPos(f64::MAX);

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn is_unbounded(self) -> bool {
        self.0 >= f64::MAX
    }

    pub fn approx_eq(self, other: ContentPos) -> bool {
        (self.0 - other.0).abs() <= EPSILON
    }

    /// Move forward through the content by an arrangement length.
    pub fn advanced_by(self, length: Beat) -> ContentPos {
        ContentPos(self.0 + length.0)
    }

    /// Content distance from `self` to a later position, as a length.
    pub fn distance_to(self, later: ContentPos) -> Beat {
        if later.is_unbounded() {
            return Beat(f64::MAX);
        }
        Beat((later.0 - self.0).max(0.0))
    }

    /// Fold a position into the loop region `[loop_start, loop_end)`.
    pub fn wrapped(self, loop_start: ContentPos, loop_end: ContentPos) -> ContentPos {
        let loop_len = loop_end.0 - loop_start.0;
        if loop_len <= EPSILON || loop_end.is_unbounded() {
            return self;
        }
        let mut rel = (self.0 - loop_start.0).rem_euclid(loop_len);
        if loop_len - rel <= EPSILON {
            rel = 0.0;
        }
        ContentPos(loop_start.0 + rel)
    }
}

impl fmt::Display for ContentPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "unbounded")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// =============================================================================
// IDENTITIES
// =============================================================================

/// Index of a track in the arrangement
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TrackId(pub usize);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}", self.0)
    }
}

/// Opaque store token for a segment.
///
/// Valid only until the next structural mutation on its track. Hold a
/// [`SegmentKey`] across mutations and reacquire. Equality ignores the
/// epoch: two ids name the same segment when their tokens match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentId {
    track: TrackId,
    token: u64,
    epoch: u64,
}

impl SegmentId {
    /// Store implementations mint tokens; the engine only passes them back.
    pub fn new(track: TrackId, token: u64, epoch: u64) -> Self {
        Self {
            track,
            token,
            epoch,
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl PartialEq for SegmentId {
    fn eq(&self, other: &Self) -> bool {
        self.track == other.track && self.token == other.token
    }
}

impl Eq for SegmentId {}

impl std::hash::Hash for SegmentId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.track.hash(state);
        self.token.hash(state);
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg:{}/{}@{}", self.track.0, self.token, self.epoch)
    }
}

/// Reference to the material a segment plays (a file hash, a pattern id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(pub String);

impl ContentRef {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    /// Blank content, used for the short-lived segments of an edge trim.
    pub fn scratch() -> Self {
        Self(String::new())
    }

    pub fn is_scratch(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scratch() {
            write!(f, "<scratch>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// =============================================================================
// SEGMENT PROPERTIES
// =============================================================================

/// Whether the host lets marker writes change a segment's extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    #[default]
    Resizable,
    ContentFixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Looping,
    #[default]
    NonLooping,
}

/// Content offset markers, all in content coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Markers {
    pub start: ContentPos,
    pub end: ContentPos,
    pub loop_start: ContentPos,
    pub loop_end: ContentPos,
}

/// A partial marker write. Fields left `None` are not touched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MarkerUpdate {
    pub start: Option<ContentPos>,
    pub end: Option<ContentPos>,
    pub loop_start: Option<ContentPos>,
    pub loop_end: Option<ContentPos>,
}

impl MarkerUpdate {
    pub fn with_start(mut self, start: ContentPos) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: ContentPos) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_loop(mut self, loop_start: ContentPos, loop_end: ContentPos) -> Self {
        self.loop_start = Some(loop_start);
        self.loop_end = Some(loop_end);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.end.is_none()
            && self.loop_start.is_none()
            && self.loop_end.is_none()
    }
}

/// Everything the store reports about one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProps {
    pub id: SegmentId,
    pub track: TrackId,
    pub kind: SegmentKind,
    pub looping: LoopState,
    pub start: Beat,
    pub end: Beat,
    pub markers: Markers,
    pub content: ContentRef,
}

impl SegmentProps {
    pub fn len(&self) -> Beat {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        !self.len().is_positive()
    }

    pub fn is_looping(&self) -> bool {
        self.looping == LoopState::Looping
    }

    /// Marker writes change the extent only for resizable, non-looping segments.
    pub fn resizable_in_place(&self) -> bool {
        self.kind == SegmentKind::Resizable && !self.is_looping()
    }

    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps(&self, start: Beat, end: Beat) -> bool {
        self.start.before(end) && start.before(self.end)
    }

    pub fn loop_length(&self) -> Beat {
        self.markers.loop_start.distance_to(self.markers.loop_end)
    }

    pub fn key(&self) -> SegmentKey {
        SegmentKey {
            track: self.track,
            start: self.start,
            content: self.content.clone(),
        }
    }

    /// Content position playing at arrangement time `at`.
    ///
    /// Looping segments wrap into the loop region. Times before the segment
    /// clamp to its start.
    pub fn content_position(&self, at: Beat) -> ContentPos {
        let raw = self.markers.start.advanced_by(at - self.start);
        if self.is_looping() {
            raw.wrapped(self.markers.loop_start, self.markers.loop_end)
        } else {
            raw
        }
    }

    /// Arrangement time at which `content` would play, on the unwrapped
    /// content line starting at this segment's start marker.
    pub fn arrangement_position(&self, content: ContentPos) -> Beat {
        self.start + self.markers.start.distance_to(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(looping: LoopState, start: f64, end: f64, markers: Markers) -> SegmentProps {
        SegmentProps {
            id: SegmentId::new(TrackId(0), 1, 0),
            track: TrackId(0),
            kind: SegmentKind::ContentFixed,
            looping,
            start: Beat(start),
            end: Beat(end),
            markers,
            content: ContentRef::new("loop.wav"),
        }
    }

    fn markers(start: f64, end: f64, loop_start: f64, loop_end: f64) -> Markers {
        Markers {
            start: ContentPos(start),
            end: ContentPos(end),
            loop_start: ContentPos(loop_start),
            loop_end: ContentPos(loop_end),
        }
    }

    #[test]
    fn test_beat_sub_saturates() {
        assert_eq!(Beat(2.0) - Beat(5.0), Beat(0.0));
        assert_eq!(Beat(5.0) - Beat(2.0), Beat(3.0));
    }

    #[test]
    fn test_beat_ordering_ignores_noise() {
        let a = Beat(1.0);
        let b = Beat(1.0 + EPSILON / 2.0);
        assert!(a.approx_eq(b));
        assert!(!a.before(b));
        assert!(!b.after(a));
        assert!(Beat(0.5).before(a));
    }

    #[test]
    fn test_wrap_into_loop() {
        let start = ContentPos(2.0);
        let end = ContentPos(6.0);
        assert_eq!(ContentPos(6.0).wrapped(start, end), ContentPos(2.0));
        assert_eq!(ContentPos(7.5).wrapped(start, end), ContentPos(3.5));
        assert_eq!(ContentPos(1.0).wrapped(start, end), ContentPos(5.0));
        assert_eq!(ContentPos(3.0).wrapped(start, end), ContentPos(3.0));
    }

    #[test]
    fn test_content_position_non_looping() {
        let p = props(LoopState::NonLooping, 8.0, 12.0, markers(1.0, 5.0, 0.0, 10.0));
        assert_eq!(p.content_position(Beat(8.0)), ContentPos(1.0));
        assert_eq!(p.content_position(Beat(11.0)), ContentPos(4.0));
        assert_eq!(p.content_position(Beat(12.0)), ContentPos(5.0));
        // Before the segment clamps to its start
        assert_eq!(p.content_position(Beat(2.0)), ContentPos(1.0));
    }

    #[test]
    fn test_content_position_looping_wraps() {
        let p = props(LoopState::Looping, 0.0, 4.0, markers(0.0, 4.0, 0.0, 4.0));
        assert_eq!(p.content_position(Beat(4.0)), ContentPos(0.0));
        assert_eq!(p.content_position(Beat(5.0)), ContentPos(1.0));

        let mid = props(LoopState::Looping, 10.0, 12.0, markers(3.0, 5.0, 0.0, 4.0));
        assert_eq!(mid.content_position(Beat(11.0)), ContentPos(0.0));
    }

    #[test]
    fn test_arrangement_position_inverts_non_looping_content() {
        let p = props(LoopState::NonLooping, 8.0, 12.0, markers(1.0, 5.0, 0.0, 10.0));
        let content = p.content_position(Beat(10.5));
        assert_eq!(p.arrangement_position(content), Beat(10.5));
        // The content boundary maps past the current end
        assert_eq!(p.arrangement_position(ContentPos(10.0)), Beat(17.0));
    }

    #[test]
    fn test_unbounded_distance() {
        assert!(ContentPos::UNBOUNDED.is_unbounded());
        assert_eq!(ContentPos(3.0).distance_to(ContentPos::UNBOUNDED), Beat(f64::MAX));
    }

    #[test]
    fn test_overlaps_is_half_open() {
        let p = props(LoopState::NonLooping, 4.0, 8.0, Markers::default());
        assert!(p.overlaps(Beat(7.0), Beat(9.0)));
        assert!(p.overlaps(Beat(0.0), Beat(5.0)));
        assert!(!p.overlaps(Beat(8.0), Beat(9.0)));
        assert!(!p.overlaps(Beat(0.0), Beat(4.0)));
    }

    #[test]
    fn test_marker_update_builder() {
        let update = MarkerUpdate::default()
            .with_start(ContentPos(1.0))
            .with_loop(ContentPos(0.0), ContentPos(4.0));
        assert_eq!(update.start, Some(ContentPos(1.0)));
        assert_eq!(update.end, None);
        assert!(!update.is_empty());
        assert!(MarkerUpdate::default().is_empty());
    }
}
