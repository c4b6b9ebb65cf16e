//! MemoryStore: deterministic in-memory timeline host.
//!
//! Replicates the host contract the engine has to work around, including
//! the parts that look like bugs:
//!
//! - Placing a segment truncates whatever it lands on. A segment that
//!   started earlier loses everything from the new start onward, even the
//!   part past the new segment's end. Nothing is ever split.
//! - Content-fixed and looping segments ignore extent changes made through
//!   markers.
//! - Any structural mutation expires every token issued for the track.
//! - Duplicating a positioned segment onto a target that another positioned
//!   segment overlaps crashes the host, and it stays down.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::primitives::{
    Beat, ContentPos, ContentRef, LoopState, MarkerUpdate, Markers, SegmentId, SegmentKind,
    SegmentProps, TrackId,
};
use crate::store::{HostCapabilities, SegmentStore, StoreError};

/// What the host knows about a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub kind: SegmentKind,
    pub looping: LoopState,
    /// Length of the material, or of one loop pass for looping content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_length: Option<Beat>,
}

impl ContentInfo {
    /// Blank or generated content with no end.
    pub fn unbounded() -> Self {
        Self {
            kind: SegmentKind::Resizable,
            looping: LoopState::NonLooping,
            natural_length: None,
        }
    }

    pub fn resizable(natural_length: Beat) -> Self {
        Self {
            kind: SegmentKind::Resizable,
            looping: LoopState::NonLooping,
            natural_length: Some(natural_length),
        }
    }

    pub fn fixed(natural_length: Beat) -> Self {
        Self {
            kind: SegmentKind::ContentFixed,
            looping: LoopState::NonLooping,
            natural_length: Some(natural_length),
        }
    }

    pub fn looping(kind: SegmentKind, loop_length: Beat) -> Self {
        Self {
            kind,
            looping: LoopState::Looping,
            natural_length: Some(loop_length),
        }
    }

    fn boundary(&self) -> ContentPos {
        self.natural_length
            .map(|len| ContentPos(len.0))
            .unwrap_or(ContentPos::UNBOUNDED)
    }
}

/// A segment to place directly, without overlap truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSeed {
    pub start: Beat,
    pub end: Beat,
    pub content: ContentRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<Markers>,
}

#[derive(Debug, Clone)]
struct StoredSegment {
    token: u64,
    kind: SegmentKind,
    looping: LoopState,
    start: Beat,
    end: Beat,
    markers: Markers,
    boundary: ContentPos,
    content: ContentRef,
}

impl StoredSegment {
    fn len(&self) -> Beat {
        self.end - self.start
    }

    fn overlaps(&self, start: Beat, end: Beat) -> bool {
        self.start.before(end) && start.before(self.end)
    }

    fn resizable_in_place(&self) -> bool {
        self.kind == SegmentKind::Resizable && self.looping == LoopState::NonLooping
    }

    fn content_after(&self, offset: Beat) -> ContentPos {
        let raw = self.markers.start.advanced_by(offset);
        match self.looping {
            LoopState::Looping => raw.wrapped(self.markers.loop_start, self.markers.loop_end),
            LoopState::NonLooping => raw,
        }
    }

    fn sync_end_marker(&mut self) {
        self.markers.end = self.markers.start.advanced_by(self.len());
    }

    fn props(&self, track: TrackId, epoch: u64) -> SegmentProps {
        SegmentProps {
            id: SegmentId::new(track, self.token, epoch),
            track,
            kind: self.kind,
            looping: self.looping,
            start: self.start,
            end: self.end,
            markers: self.markers,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TrackState {
    segments: Vec<StoredSegment>,
    epoch: u64,
}

impl TrackState {
    fn find(&self, id: &SegmentId) -> Result<usize, StoreError> {
        if id.epoch() != self.epoch {
            return Err(StoreError::StaleReference(*id));
        }
        self.segments
            .iter()
            .position(|s| s.token == id.token())
            .ok_or(StoreError::NotFound(*id))
    }

    /// Staged segments start strictly beyond every other segment's end.
    fn is_staged(&self, idx: usize) -> bool {
        let start = self.segments[idx].start;
        self.segments
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .all(|(_, other)| start.after(other.end))
    }

    fn structural_change(&mut self) {
        self.segments.sort_by(|a, b| a.start.0.total_cmp(&b.start.0));
        self.epoch += 1;
    }
}

fn mint(next_token: &mut u64) -> u64 {
    *next_token += 1;
    *next_token
}

/// Apply the host's overlap truncation for a new extent `[start, end)`.
///
/// Returns whether any existing segment was touched.
fn truncate_under(
    track: &mut TrackState,
    next_token: &mut u64,
    start: Beat,
    end: Beat,
    skip: Option<u64>,
) -> bool {
    let mut touched = false;
    let mut kept = Vec::with_capacity(track.segments.len());

    for mut seg in track.segments.drain(..) {
        if Some(seg.token) == skip || !seg.overlaps(start, end) {
            kept.push(seg);
            continue;
        }
        touched = true;

        if seg.start.before(start) {
            // Everything from `start` on is gone, including any part past `end`
            debug!(
                "truncating {} [{}, {}) to end at {}",
                seg.content, seg.start, seg.end, start
            );
            seg.end = start;
        } else if seg.end.after(end) {
            debug!(
                "truncating {} [{}, {}) to start at {}",
                seg.content, seg.start, seg.end, end
            );
            seg.markers.start = seg.content_after(end - seg.start);
            seg.start = end;
        } else {
            debug!("discarding {} [{}, {})", seg.content, seg.start, seg.end);
            continue;
        }

        seg.sync_end_marker();
        if seg.kind == SegmentKind::ContentFixed {
            seg.token = mint(next_token);
        }
        kept.push(seg);
    }

    track.segments = kept;
    touched
}

/// In-memory `SegmentStore`.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tracks: Vec<TrackState>,
    library: HashMap<ContentRef, ContentInfo>,
    capabilities: HostCapabilities,
    next_token: u64,
    crashed: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capabilities(HostCapabilities::default())
    }

    pub fn with_capabilities(capabilities: HostCapabilities) -> Self {
        Self {
            tracks: Vec::new(),
            library: HashMap::new(),
            capabilities,
            next_token: 0,
            crashed: false,
        }
    }

    pub fn add_track(&mut self) -> TrackId {
        self.tracks.push(TrackState::default());
        TrackId(self.tracks.len() - 1)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn register_content(
        &mut self,
        content: ContentRef,
        info: ContentInfo,
    ) -> Result<(), StoreError> {
        if content.is_scratch() {
            return Err(StoreError::Rejected {
                reason: "scratch content cannot be registered".to_string(),
            });
        }
        match info.natural_length {
            Some(len) if !len.is_positive() => {
                return Err(StoreError::Rejected {
                    reason: format!("content {} has non-positive length {}", content, len),
                });
            }
            None if info.looping == LoopState::Looping => {
                return Err(StoreError::Rejected {
                    reason: format!("looping content {} needs a loop length", content),
                });
            }
            _ => {}
        }
        self.library.insert(content, info);
        Ok(())
    }

    /// Registered info, or unbounded resizable content when unknown.
    pub fn content_info(&self, content: &ContentRef) -> ContentInfo {
        self.library
            .get(content)
            .copied()
            .unwrap_or_else(ContentInfo::unbounded)
    }

    /// Registered content, ordered by reference.
    pub fn contents(&self) -> Vec<(ContentRef, ContentInfo)> {
        let mut contents: Vec<_> = self
            .library
            .iter()
            .map(|(content, info)| (content.clone(), *info))
            .collect();
        contents.sort_by(|a, b| a.0.cmp(&b.0));
        contents
    }

    /// Place a segment exactly as given. Refuses to overlap anything.
    pub fn insert(&mut self, track: TrackId, seed: SegmentSeed) -> Result<SegmentId, StoreError> {
        self.ensure_alive()?;
        let info = self.content_info(&seed.content);
        let state = self
            .tracks
            .get_mut(track.0)
            .ok_or(StoreError::UnknownTrack(track))?;

        let length = seed.end - seed.start;
        if seed.start.0 < 0.0 || !length.is_positive() {
            return Err(StoreError::Rejected {
                reason: format!("invalid extent [{}, {})", seed.start, seed.end),
            });
        }
        if let Some(other) = state.segments.iter().find(|s| s.overlaps(seed.start, seed.end)) {
            return Err(StoreError::Rejected {
                reason: format!(
                    "[{}, {}) overlaps {} at [{}, {})",
                    seed.start, seed.end, other.content, other.start, other.end
                ),
            });
        }

        let markers = seed.markers.unwrap_or(Markers {
            start: ContentPos::zero(),
            end: ContentPos(length.0),
            loop_start: ContentPos::zero(),
            loop_end: info.boundary(),
        });
        let token = mint(&mut self.next_token);
        let mut segment = StoredSegment {
            token,
            kind: info.kind,
            looping: info.looping,
            start: seed.start,
            end: seed.end,
            markers,
            boundary: info.boundary(),
            content: seed.content,
        };
        segment.sync_end_marker();
        state.segments.push(segment);
        state.structural_change();
        Ok(SegmentId::new(track, token, state.epoch))
    }

    /// Properties of every segment on a track, ordered by start.
    pub fn segments(&self, track: TrackId) -> Result<Vec<SegmentProps>, StoreError> {
        self.ensure_alive()?;
        let state = self
            .tracks
            .get(track.0)
            .ok_or(StoreError::UnknownTrack(track))?;
        Ok(state
            .segments
            .iter()
            .map(|s| s.props(track, state.epoch))
            .collect())
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    fn ensure_alive(&self) -> Result<(), StoreError> {
        if self.crashed {
            Err(StoreError::HostUnavailable)
        } else {
            Ok(())
        }
    }
}

impl SegmentStore for MemoryStore {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn create(
        &mut self,
        track: TrackId,
        position: Beat,
        length: Beat,
        content: &ContentRef,
    ) -> Result<SegmentId, StoreError> {
        self.ensure_alive()?;
        if position.0 < 0.0 || !length.is_positive() {
            return Err(StoreError::Rejected {
                reason: format!("cannot create {} beats at {}", length, position),
            });
        }

        let info = self.content_info(content);
        let state = self
            .tracks
            .get_mut(track.0)
            .ok_or(StoreError::UnknownTrack(track))?;

        let length = match (info.looping, info.natural_length) {
            (LoopState::NonLooping, Some(natural)) => length.min(natural),
            _ => length,
        };
        let end = position + length;

        truncate_under(state, &mut self.next_token, position, end, None);

        let token = mint(&mut self.next_token);
        state.segments.push(StoredSegment {
            token,
            kind: info.kind,
            looping: info.looping,
            start: position,
            end,
            markers: Markers {
                start: ContentPos::zero(),
                end: ContentPos(length.0),
                loop_start: ContentPos::zero(),
                loop_end: info.boundary(),
            },
            boundary: info.boundary(),
            content: content.clone(),
        });
        state.structural_change();

        debug!("created {} at [{}, {}) on {}", content, position, end, track);
        Ok(SegmentId::new(track, token, state.epoch))
    }

    fn duplicate(&mut self, source: &SegmentId, target: Beat) -> Result<SegmentId, StoreError> {
        self.ensure_alive()?;
        if target.0 < 0.0 {
            return Err(StoreError::Rejected {
                reason: format!("cannot duplicate to negative position {}", target),
            });
        }

        let track = source.track();
        let state = self
            .tracks
            .get_mut(track.0)
            .ok_or(StoreError::UnknownTrack(track))?;
        let idx = state.find(source)?;
        let target_end = target + state.segments[idx].len();

        if !state.is_staged(idx) {
            let blocker = state
                .segments
                .iter()
                .enumerate()
                .find(|(i, s)| {
                    *i != idx && s.overlaps(target, target_end) && !state.is_staged(*i)
                })
                .map(|(_, s)| format!("{} at [{}, {})", s.content, s.start, s.end));

            if let Some(blocker) = blocker {
                let reason = format!(
                    "duplicated positioned {} onto [{}, {}) held by positioned {}",
                    state.segments[idx].content, target, target_end, blocker
                );
                warn!("host crash: {}", reason);
                self.crashed = true;
                return Err(StoreError::HostCrashed { reason });
            }
        }

        let mut copy = state.segments[idx].clone();
        truncate_under(state, &mut self.next_token, target, target_end, None);

        copy.token = mint(&mut self.next_token);
        copy.start = target;
        copy.end = target_end;
        let token = copy.token;
        debug!(
            "duplicated {} to [{}, {}) on {}",
            copy.content, target, target_end, track
        );
        state.segments.push(copy);
        state.structural_change();

        Ok(SegmentId::new(track, token, state.epoch))
    }

    fn delete(&mut self, id: &SegmentId) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let state = self
            .tracks
            .get_mut(id.track().0)
            .ok_or(StoreError::UnknownTrack(id.track()))?;
        let idx = state.find(id)?;
        let removed = state.segments.remove(idx);
        state.structural_change();
        debug!(
            "deleted {} at [{}, {})",
            removed.content, removed.start, removed.end
        );
        Ok(())
    }

    fn set_markers(&mut self, id: &SegmentId, update: &MarkerUpdate) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let self_clamping = self.capabilities.self_clamping;
        let state = self
            .tracks
            .get_mut(id.track().0)
            .ok_or(StoreError::UnknownTrack(id.track()))?;
        let idx = state.find(id)?;
        let seg = &state.segments[idx];

        let mut markers = seg.markers;
        if let Some(start) = update.start {
            markers.start = start;
        }
        if let Some(loop_start) = update.loop_start {
            markers.loop_start = loop_start;
        }
        if let Some(loop_end) = update.loop_end {
            markers.loop_end = loop_end;
        }
        if markers.start.0 < 0.0 {
            return Err(StoreError::Rejected {
                reason: format!("start marker {} is negative", markers.start),
            });
        }

        if !seg.resizable_in_place() {
            if seg.looping == LoopState::Looping {
                if !markers.loop_start.distance_to(markers.loop_end).is_positive() {
                    return Err(StoreError::Rejected {
                        reason: "loop end must follow loop start".to_string(),
                    });
                }
                if markers.start.0 < markers.loop_start.0 || markers.start.0 >= markers.loop_end.0
                {
                    return Err(StoreError::Rejected {
                        reason: format!(
                            "start marker {} outside loop [{}, {})",
                            markers.start, markers.loop_start, markers.loop_end
                        ),
                    });
                }
            }
            let seg = &mut state.segments[idx];
            seg.markers = markers;
            seg.sync_end_marker();
            return Ok(());
        }

        let mut end = update.end.unwrap_or(seg.markers.end);
        if self_clamping && !seg.boundary.is_unbounded() && end.0 > seg.boundary.0 {
            end = seg.boundary;
        }
        let length = markers.start.distance_to(end);
        if !length.is_positive() {
            return Err(StoreError::Rejected {
                reason: format!("end marker {} does not follow start {}", end, markers.start),
            });
        }
        markers.end = end;

        let token = seg.token;
        let old_end = seg.end;
        let new_end = seg.start + length;
        let touched = new_end.after(old_end)
            && truncate_under(state, &mut self.next_token, old_end, new_end, Some(token));

        let seg = state
            .segments
            .iter_mut()
            .find(|s| s.token == token)
            .ok_or(StoreError::NotFound(*id))?;
        seg.markers = markers;
        seg.end = new_end;
        if touched {
            state.structural_change();
        }
        Ok(())
    }

    fn properties(&self, id: &SegmentId) -> Result<SegmentProps, StoreError> {
        self.ensure_alive()?;
        let state = self
            .tracks
            .get(id.track().0)
            .ok_or(StoreError::UnknownTrack(id.track()))?;
        let idx = state.find(id)?;
        Ok(state.segments[idx].props(id.track(), state.epoch))
    }

    fn list_segments(&self, track: TrackId) -> Result<Vec<SegmentId>, StoreError> {
        self.ensure_alive()?;
        let state = self
            .tracks
            .get(track.0)
            .ok_or(StoreError::UnknownTrack(track))?;
        Ok(state
            .segments
            .iter()
            .map(|s| SegmentId::new(track, s.token, state.epoch))
            .collect())
    }
}
