//! Editor - lengthen, shorten, move, and combined edits.
//!
//! The editor owns the store and is the only code that calls it. Every
//! primitive goes through a journaled wrapper so failures name the step
//! that broke and how far the operation got.
//!
//! Tokens are never trusted across a structural mutation. Each step
//! resolves the segments it needs by stable key, right before using them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EditError;
use crate::handle::{SegmentHandle, SegmentKey};
use crate::journal::{Journal, Primitive};
use crate::outcome::{OperationResult, Outcome};
use crate::primitives::{Beat, ContentRef, MarkerUpdate, SegmentId, SegmentProps, TrackId};
use crate::store::{SegmentStore, StoreError};

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Gap left between real content and the holding area
    pub holding_margin: Beat,
    /// Length of the throwaway segment used to find a content boundary
    pub probe_length: Beat,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            holding_margin: Beat(4.0),
            probe_length: Beat(0.25),
        }
    }
}

impl EditorConfig {
    pub fn from_conf(conf: &clipconf::ClipConfig) -> Self {
        Self {
            holding_margin: Beat(conf.editor.holding_margin),
            probe_length: Beat(conf.editor.probe_length),
        }
    }

    /// Replace values the engine cannot work with by their defaults.
    ///
    /// A holding copy must start strictly after every real segment, so the
    /// margin has to be positive. So does the probe, or the host rejects it.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let usable = |b: Beat| b.is_positive() && b.0.is_finite();

        let holding_margin = if usable(self.holding_margin) {
            self.holding_margin
        } else {
            warn!(
                "holding margin {} is not positive, using {}",
                self.holding_margin, defaults.holding_margin
            );
            defaults.holding_margin
        };
        let probe_length = if usable(self.probe_length) {
            self.probe_length
        } else {
            warn!(
                "probe length {} is not positive, using {}",
                self.probe_length, defaults.probe_length
            );
            defaults.probe_length
        };

        Self {
            holding_margin,
            probe_length,
        }
    }
}

/// A move and/or length change applied as one edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Beat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Beat>,
}

pub struct Editor<S: SegmentStore> {
    pub(crate) store: S,
    pub(crate) config: EditorConfig,
    journal: Journal,
    pub(crate) clear_overlaps: bool,
    operation_start: u64,
}

impl<S: SegmentStore> Editor<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EditorConfig::default())
    }

    pub fn with_config(store: S, config: EditorConfig) -> Self {
        Self {
            store,
            config: config.normalized(),
            journal: Journal::default(),
            clear_overlaps: true,
            operation_start: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Skip overlap clearing before positioned duplications.
    ///
    /// Only for regression tests that need to see what the host does
    /// without the workaround.
    #[cfg(test)]
    pub(crate) fn disable_overlap_clearing(&mut self) {
        self.clear_overlaps = false;
    }

    // === Store calls ===

    pub(crate) fn begin_operation(&mut self) {
        self.operation_start = self.journal.latest_seq();
    }

    /// Primitive calls made so far in the current operation.
    fn completed(&self) -> usize {
        (self.journal.latest_seq() - self.operation_start) as usize
    }

    fn call<T>(
        &mut self,
        primitive: Primitive,
        track: TrackId,
        detail: String,
        f: impl FnOnce(&mut S) -> Result<T, StoreError>,
    ) -> Result<T, EditError> {
        let completed = self.completed();
        debug!("{} on {}: {}", primitive, track, detail);
        self.journal.record(primitive, track, detail);

        f(&mut self.store).map_err(|source| {
            warn!(
                "{} failed after {} completed calls: {}",
                primitive, completed, source
            );
            EditError::Store {
                step: primitive,
                completed,
                source,
            }
        })
    }

    pub(crate) fn store_create(
        &mut self,
        track: TrackId,
        position: Beat,
        length: Beat,
        content: &ContentRef,
    ) -> Result<SegmentId, EditError> {
        self.call(
            Primitive::Create,
            track,
            format!("{} for {} at {}", content, length, position),
            |store| store.create(track, position, length, content),
        )
    }

    pub(crate) fn store_duplicate(
        &mut self,
        source: &SegmentId,
        target: Beat,
    ) -> Result<SegmentId, EditError> {
        self.call(
            Primitive::Duplicate,
            source.track(),
            format!("{} to {}", source, target),
            |store| store.duplicate(source, target),
        )
    }

    pub(crate) fn store_delete(&mut self, id: &SegmentId) -> Result<(), EditError> {
        self.call(Primitive::Delete, id.track(), id.to_string(), |store| {
            store.delete(id)
        })
    }

    pub(crate) fn store_set_markers(
        &mut self,
        id: &SegmentId,
        update: &MarkerUpdate,
    ) -> Result<(), EditError> {
        self.call(
            Primitive::SetMarkers,
            id.track(),
            format!("{} {:?}", id, update),
            |store| store.set_markers(id, update),
        )
    }

    pub(crate) fn store_properties(&mut self, id: &SegmentId) -> Result<SegmentProps, EditError> {
        self.call(Primitive::Properties, id.track(), id.to_string(), |store| {
            store.properties(id)
        })
    }

    pub(crate) fn store_list(&mut self, track: TrackId) -> Result<Vec<SegmentId>, EditError> {
        self.call(Primitive::ListSegments, track, String::new(), |store| {
            store.list_segments(track)
        })
    }

    // === Resolution ===

    /// Current properties of every segment on a track, in timeline order.
    pub(crate) fn segments_on(&mut self, track: TrackId) -> Result<Vec<SegmentProps>, EditError> {
        let ids = self.store_list(track)?;
        let mut segments = Vec::with_capacity(ids.len());
        for id in &ids {
            segments.push(self.store_properties(id)?);
        }
        Ok(segments)
    }

    /// Find a segment by stable key.
    pub(crate) fn resolve(&mut self, key: &SegmentKey) -> Result<SegmentProps, EditError> {
        self.segments_on(key.track)?
            .into_iter()
            .find(|s| key.matches(s.track, s.start, &s.content))
            .ok_or_else(|| EditError::StaleReference { key: key.clone() })
    }

    /// Properties for a caller's handle.
    ///
    /// A fresh token is tried first. If the host reports it stale, the
    /// segment is found again by key.
    pub(crate) fn reacquire(&mut self, handle: &SegmentHandle) -> Result<SegmentProps, EditError> {
        if let Some(id) = handle.id() {
            let completed = self.completed();
            self.journal
                .record(Primitive::Properties, id.track(), id.to_string());
            match self.store.properties(&id) {
                Ok(props) if props.key() == *handle.key() => return Ok(props),
                Ok(_) | Err(StoreError::StaleReference(_)) | Err(StoreError::NotFound(_)) => {
                    debug!("token {} expired, resolving {} by key", id, handle.key());
                }
                Err(source) => {
                    return Err(EditError::Store {
                        step: Primitive::Properties,
                        completed,
                        source,
                    })
                }
            }
        }
        self.resolve(handle.key())
    }

    /// Fresh handle for the segment starting at `at` on `track`.
    pub fn locate(&mut self, track: TrackId, at: Beat) -> Result<SegmentHandle, EditError> {
        self.begin_operation();
        self.segments_on(track)?
            .into_iter()
            .find(|s| s.start.approx_eq(at))
            .map(|s| fresh(&s))
            .ok_or_else(|| EditError::range(format!("no segment starts at {} on {}", at, track)))
    }

    /// Fresh handles for every segment inside `[start, end)`.
    pub(crate) fn handles_within(
        &mut self,
        track: TrackId,
        start: Beat,
        end: Beat,
    ) -> Result<Vec<SegmentHandle>, EditError> {
        Ok(self
            .segments_on(track)?
            .iter()
            .filter(|s| !s.start.before(start) && !s.end.after(end))
            .map(fresh)
            .collect())
    }

    // === Orchestrators ===

    /// Grow a segment to `target` beats.
    #[tracing::instrument(skip(self), fields(key = %handle.key()))]
    pub fn lengthen(
        &mut self,
        handle: &SegmentHandle,
        target: Beat,
    ) -> Result<OperationResult, EditError> {
        self.begin_operation();
        if !target.is_positive() || !target.0.is_finite() {
            return Err(EditError::range(format!(
                "target length {} must be positive",
                target
            )));
        }

        let seg = self.reacquire(handle)?;
        let original = seg.len();
        if !target.after(original) {
            info!("lengthen: {} already spans {}", seg.key(), original);
            return Ok(OperationResult::new(Outcome::NoChange, vec![fresh(&seg)])
                .with_lengths(target, original));
        }

        let result = if seg.resizable_in_place() {
            if self.store.capabilities().self_clamping {
                self.lengthen_by_markers(&seg, target)?
            } else {
                self.lengthen_probed(&seg, target)?
            }
        } else {
            self.tile(&seg, target)?
        };

        report("lengthen", &seg, &result);
        Ok(result)
    }

    /// Write the new end marker and let the host clamp it.
    fn lengthen_by_markers(
        &mut self,
        seg: &SegmentProps,
        target: Beat,
    ) -> Result<OperationResult, EditError> {
        let end = seg.markers.start.advanced_by(target);
        self.store_set_markers(&seg.id, &MarkerUpdate::default().with_end(end))?;

        let after = self.resolve(&seg.key())?;
        let achieved = after.len();
        Ok(
            OperationResult::new(Outcome::classify(seg.len(), target, achieved), vec![fresh(&after)])
                .with_lengths(target, achieved),
        )
    }

    /// Probe the content boundary first, since this host writes markers
    /// past the end of the material without complaint.
    fn lengthen_probed(
        &mut self,
        seg: &SegmentProps,
        target: Beat,
    ) -> Result<OperationResult, EditError> {
        let original = seg.len();
        let boundary = self.probe_content_boundary(seg.track, &seg.content)?;
        let achievable = target.min(seg.markers.start.distance_to(boundary));

        if !achievable.after(original) {
            debug!("skip: no content past {}", seg.markers.end);
            return Ok(OperationResult::new(Outcome::NoChange, vec![fresh(seg)])
                .with_lengths(target, original));
        }
        if achievable.before(target) {
            debug!("cap: content boundary at {}", boundary);
        } else {
            debug!("proceed: content reaches {}", boundary);
        }

        let key = seg.key();
        self.clear_range(seg.track, seg.end, seg.start + achievable)?;
        let current = self.resolve(&key)?;
        let end = current.markers.start.advanced_by(achievable);
        self.store_set_markers(&current.id, &MarkerUpdate::default().with_end(end))?;

        let after = self.resolve(&key)?;
        let achieved = after.len();
        Ok(
            OperationResult::new(Outcome::classify(original, target, achieved), vec![fresh(&after)])
                .with_lengths(target, achieved),
        )
    }

    /// Cut a segment down to `target` beats from its trailing edge.
    #[tracing::instrument(skip(self), fields(key = %handle.key()))]
    pub fn shorten(
        &mut self,
        handle: &SegmentHandle,
        target: Beat,
    ) -> Result<OperationResult, EditError> {
        self.begin_operation();
        if !target.is_positive() || !target.0.is_finite() {
            return Err(EditError::range(format!(
                "target length {} must be positive",
                target
            )));
        }

        let seg = self.reacquire(handle)?;
        let original = seg.len();
        if !target.before(original) {
            info!("shorten: {} already within {}", seg.key(), target);
            return Ok(OperationResult::new(Outcome::NoChange, vec![fresh(&seg)])
                .with_lengths(target, original));
        }

        let key = self.trim_right(&seg.key(), seg.start + target)?;
        let after = self.resolve(&key)?;
        let achieved = after.len();
        let result = OperationResult::new(Outcome::Full, vec![fresh(&after)])
            .with_lengths(target, achieved);

        report("shorten", &seg, &result);
        Ok(result)
    }

    /// Move a segment so it starts at `position`.
    #[tracing::instrument(skip(self), fields(key = %handle.key()))]
    pub fn move_to(
        &mut self,
        handle: &SegmentHandle,
        position: Beat,
    ) -> Result<OperationResult, EditError> {
        self.begin_operation();
        if position.0 < 0.0 || !position.0.is_finite() {
            return Err(EditError::range(format!(
                "position {} is before the start of the arrangement",
                position
            )));
        }

        let seg = self.reacquire(handle)?;
        if seg.start.approx_eq(position) {
            info!("move: {} already at {}", seg.key(), position);
            return Ok(OperationResult::new(Outcome::NoChange, vec![fresh(&seg)]));
        }

        let key = seg.key();
        let target_end = position + seg.len();
        let moved_key = if seg.overlaps(position, target_end) {
            // Landing on itself would truncate the source mid-copy
            let staged = self.stage_copy(&key, target_end)?;
            let original = self.resolve(&key)?;
            self.store_delete(&original.id)?;
            self.place_staged(&staged, position)?
        } else {
            let moved_key = self.duplicate_positioned(&key, position)?;
            self.verify_copy(&moved_key, seg.len())?;
            let original = self.resolve(&key)?;
            self.store_delete(&original.id)?;
            moved_key
        };

        let moved = self.verify_copy(&moved_key, seg.len())?;
        let result = OperationResult::new(Outcome::Full, vec![fresh(&moved)]);
        info!(
            "move: {} now at [{}, {})",
            seg.content, moved.start, moved.end
        );
        Ok(result)
    }

    fn verify_copy(&mut self, key: &SegmentKey, length: Beat) -> Result<SegmentProps, EditError> {
        let copy = match self.resolve(key) {
            Ok(copy) => copy,
            Err(EditError::StaleReference { .. }) => {
                warn!("verification: nothing at {}", key);
                return Err(EditError::Verification {
                    reason: format!("no copy found at {}", key),
                });
            }
            Err(e) => return Err(e),
        };
        if !copy.len().approx_eq(length) {
            warn!(
                "verification: copy at {} spans {}, expected {}",
                key,
                copy.len(),
                length
            );
            return Err(EditError::Verification {
                reason: format!(
                    "copy at {} spans {} beats, expected {}",
                    key,
                    copy.len(),
                    length
                ),
            });
        }
        Ok(copy)
    }

    /// Move first, then change length from the new position.
    pub fn apply(
        &mut self,
        handle: &SegmentHandle,
        request: EditRequest,
    ) -> Result<OperationResult, EditError> {
        let mut handle = handle.clone();
        let mut moved = None;

        if let Some(position) = request.position {
            let result = self.move_to(&handle, position)?;
            if let Some(first) = result.segments.first() {
                handle = first.clone();
            }
            moved = Some(result);
        }

        if let Some(length) = request.length {
            let current = self.reacquire(&handle)?.len();
            return if length.after(current) {
                self.lengthen(&handle, length)
            } else {
                self.shorten(&handle, length)
            };
        }

        moved.ok_or_else(|| EditError::range("edit names neither a position nor a length"))
    }
}

pub(crate) fn fresh(props: &SegmentProps) -> SegmentHandle {
    SegmentHandle::fresh(props.id, props.key())
}

fn report(operation: &str, seg: &SegmentProps, result: &OperationResult) {
    let requested = result.requested_length.unwrap_or_default();
    let achieved = result.achieved_length.unwrap_or_default();
    match result.outcome {
        Outcome::Capped => warn!(
            "{}: {} capped at {} of {} requested beats",
            operation,
            seg.key(),
            achieved,
            requested
        ),
        outcome => info!(
            "{}: {} {:?}, {} segment(s), {} beats",
            operation,
            seg.key(),
            outcome,
            result.segments.len(),
            achieved
        ),
    }
}
