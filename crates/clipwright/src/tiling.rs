//! Tiling: building a longer span out of fixed-length pieces.
//!
//! Content-fixed and looping segments cannot be stretched with markers, so
//! lengthening them lays copies end to end after the original. Partial
//! pieces are cut in the holding area first, never by letting a full tile
//! overrun and trimming it in place.
//!
//! Offsets inside the loop stay in content coordinates; tile positions
//! stay in beats. `SegmentProps::content_position` is the only bridge.

use tracing::debug;

use crate::editor::{fresh, Editor};
use crate::error::EditError;
use crate::handle::SegmentKey;
use crate::outcome::{OperationResult, Outcome};
use crate::primitives::{Beat, ContentPos, MarkerUpdate, SegmentProps};
use crate::store::SegmentStore;

/// Where the tiles go and where the holding area must stay clear of.
struct Span {
    cursor: Beat,
    floor: Beat,
}

impl<S: SegmentStore> Editor<S> {
    /// Lengthen `seg` to `target` by tiling.
    pub(crate) fn tile(
        &mut self,
        seg: &SegmentProps,
        target: Beat,
    ) -> Result<OperationResult, EditError> {
        if seg.is_looping() {
            let loop_length = seg.loop_length();
            if !loop_length.is_positive() {
                return Err(EditError::range(format!(
                    "{} has an empty loop region",
                    seg.key()
                )));
            }
            if target.before(loop_length) {
                self.expose_sub_loop(seg, target)
            } else {
                self.fill_loops(seg, target, loop_length)
            }
        } else {
            self.fill_content(seg, target)
        }
    }

    /// Tiles that walk through the loop a segment-length at a time, each
    /// starting where the previous one left off.
    fn expose_sub_loop(
        &mut self,
        seg: &SegmentProps,
        target: Beat,
    ) -> Result<OperationResult, EditError> {
        let key = seg.key();
        let tile_length = seg.len();
        let mut span = Span {
            cursor: seg.end,
            floor: seg.start + target,
        };
        let mut content = seg.content_position(seg.end);

        while span.cursor.before(span.floor) {
            let piece = (span.floor - span.cursor).min(tile_length);
            debug!(
                "sub-loop tile at {} for {} from content {}",
                span.cursor, piece, content
            );
            self.lay_tile(&key, Some(content), piece, tile_length, &mut span)?;
            content = content
                .advanced_by(piece)
                .wrapped(seg.markers.loop_start, seg.markers.loop_end);
        }

        self.tiled_result(seg, target, span.cursor)
    }

    /// Whole loop passes back to back, with partial passes at either end.
    fn fill_loops(
        &mut self,
        seg: &SegmentProps,
        target: Beat,
        loop_length: Beat,
    ) -> Result<OperationResult, EditError> {
        let key = seg.key();
        let mut span = Span {
            cursor: seg.end,
            floor: seg.start + target,
        };

        let aligned = seg.len().approx_eq(loop_length)
            && seg.markers.start.approx_eq(seg.markers.loop_start);
        let template = if aligned {
            key.clone()
        } else {
            self.loop_template(seg, loop_length, span.floor)?
        };

        // Finish the pass the original stops in the middle of
        let phase = seg.content_position(seg.end);
        if !phase.approx_eq(seg.markers.loop_start) {
            let head = phase
                .distance_to(seg.markers.loop_end)
                .min(span.floor - span.cursor);
            debug!("head tile at {} for {} from content {}", span.cursor, head, phase);
            self.lay_tile(&template, Some(phase), head, loop_length, &mut span)?;
        }

        while span.cursor.before(span.floor) {
            let piece = (span.floor - span.cursor).min(loop_length);
            debug!("loop tile at {} for {}", span.cursor, piece);
            self.lay_tile(&template, None, piece, loop_length, &mut span)?;
        }

        if !aligned {
            let leftover = self.resolve(&template)?;
            self.store_delete(&leftover.id)?;
        }

        self.tiled_result(seg, target, span.cursor)
    }

    /// Non-looping content-fixed material: continue through the content
    /// until the target or the end of the material, whichever comes first.
    fn fill_content(
        &mut self,
        seg: &SegmentProps,
        target: Beat,
    ) -> Result<OperationResult, EditError> {
        let original = seg.len();
        let boundary = self.probe_content_boundary(seg.track, &seg.content)?;
        let achievable = target.min(seg.markers.start.distance_to(boundary));

        if !achievable.after(original) {
            debug!("no content past {} in {}", seg.markers.end, seg.content);
            return Ok(OperationResult::new(Outcome::NoChange, vec![fresh(seg)])
                .with_lengths(target, original));
        }

        let key = seg.key();
        let mut span = Span {
            cursor: seg.end,
            floor: seg.start + achievable,
        };
        while span.cursor.before(span.floor) {
            let content = seg.content_position(span.cursor);
            let piece = (span.floor - span.cursor).min(original);
            debug!(
                "content tile at {} for {} from content {}",
                span.cursor, piece, content
            );
            self.lay_tile(&key, Some(content), piece, original, &mut span)?;
        }

        self.tiled_result(seg, target, span.cursor)
    }

    /// Place one tile copied from `template` at the span cursor.
    ///
    /// Full-length tiles are duplicated straight into place. Shorter ones
    /// are cut in the holding area and then placed.
    fn lay_tile(
        &mut self,
        template: &SegmentKey,
        content: Option<ContentPos>,
        piece: Beat,
        template_length: Beat,
        span: &mut Span,
    ) -> Result<(), EditError> {
        if piece.before(template_length) {
            let staged = self.stage_copy(template, span.floor)?;
            if let Some(content) = content {
                let copy = self.resolve(&staged)?;
                self.store_set_markers(&copy.id, &MarkerUpdate::default().with_start(content))?;
            }
            self.trim_right(&staged, staged.start + piece)?;
            self.place_staged(&staged, span.cursor)?;
        } else {
            let placed = self.duplicate_positioned(template, span.cursor)?;
            if let Some(content) = content {
                let tile = self.resolve(&placed)?;
                self.store_set_markers(&tile.id, &MarkerUpdate::default().with_start(content))?;
            }
        }
        span.cursor = span.cursor + piece;
        Ok(())
    }

    /// One aligned loop pass in the holding area, used as the tile source.
    fn loop_template(
        &mut self,
        seg: &SegmentProps,
        loop_length: Beat,
        floor: Beat,
    ) -> Result<SegmentKey, EditError> {
        let holding = self.reserve_holding_after(seg.track, floor)?;
        let id = self.store_create(seg.track, holding, loop_length, &seg.content)?;
        self.store_set_markers(
            &id,
            &MarkerUpdate::default()
                .with_loop(seg.markers.loop_start, seg.markers.loop_end)
                .with_start(seg.markers.loop_start),
        )?;
        debug!("loop template for {} at {}", seg.content, holding);
        Ok(SegmentKey::new(seg.track, holding, seg.content.clone()))
    }

    fn tiled_result(
        &mut self,
        seg: &SegmentProps,
        target: Beat,
        end: Beat,
    ) -> Result<OperationResult, EditError> {
        let segments = self.handles_within(seg.track, seg.start, end)?;
        let achieved = end - seg.start;
        Ok(
            OperationResult::new(Outcome::classify(seg.len(), target, achieved), segments)
                .with_lengths(target, achieved),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::Editor;
    use crate::journal::Primitive;
    use crate::memory::{ContentInfo, MemoryStore, SegmentSeed};
    use crate::outcome::Outcome;
    use crate::primitives::{Beat, ContentPos, ContentRef, Markers, SegmentKind, TrackId};

    fn editor_with(
        info: ContentInfo,
        segments: &[(f64, f64, Option<Markers>)],
    ) -> (Editor<MemoryStore>, TrackId) {
        let mut store = MemoryStore::new();
        let track = store.add_track();
        store
            .register_content(ContentRef::new("loop"), info)
            .unwrap();
        for (start, end, markers) in segments {
            store
                .insert(
                    track,
                    SegmentSeed {
                        start: Beat(*start),
                        end: Beat(*end),
                        content: ContentRef::new("loop"),
                        markers: *markers,
                    },
                )
                .unwrap();
        }
        (Editor::new(store), track)
    }

    fn tiles(editor: &Editor<MemoryStore>, track: TrackId) -> Vec<(f64, f64, f64)> {
        editor
            .store()
            .segments(track)
            .unwrap()
            .iter()
            .map(|s| (s.start.0, s.end.0, s.markers.start.0))
            .collect()
    }

    #[test]
    fn test_multi_tile_fill_with_partial() {
        let (mut editor, track) = editor_with(
            ContentInfo::looping(SegmentKind::ContentFixed, Beat(4.0)),
            &[(0.0, 4.0, None)],
        );
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        let result = editor.lengthen(&handle, Beat(10.0)).unwrap();
        assert_eq!(result.outcome, Outcome::Full);
        assert_eq!(result.segments.len(), 3);
        assert_eq!(
            tiles(&editor, track),
            vec![(0.0, 4.0, 0.0), (4.0, 8.0, 0.0), (8.0, 10.0, 0.0)]
        );
    }

    #[test]
    fn test_exact_multiple_has_no_partial_step() {
        let (mut editor, track) = editor_with(
            ContentInfo::looping(SegmentKind::ContentFixed, Beat(4.0)),
            &[(0.0, 4.0, None)],
        );
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        editor.lengthen(&handle, Beat(12.0)).unwrap();
        assert_eq!(
            tiles(&editor, track),
            vec![(0.0, 4.0, 0.0), (4.0, 8.0, 0.0), (8.0, 12.0, 0.0)]
        );
        // Two tiles, no staging and no trims
        assert_eq!(editor.journal().count(Primitive::Duplicate), 2);
        assert_eq!(editor.journal().count(Primitive::Create), 0);
    }

    #[test]
    fn test_sub_loop_exposure_advances_offsets() {
        let (mut editor, track) = editor_with(
            ContentInfo::looping(SegmentKind::ContentFixed, Beat(8.0)),
            &[(0.0, 2.0, None)],
        );
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        let result = editor.lengthen(&handle, Beat(7.0)).unwrap();
        assert_eq!(result.outcome, Outcome::Full);
        assert_eq!(
            tiles(&editor, track),
            vec![
                (0.0, 2.0, 0.0),
                (2.0, 4.0, 2.0),
                (4.0, 6.0, 4.0),
                (6.0, 7.0, 6.0),
            ]
        );
    }

    #[test]
    fn test_sub_loop_wraps_within_loop() {
        let markers = Markers {
            start: ContentPos(5.0),
            end: ContentPos(7.0),
            loop_start: ContentPos(0.0),
            loop_end: ContentPos(8.0),
        };
        let (mut editor, track) = editor_with(
            ContentInfo::looping(SegmentKind::ContentFixed, Beat(8.0)),
            &[(0.0, 2.0, Some(markers))],
        );
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        editor.lengthen(&handle, Beat(6.0)).unwrap();
        assert_eq!(
            tiles(&editor, track),
            vec![(0.0, 2.0, 5.0), (2.0, 4.0, 7.0), (4.0, 6.0, 1.0)]
        );
    }

    #[test]
    fn test_unaligned_loop_gets_head_tile_and_template_is_removed() {
        let markers = Markers {
            start: ContentPos(1.0),
            end: ContentPos(3.0),
            loop_start: ContentPos(0.0),
            loop_end: ContentPos(4.0),
        };
        let (mut editor, track) = editor_with(
            ContentInfo::looping(SegmentKind::ContentFixed, Beat(4.0)),
            &[(0.0, 2.0, Some(markers))],
        );
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        let result = editor.lengthen(&handle, Beat(9.0)).unwrap();
        assert_eq!(result.outcome, Outcome::Full);
        assert_eq!(
            tiles(&editor, track),
            vec![
                (0.0, 2.0, 1.0),
                (2.0, 3.0, 3.0),
                (3.0, 7.0, 0.0),
                (7.0, 9.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_tiles_push_into_neighbor() {
        let (mut editor, track) = editor_with(
            ContentInfo::looping(SegmentKind::ContentFixed, Beat(4.0)),
            &[(0.0, 4.0, None), (6.0, 12.0, None), (20.0, 24.0, None)],
        );
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        editor.lengthen(&handle, Beat(8.0)).unwrap();
        assert!(!editor.store().is_crashed());
        let extents: Vec<(f64, f64)> = tiles(&editor, track)
            .iter()
            .map(|(s, e, _)| (*s, *e))
            .collect();
        assert_eq!(extents, vec![(0.0, 4.0), (4.0, 8.0), (8.0, 12.0), (20.0, 24.0)]);
    }

    #[test]
    fn test_content_fixed_caps_at_material_end() {
        let (mut editor, track) =
            editor_with(ContentInfo::fixed(Beat(7.0)), &[(0.0, 3.0, None)]);
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        let result = editor.lengthen(&handle, Beat(12.0)).unwrap();
        assert_eq!(result.outcome, Outcome::Capped);
        assert_eq!(result.achieved_length, Some(Beat(7.0)));
        assert_eq!(
            tiles(&editor, track),
            vec![(0.0, 3.0, 0.0), (3.0, 6.0, 3.0), (6.0, 7.0, 6.0)]
        );
    }

    #[test]
    fn test_content_fixed_without_more_material_is_no_change() {
        let (mut editor, track) =
            editor_with(ContentInfo::fixed(Beat(3.0)), &[(0.0, 3.0, None)]);
        let handle = editor.locate(track, Beat(0.0)).unwrap();

        let result = editor.lengthen(&handle, Beat(6.0)).unwrap();
        assert_eq!(result.outcome, Outcome::NoChange);
        assert_eq!(tiles(&editor, track), vec![(0.0, 3.0, 0.0)]);
    }
}
