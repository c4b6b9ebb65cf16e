//! Holding area: scratch space past the end of a track.
//!
//! A holding position is `max end + margin` at the moment it is asked for.
//! It is never cached, because the previous step may have moved content
//! past where an earlier answer would have pointed.

use tracing::debug;

use crate::editor::Editor;
use crate::error::EditError;
use crate::handle::SegmentKey;
use crate::primitives::{Beat, ContentPos, ContentRef, TrackId};
use crate::store::SegmentStore;

impl<S: SegmentStore> Editor<S> {
    /// A position where a duplicate can be freely mutated.
    pub fn reserve_holding(&mut self, track: TrackId) -> Result<Beat, EditError> {
        self.reserve_holding_after(track, Beat::zero())
    }

    /// Like `reserve_holding`, but also clear of `floor`, for operations
    /// that are about to write content up to `floor`.
    pub(crate) fn reserve_holding_after(
        &mut self,
        track: TrackId,
        floor: Beat,
    ) -> Result<Beat, EditError> {
        let max_end = self
            .segments_on(track)?
            .iter()
            .fold(floor, |end, s| end.max(s.end));
        let position = max_end + self.config.holding_margin;
        debug!("holding area on {} at {}", track, position);
        Ok(position)
    }

    /// Duplicate a segment into the holding area and return the copy's key.
    ///
    /// The source may be positioned, but the target starts a positive
    /// margin past the end of every segment on the track, measured right
    /// before the call. Nothing can obstruct it, so there is nothing to
    /// clear and the host's crash combination cannot arise.
    pub(crate) fn stage_copy(
        &mut self,
        key: &SegmentKey,
        floor: Beat,
    ) -> Result<SegmentKey, EditError> {
        let holding = self.reserve_holding_after(key.track, floor)?;
        let source = self.resolve(key)?;
        self.store_duplicate(&source.id, holding)?;
        Ok(key.at(holding))
    }

    /// Put a staged copy at `target` and remove it from the holding area.
    pub(crate) fn place_staged(
        &mut self,
        staged: &SegmentKey,
        target: Beat,
    ) -> Result<SegmentKey, EditError> {
        let placed = self.duplicate_positioned(staged, target)?;
        let leftover = self.resolve(staged)?;
        self.store_delete(&leftover.id)?;
        Ok(placed)
    }

    /// Where `content` runs out, found by creating a throwaway segment.
    ///
    /// Returns `ContentPos::UNBOUNDED` for content without an end.
    pub fn probe_content_boundary(
        &mut self,
        track: TrackId,
        content: &ContentRef,
    ) -> Result<ContentPos, EditError> {
        let holding = self.reserve_holding(track)?;
        let probe = self.store_create(track, holding, self.config.probe_length, content)?;
        let props = self.store_properties(&probe)?;
        self.store_delete(&props.id)?;
        debug!("content {} ends at {}", content, props.markers.loop_end);
        Ok(props.markers.loop_end)
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::Editor;
    use crate::memory::{ContentInfo, MemoryStore, SegmentSeed};
    use crate::primitives::{Beat, ContentPos, ContentRef};
    use crate::store::SegmentStore;

    fn seeded(extents: &[(f64, f64)]) -> (Editor<MemoryStore>, crate::primitives::TrackId) {
        let mut store = MemoryStore::new();
        let track = store.add_track();
        for (start, end) in extents {
            store
                .insert(
                    track,
                    SegmentSeed {
                        start: Beat(*start),
                        end: Beat(*end),
                        content: ContentRef::new("pad"),
                        markers: None,
                    },
                )
                .unwrap();
        }
        (Editor::new(store), track)
    }

    #[test]
    fn test_holding_follows_content() {
        let (mut editor, track) = seeded(&[(0.0, 4.0), (6.0, 10.0)]);
        assert_eq!(editor.reserve_holding(track).unwrap(), Beat(14.0));

        // Recomputed after content changes
        editor
            .store_create(track, Beat(20.0), Beat(2.0), &ContentRef::new("pad"))
            .unwrap();
        assert_eq!(editor.reserve_holding(track).unwrap(), Beat(26.0));
    }

    #[test]
    fn test_holding_on_empty_track() {
        let (mut editor, track) = seeded(&[]);
        assert_eq!(editor.reserve_holding(track).unwrap(), Beat(4.0));
        assert_eq!(
            editor.reserve_holding_after(track, Beat(30.0)).unwrap(),
            Beat(34.0)
        );
    }

    #[test]
    fn test_probe_leaves_no_trace() {
        let mut store = MemoryStore::new();
        let track = store.add_track();
        store
            .register_content(ContentRef::new("hit"), ContentInfo::fixed(Beat(5.0)))
            .unwrap();
        let mut editor = Editor::new(store);

        let boundary = editor
            .probe_content_boundary(track, &ContentRef::new("hit"))
            .unwrap();
        assert_eq!(boundary, ContentPos(5.0));

        let unbounded = editor
            .probe_content_boundary(track, &ContentRef::new("generated"))
            .unwrap();
        assert!(unbounded.is_unbounded());
        assert!(editor.store().list_segments(track).unwrap().is_empty());
    }

    #[test]
    fn test_stage_and_place() {
        let (mut editor, track) = seeded(&[(0.0, 4.0)]);
        let key = editor.locate(track, Beat(0.0)).unwrap().key().clone();

        let staged = editor.stage_copy(&key, Beat::zero()).unwrap();
        assert_eq!(staged.start, Beat(8.0));

        let placed = editor.place_staged(&staged, Beat(12.0)).unwrap();
        assert_eq!(placed.start, Beat(12.0));
        let starts: Vec<f64> = editor
            .store()
            .segments(track)
            .unwrap()
            .iter()
            .map(|s| s.start.0)
            .collect();
        assert_eq!(starts, vec![0.0, 12.0]);
    }
}
