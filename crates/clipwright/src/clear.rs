//! Overlap clearing before positioned duplications.
//!
//! Duplicating a positioned segment onto a range another positioned
//! segment overlaps crashes the host. So every such duplication first
//! empties its target range, using only moves that are safe: deletes, edge
//! trims, and duplications of staged copies.

use tracing::debug;

use crate::editor::Editor;
use crate::error::EditError;
use crate::handle::SegmentKey;
use crate::primitives::{Beat, TrackId};
use crate::store::SegmentStore;

impl<S: SegmentStore> Editor<S> {
    /// Remove everything inside `[start, end)` on `track`, keeping what
    /// lies outside it.
    pub fn clear_range(&mut self, track: TrackId, start: Beat, end: Beat) -> Result<(), EditError> {
        if !start.before(end) {
            return Ok(());
        }

        let obstructions: Vec<_> = self
            .segments_on(track)?
            .into_iter()
            .filter(|s| s.overlaps(start, end))
            .collect();

        for obstruction in obstructions {
            let key = obstruction.key();
            let starts_inside = !obstruction.start.before(start);
            let ends_inside = !obstruction.end.after(end);

            match (starts_inside, ends_inside) {
                (true, true) => {
                    debug!("clear: deleting contained {}", key);
                    let seg = self.resolve(&key)?;
                    self.store_delete(&seg.id)?;
                }
                (false, true) => {
                    debug!("clear: trimming leading-edge {} at {}", key, start);
                    self.trim_right(&key, start)?;
                }
                (true, false) => {
                    debug!("clear: relocating tail of trailing-edge {}", key);
                    let staged = self.stage_copy(&key, Beat::zero())?;
                    let original = self.resolve(&key)?;
                    self.store_delete(&original.id)?;
                    self.restore_tail(&staged, end - obstruction.start, end)?;
                }
                (false, false) => {
                    debug!("clear: splitting around {} for [{}, {})", key, start, end);
                    let staged = self.stage_copy(&key, Beat::zero())?;
                    self.trim_right(&key, start)?;
                    self.restore_tail(&staged, end - obstruction.start, end)?;
                }
            }
        }
        Ok(())
    }

    /// Trim a staged copy down to what lies `offset` beats past its start,
    /// then bring that back to `target`.
    fn restore_tail(
        &mut self,
        staged: &SegmentKey,
        offset: Beat,
        target: Beat,
    ) -> Result<(), EditError> {
        let tail = self.trim_left(staged, staged.start + offset)?;
        let copy = self.resolve(&tail)?;
        self.store_duplicate(&copy.id, target)?;
        let leftover = self.resolve(&tail)?;
        self.store_delete(&leftover.id)?;
        Ok(())
    }

    /// Duplicate the segment at `key` to `target`, clearing the target
    /// range first. The only path that duplicates a positioned segment
    /// onto the timeline; copies into the holding area go through
    /// `stage_copy`, whose target is empty by construction.
    pub(crate) fn duplicate_positioned(
        &mut self,
        key: &SegmentKey,
        target: Beat,
    ) -> Result<SegmentKey, EditError> {
        let source = self.resolve(key)?;
        let target_end = target + source.len();
        if source.overlaps(target, target_end) {
            return Err(EditError::range(format!(
                "duplicate target [{}, {}) overlaps its source {}",
                target, target_end, key
            )));
        }

        let source = if self.clear_overlaps {
            self.clear_range(key.track, target, target_end)?;
            self.resolve(key)?
        } else {
            source
        };

        self.store_duplicate(&source.id, target)?;
        Ok(key.at(target))
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::Editor;
    use crate::error::EditError;
    use crate::memory::{ContentInfo, MemoryStore, SegmentSeed};
    use crate::primitives::{Beat, ContentPos, ContentRef, TrackId};
    use crate::store::StoreError;

    fn editor_with(segments: &[(f64, f64, &str)]) -> (Editor<MemoryStore>, TrackId) {
        let mut store = MemoryStore::new();
        let track = store.add_track();
        for name in ["a", "b", "c"] {
            store
                .register_content(ContentRef::new(name), ContentInfo::fixed(Beat(32.0)))
                .unwrap();
        }
        for (start, end, content) in segments {
            store
                .insert(
                    track,
                    SegmentSeed {
                        start: Beat(*start),
                        end: Beat(*end),
                        content: ContentRef::new(*content),
                        markers: None,
                    },
                )
                .unwrap();
        }
        (Editor::new(store), track)
    }

    fn layout(editor: &Editor<MemoryStore>, track: TrackId) -> Vec<(f64, f64, String)> {
        editor
            .store()
            .segments(track)
            .unwrap()
            .into_iter()
            .map(|s| (s.start.0, s.end.0, s.content.0))
            .collect()
    }

    #[test]
    fn test_clear_deletes_contained() {
        let (mut editor, track) = editor_with(&[(5.0, 7.0, "a"), (10.0, 12.0, "b")]);
        editor.clear_range(track, Beat(4.0), Beat(8.0)).unwrap();
        assert_eq!(layout(&editor, track), vec![(10.0, 12.0, "b".to_string())]);
    }

    #[test]
    fn test_clear_trims_leading_edge() {
        let (mut editor, track) = editor_with(&[(3.0, 8.0, "a")]);
        editor.clear_range(track, Beat(5.0), Beat(9.0)).unwrap();
        assert_eq!(layout(&editor, track), vec![(3.0, 5.0, "a".to_string())]);
    }

    #[test]
    fn test_clear_keeps_trailing_remainder() {
        let (mut editor, track) = editor_with(&[(6.0, 12.0, "a"), (14.0, 16.0, "c")]);
        editor.clear_range(track, Beat(5.0), Beat(9.0)).unwrap();

        assert_eq!(
            layout(&editor, track),
            vec![(9.0, 12.0, "a".to_string()), (14.0, 16.0, "c".to_string())]
        );
        let tail = &editor.store().segments(track).unwrap()[0];
        assert_eq!(tail.markers.start, ContentPos(3.0));
    }

    #[test]
    fn test_clear_inside_one_segment_keeps_both_sides() {
        let (mut editor, track) = editor_with(&[(3.0, 12.0, "a")]);
        editor.clear_range(track, Beat(5.0), Beat(9.0)).unwrap();

        let segments = editor.store().segments(track).unwrap();
        assert_eq!(
            layout(&editor, track),
            vec![(3.0, 5.0, "a".to_string()), (9.0, 12.0, "a".to_string())]
        );
        assert_eq!(segments[0].markers.start, ContentPos(0.0));
        assert_eq!(segments[1].markers.start, ContentPos(6.0));
    }

    #[test]
    fn test_clear_mixed_obstructions() {
        let (mut editor, track) =
            editor_with(&[(2.0, 6.0, "a"), (6.0, 7.0, "b"), (8.0, 11.0, "c")]);
        editor.clear_range(track, Beat(5.0), Beat(9.0)).unwrap();
        assert_eq!(
            layout(&editor, track),
            vec![(2.0, 5.0, "a".to_string()), (9.0, 11.0, "c".to_string())]
        );
    }

    #[test]
    fn test_positioned_duplicate_survives_obstruction() {
        let (mut editor, track) =
            editor_with(&[(0.0, 4.0, "a"), (6.0, 10.0, "b"), (12.0, 14.0, "c")]);
        let key = editor.locate(track, Beat(0.0)).unwrap().key().clone();

        editor.duplicate_positioned(&key, Beat(5.0)).unwrap();
        assert!(!editor.store().is_crashed());
        assert_eq!(
            layout(&editor, track),
            vec![
                (0.0, 4.0, "a".to_string()),
                (5.0, 9.0, "a".to_string()),
                (9.0, 10.0, "b".to_string()),
                (12.0, 14.0, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_without_clearing_the_host_crashes() {
        let (mut editor, track) =
            editor_with(&[(0.0, 4.0, "a"), (6.0, 10.0, "b"), (12.0, 14.0, "c")]);
        editor.disable_overlap_clearing();
        let key = editor.locate(track, Beat(0.0)).unwrap().key().clone();

        let err = editor.duplicate_positioned(&key, Beat(5.0)).unwrap_err();
        assert!(matches!(
            err,
            EditError::Store {
                source: StoreError::HostCrashed { .. },
                ..
            }
        ));
        assert!(editor.store().is_crashed());
    }

    #[test]
    fn test_duplicate_onto_own_extent_is_refused() {
        let (mut editor, track) = editor_with(&[(0.0, 4.0, "a")]);
        let key = editor.locate(track, Beat(0.0)).unwrap().key().clone();
        let err = editor.duplicate_positioned(&key, Beat(2.0)).unwrap_err();
        assert!(matches!(err, EditError::InvalidRange { .. }));
    }
}
