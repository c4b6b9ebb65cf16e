//! Edge trims.
//!
//! The host has no "resize" for content-fixed segments, but it will
//! truncate anything a new segment lands on. Laying a scratch segment over
//! one edge and deleting it again cuts that edge off.
//!
//! Only ever cover one edge. A scratch segment in the middle of a segment
//! discards the tail with it.

use tracing::debug;

use crate::editor::Editor;
use crate::error::EditError;
use crate::handle::SegmentKey;
use crate::primitives::{Beat, ContentRef, SegmentProps};
use crate::store::SegmentStore;

impl<S: SegmentStore> Editor<S> {
    /// Cut the segment at `key` so it ends at `at`. Returns its key.
    pub fn trim_right(&mut self, key: &SegmentKey, at: Beat) -> Result<SegmentKey, EditError> {
        let seg = self.resolve(key)?;
        check_inside(&seg, at)?;

        debug!("trim right {} at {}", key, at);
        let scratch = self.store_create(seg.track, at, seg.end - at, &ContentRef::scratch())?;
        self.store_delete(&scratch)?;
        Ok(seg.key())
    }

    /// Cut the segment at `key` so it starts at `at`. Returns the key it
    /// has afterwards, since the start moved.
    pub fn trim_left(&mut self, key: &SegmentKey, at: Beat) -> Result<SegmentKey, EditError> {
        let seg = self.resolve(key)?;
        check_inside(&seg, at)?;

        debug!("trim left {} at {}", key, at);
        let scratch =
            self.store_create(seg.track, seg.start, at - seg.start, &ContentRef::scratch())?;
        self.store_delete(&scratch)?;
        Ok(seg.key().at(at))
    }
}

fn check_inside(seg: &SegmentProps, at: Beat) -> Result<(), EditError> {
    if seg.start.before(at) && at.before(seg.end) {
        Ok(())
    } else {
        Err(EditError::range(format!(
            "trim point {} is not inside [{}, {})",
            at, seg.start, seg.end
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::Editor;
    use crate::error::EditError;
    use crate::memory::{ContentInfo, MemoryStore, SegmentSeed};
    use crate::primitives::{Beat, ContentPos, ContentRef, SegmentKind, TrackId};
    use crate::store::SegmentStore;

    fn editor_with(info: ContentInfo, start: f64, end: f64) -> (Editor<MemoryStore>, TrackId) {
        let mut store = MemoryStore::new();
        let track = store.add_track();
        store
            .register_content(ContentRef::new("loop"), info)
            .unwrap();
        store
            .insert(
                track,
                SegmentSeed {
                    start: Beat(start),
                    end: Beat(end),
                    content: ContentRef::new("loop"),
                    markers: None,
                },
            )
            .unwrap();
        (Editor::new(store), track)
    }

    #[test]
    fn test_trim_right_content_fixed() {
        let (mut editor, track) = editor_with(ContentInfo::fixed(Beat(8.0)), 0.0, 8.0);
        let key = editor.locate(track, Beat(0.0)).unwrap().key().clone();

        let trimmed = editor.trim_right(&key, Beat(3.0)).unwrap();
        assert_eq!(trimmed, key);

        let segments = editor.store().segments(track).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end, Beat(3.0));
        assert_eq!(segments[0].markers.start, ContentPos(0.0));
    }

    #[test]
    fn test_trim_left_advances_content() {
        let (mut editor, track) = editor_with(
            ContentInfo::looping(SegmentKind::ContentFixed, Beat(4.0)),
            2.0,
            10.0,
        );
        let key = editor.locate(track, Beat(2.0)).unwrap().key().clone();

        let trimmed = editor.trim_left(&key, Beat(7.0)).unwrap();
        assert_eq!(trimmed.start, Beat(7.0));

        let seg = editor.resolve(&trimmed).unwrap();
        assert_eq!((seg.start, seg.end), (Beat(7.0), Beat(10.0)));
        // Five beats into a four-beat loop
        assert_eq!(seg.markers.start, ContentPos(1.0));
        assert_eq!(editor.store().list_segments(track).unwrap().len(), 1);
    }

    #[test]
    fn test_trim_point_must_be_inside() {
        let (mut editor, track) = editor_with(ContentInfo::fixed(Beat(8.0)), 0.0, 4.0);
        let key = editor.locate(track, Beat(0.0)).unwrap().key().clone();

        for at in [0.0, 4.0, 6.0] {
            let err = editor.trim_right(&key, Beat(at)).unwrap_err();
            assert!(matches!(err, EditError::InvalidRange { .. }));
        }
        assert!(editor.trim_left(&key, Beat(0.0)).is_err());
    }
}
