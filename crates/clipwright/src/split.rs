//! Splitting one segment into several at given points.
//!
//! The host cannot split. A spare copy of the original goes to the holding
//! area; the original is trimmed down to the first piece in place, and
//! every later piece is cut from a copy of the spare and moved into place.
//! N pieces take 2·(N−1) duplications.

use tracing::{debug, info};

use crate::editor::Editor;
use crate::error::EditError;
use crate::handle::SegmentHandle;
use crate::primitives::{Beat, SegmentProps};
use crate::store::SegmentStore;

/// Every point strictly inside the segment, ascending, no repeats.
pub(crate) fn validate_split_points(seg: &SegmentProps, points: &[Beat]) -> Result<(), EditError> {
    if points.is_empty() {
        return Err(EditError::InvalidSplitPoint {
            point: seg.start,
            reason: "no split points given".to_string(),
        });
    }

    let mut previous: Option<Beat> = None;
    for &point in points {
        if !point.0.is_finite() || !(seg.start.before(point) && point.before(seg.end)) {
            return Err(EditError::InvalidSplitPoint {
                point,
                reason: format!("not inside ({}, {})", seg.start, seg.end),
            });
        }
        if let Some(previous) = previous {
            if !previous.before(point) {
                return Err(EditError::InvalidSplitPoint {
                    point,
                    reason: format!("does not follow {}", previous),
                });
            }
        }
        previous = Some(point);
    }
    Ok(())
}

impl<S: SegmentStore> Editor<S> {
    /// Split a segment at `points`. Returns the pieces in timeline order.
    ///
    /// Points are validated before anything on the timeline changes.
    #[tracing::instrument(skip(self), fields(key = %handle.key()))]
    pub fn split(
        &mut self,
        handle: &SegmentHandle,
        points: &[Beat],
    ) -> Result<Vec<SegmentHandle>, EditError> {
        self.begin_operation();
        let seg = self.reacquire(handle)?;
        validate_split_points(&seg, points)?;

        let key = seg.key();
        let spare = self.stage_copy(&key, Beat::zero())?;
        let offset = |at: Beat| at - seg.start;

        // The original becomes the first piece where it stands
        self.trim_right(&key, points[0])?;

        for window in points.windows(2) {
            let (from, to) = (window[0], window[1]);
            debug!("split piece [{}, {})", from, to);
            let piece = self.stage_copy(&spare, Beat::zero())?;
            self.trim_right(&piece, piece.start + offset(to))?;
            let piece = self.trim_left(&piece, piece.start + offset(from))?;
            self.place_staged(&piece, from)?;
        }

        let last = points[points.len() - 1];
        debug!("split piece [{}, {})", last, seg.end);
        let tail = self.trim_left(&spare, spare.start + offset(last))?;
        self.place_staged(&tail, last)?;

        let pieces = self.handles_within(seg.track, seg.start, seg.end)?;
        info!(
            "split: {} into {} pieces",
            seg.key(),
            pieces.len()
        );
        Ok(pieces)
    }
}
