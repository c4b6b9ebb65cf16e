//! Clipwright: arrangement timeline editing engine
//!
//! Lengthen, shorten, move, and split segments on a timeline host whose
//! only primitives are create, duplicate, delete, set-markers, and two
//! reads. The host's rules are awkward, and the engine works around them:
//!
//! - **Overlap truncation**: placing a segment truncates what it lands on
//!   and discards the remainder instead of splitting it.
//! - **Fixed extents**: content-fixed and looping segments ignore extent
//!   changes made through markers, so they grow by tiling.
//! - **Crash combination**: duplicating a positioned segment onto another
//!   positioned segment takes the host down, so targets are cleared first.
//! - **Expiring identity**: store tokens die on every structural mutation,
//!   so segments are found again by track, start, and content.
//!
//! [`Editor`] holds the orchestration. [`SegmentStore`] is the host seam,
//! with [`MemoryStore`] as a faithful in-memory host.

pub mod clear;
pub mod editor;
pub mod error;
pub mod handle;
pub mod holding;
pub mod journal;
pub mod memory;
pub mod outcome;
pub mod primitives;
pub mod snapshot;
pub mod split;
pub mod store;
pub mod tiling;
pub mod trim;

pub use editor::{EditRequest, Editor, EditorConfig};
pub use error::EditError;
pub use handle::{SegmentHandle, SegmentKey};
pub use journal::{Journal, JournalEntry, Primitive};
pub use memory::{ContentInfo, MemoryStore, SegmentSeed};
pub use outcome::{OperationError, OperationResult, Outcome};
pub use primitives::*;
pub use snapshot::{ContentEntry, SnapshotError, TimelineSnapshot, TrackSnapshot, SNAPSHOT_VERSION};
pub use store::{HostCapabilities, SegmentStore, StoreError};
