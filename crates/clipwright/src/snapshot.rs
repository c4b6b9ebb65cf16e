//! Timeline snapshots: a MemoryStore as JSON on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::memory::{ContentInfo, MemoryStore, SegmentSeed};
use crate::primitives::{ContentRef, TrackId};
use crate::store::{HostCapabilities, StoreError};

/// Newest snapshot format this build reads and the one it writes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to read timeline {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write timeline {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid timeline JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timeline version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Timeline rejected: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub content: ContentRef,
    #[serde(flatten)]
    pub info: ContentInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    #[serde(default)]
    pub segments: Vec<SegmentSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub version: u32,
    #[serde(default = "default_self_clamping")]
    pub self_clamping: bool,
    #[serde(default)]
    pub contents: Vec<ContentEntry>,
    #[serde(default)]
    pub tracks: Vec<TrackSnapshot>,
}

fn default_self_clamping() -> bool {
    true
}

impl TimelineSnapshot {
    pub fn empty(self_clamping: bool) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            self_clamping,
            contents: Vec::new(),
            tracks: Vec::new(),
        }
    }

    pub fn from_store(store: &MemoryStore) -> Result<Self, StoreError> {
        use crate::store::SegmentStore;

        let contents = store
            .contents()
            .into_iter()
            .map(|(content, info)| ContentEntry { content, info })
            .collect();

        let mut tracks = Vec::with_capacity(store.track_count());
        for index in 0..store.track_count() {
            let segments = store
                .segments(TrackId(index))?
                .into_iter()
                .map(|s| SegmentSeed {
                    start: s.start,
                    end: s.end,
                    content: s.content,
                    markers: Some(s.markers),
                })
                .collect();
            tracks.push(TrackSnapshot { segments });
        }

        Ok(Self {
            version: SNAPSHOT_VERSION,
            self_clamping: store.capabilities().self_clamping,
            contents,
            tracks,
        })
    }

    /// Build a store holding exactly this timeline.
    pub fn into_store(self) -> Result<MemoryStore, SnapshotError> {
        self.into_store_with(None)
    }

    /// Like `into_store`, with a configured host clamping mode taking
    /// precedence over the one recorded in the snapshot.
    pub fn into_store_with(
        mut self,
        self_clamping: Option<bool>,
    ) -> Result<MemoryStore, SnapshotError> {
        if let Some(self_clamping) = self_clamping {
            self.self_clamping = self_clamping;
        }
        if self.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let mut store = MemoryStore::with_capabilities(HostCapabilities {
            self_clamping: self.self_clamping,
        });
        for entry in self.contents {
            store.register_content(entry.content, entry.info)?;
        }
        for track in self.tracks {
            let id = store.add_track();
            for seed in track.segments {
                store.insert(id, seed)?;
            }
        }
        Ok(store)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
