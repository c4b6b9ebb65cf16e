//! Journal of store primitive calls.
//!
//! Every call the editor makes against the store lands here with a
//! monotonic sequence number, so callers (and tests) can see exactly which
//! primitives an operation used and where a failed one stopped.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::primitives::TrackId;

/// Default journal capacity
pub const DEFAULT_CAPACITY: usize = 4_096;

/// The six store primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Create,
    Duplicate,
    Delete,
    SetMarkers,
    Properties,
    ListSegments,
}

impl Primitive {
    /// Whether the call can change the timeline.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Primitive::Create | Primitive::Duplicate | Primitive::Delete | Primitive::SetMarkers
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Create => "create",
            Primitive::Duplicate => "duplicate",
            Primitive::Delete => "delete",
            Primitive::SetMarkers => "set_markers",
            Primitive::Properties => "properties",
            Primitive::ListSegments => "list_segments",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotonic sequence number, starting at 1
    pub seq: u64,
    pub primitive: Primitive,
    pub track: TrackId,
    pub detail: String,
}

/// Bounded log of primitive calls. Oldest entries fall off first.
#[derive(Debug, Clone)]
pub struct Journal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
            next_seq: 1,
        }
    }

    pub fn record(&mut self, primitive: Primitive, track: TrackId, detail: impl Into<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(JournalEntry {
            seq,
            primitive,
            track,
            detail: detail.into(),
        });
        seq
    }

    /// Sequence number of the newest entry, 0 when nothing was recorded.
    pub fn latest_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Entries recorded after `seq`.
    pub fn entries_since(&self, seq: u64) -> Vec<&JournalEntry> {
        self.entries.iter().filter(|e| e.seq > seq).collect()
    }

    pub fn count(&self, primitive: Primitive) -> usize {
        self.entries.iter().filter(|e| e.primitive == primitive).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let mut journal = Journal::default();
        assert_eq!(journal.latest_seq(), 0);

        let a = journal.record(Primitive::ListSegments, TrackId(0), "");
        let b = journal.record(Primitive::Duplicate, TrackId(0), "to 8");
        assert_eq!((a, b), (1, 2));
        assert_eq!(journal.latest_seq(), 2);
    }

    #[test]
    fn test_entries_since_and_count() {
        let mut journal = Journal::default();
        journal.record(Primitive::Create, TrackId(0), "scratch");
        let mark = journal.latest_seq();
        journal.record(Primitive::Duplicate, TrackId(0), "a");
        journal.record(Primitive::Duplicate, TrackId(1), "b");

        let since = journal.entries_since(mark);
        assert_eq!(since.len(), 2);
        assert!(since.iter().all(|e| e.primitive == Primitive::Duplicate));
        assert_eq!(journal.count(Primitive::Duplicate), 2);
        assert_eq!(journal.count(Primitive::Delete), 0);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut journal = Journal::with_capacity(2);
        journal.record(Primitive::Create, TrackId(0), "1");
        journal.record(Primitive::Create, TrackId(0), "2");
        journal.record(Primitive::Create, TrackId(0), "3");

        assert_eq!(journal.len(), 2);
        assert_eq!(journal.entries_since(0)[0].seq, 2);
        assert_eq!(journal.latest_seq(), 3);
    }

    #[test]
    fn test_mutation_classification() {
        assert!(Primitive::SetMarkers.is_mutation());
        assert!(!Primitive::Properties.is_mutation());
        assert_eq!(Primitive::ListSegments.to_string(), "list_segments");
    }
}
