use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One flagged entry as returned by `GET /who-sleeping`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub time: String,
}

/// View-model for the "currently flagged" list
///
/// The roster is a set keyed by name for display purposes: each refresh
/// replaces the whole list with the server's snapshot, collapsed so that
/// entries sharing a name keep only the first occurrence in response order.
/// Removal is optimistic: the entry leaves the local list immediately and the
/// next refresh tick reconciles with the server either way.
///
/// Refreshes carry the same sequence-token guard as the stream poll, so a
/// slow response can never overwrite a newer snapshot.
#[derive(Default)]
pub struct RosterDedup {
    entries: Vec<RosterEntry>,
    refresh_seq: u64,
    applied_seq: u64,
}

impl RosterDedup {
    pub fn new() -> Self {
        RosterDedup::default()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hand out the sequence token for the refresh about to be issued
    pub fn begin_refresh(&mut self) -> u64 {
        self.refresh_seq += 1;
        self.refresh_seq
    }

    /// Replace the roster with one server snapshot, deduplicated by name
    ///
    /// Failed fetches never reach this method: the caller logs and waits for
    /// the next tick, leaving the previous roster in place.
    pub fn apply_refresh(&mut self, seq: u64, list: Vec<RosterEntry>) {
        if seq <= self.applied_seq {
            log::debug!("dropping stale roster response (seq {seq})");
            return;
        }
        self.applied_seq = seq;
        self.entries = dedup_by_name(list);
    }

    /// Optimistically remove the entry at the given display index
    ///
    /// Returns the removed name (for the outbound DELETE request), or `None`
    /// for an out-of-bounds index, which is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index >= self.entries.len() {
            return None;
        }
        Some(self.entries.remove(index).name)
    }
}

/// Keep only the first occurrence of each name, preserving order
fn dedup_by_name(list: Vec<RosterEntry>) -> Vec<RosterEntry> {
    let mut seen = HashSet::new();
    list.into_iter()
        .filter(|entry| seen.insert(entry.name.clone()))
        .collect()
}
