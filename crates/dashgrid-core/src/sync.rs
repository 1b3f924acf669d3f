//! # Sync Module
//!
//! Pure pieces of the synced storage layer.
//!
//! - [`reconcile`] decides which of a local and a remote copy is
//!   authoritative, by last-writer-wins on `(updated_at, revision)`.
//! - [`OfflineQueue`] holds writes that could not reach the remote while it
//!   was unreachable.
//!
//! The network side (fetching, pushing, retrying) lives in the app crate.

use crate::model::DashboardState;
use crate::types::Timestamp;
use std::collections::VecDeque;

/// Default number of pending writes kept while offline.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Outcome of comparing a local and a remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Neither side has a document.
    Empty,
    /// Both sides hold the same document.
    InSync,
    /// The local copy wins; `push_remote` says the remote must be updated.
    UseLocal { push_remote: bool },
    /// The remote copy wins; `write_local` says the local copy must be updated.
    UseRemote { write_local: bool },
}

/// Decide which copy is authoritative.
///
/// The copy with the later `updated_at` wins, then the higher `revision`.
/// Two different documents with the same stamp resolve to the remote copy,
/// so every replica converges on what the server holds.
#[must_use]
pub fn reconcile(local: Option<&DashboardState>, remote: Option<&DashboardState>) -> SyncDecision {
    match (local, remote) {
        (None, None) => SyncDecision::Empty,
        (Some(_), None) => SyncDecision::UseLocal { push_remote: true },
        (None, Some(_)) => SyncDecision::UseRemote { write_local: true },
        (Some(local), Some(remote)) => {
            if local == remote {
                SyncDecision::InSync
            } else if local.is_newer_than(remote) {
                SyncDecision::UseLocal { push_remote: true }
            } else {
                SyncDecision::UseRemote { write_local: true }
            }
        }
    }
}

// =============================================================================
// OFFLINE QUEUE
// =============================================================================

/// A write waiting for the remote to come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub state: DashboardState,
    pub queued_at: Timestamp,
    /// Failed delivery attempts so far.
    pub attempts: u32,
}

/// Bounded FIFO of pending remote writes.
///
/// Under last-writer-wins only the newest snapshot matters, so enqueuing a
/// document drops every queued document it supersedes.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    entries: VecDeque<PendingWrite>,
    capacity: usize,
    dropped: u64,
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl OfflineQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries discarded so far, by coalescing, overflow or staleness.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queue a document for delivery.
    pub fn enqueue(&mut self, state: DashboardState, now: Timestamp) {
        let before = self.entries.len();
        self.entries
            .retain(|pending| pending.state.is_newer_than(&state));
        self.count_dropped(before - self.entries.len());

        self.entries.push_back(PendingWrite {
            state,
            queued_at: now,
            attempts: 0,
        });

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.count_dropped(1);
        }
    }

    /// The newest queued document, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&PendingWrite> {
        self.entries
            .iter()
            .max_by_key(|pending| (pending.state.updated_at, pending.state.revision))
    }

    /// Take the write that should be sent to the remote.
    ///
    /// Entries that are not newer than `remote` are stale and discarded.
    /// Of the rest, the newest is returned and the others are dropped, since
    /// it supersedes them.
    pub fn take_ready(&mut self, remote: Option<&DashboardState>) -> Option<PendingWrite> {
        let before = self.entries.len();
        if let Some(remote) = remote {
            self.entries
                .retain(|pending| pending.state.is_newer_than(remote));
        }

        let newest = self
            .entries
            .iter()
            .enumerate()
            .max_by_key(|(_, pending)| (pending.state.updated_at, pending.state.revision))
            .map(|(i, _)| i);

        let taken = newest.and_then(|i| self.entries.remove(i));
        self.entries.clear();
        self.count_dropped(before - usize::from(taken.is_some()));
        taken
    }

    /// Drop every entry that is not newer than `remote` and return how many
    /// went. Newer entries stay queued.
    pub fn discard_older_than(&mut self, remote: &DashboardState) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|pending| pending.state.is_newer_than(remote));
        let discarded = before - self.entries.len();
        self.count_dropped(discarded);
        discarded
    }

    /// Put back a write whose delivery failed.
    pub fn requeue(&mut self, mut pending: PendingWrite) {
        pending.attempts = pending.attempts.saturating_add(1);
        if self
            .entries
            .iter()
            .any(|queued| queued.state.is_newer_than(&pending.state))
        {
            self.count_dropped(1);
            return;
        }
        self.entries.push_front(pending);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.count_dropped(1);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn count_dropped(&mut self, n: usize) {
        self.dropped = self.dropped.saturating_add(n as u64);
    }
}

// =============================================================================
// TESTS
// =============================================================================
