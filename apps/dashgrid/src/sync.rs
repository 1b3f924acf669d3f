//! # Synced Storage
//!
//! Shadows a local store with a remote copy.
//!
//! - Reads reconcile both copies by last-writer-wins and repair the losing
//!   side.
//! - Writes always land locally first. If the remote cannot be reached the
//!   write is parked in an [`OfflineQueue`] and [`SyncedStorage::flush`]
//!   delivers it once the remote answers again.
//! - A remote that already holds a newer document wins; the local copy is
//!   replaced with it.

use crate::error::{AppError, AppResult};
use crate::now;
use crate::remote::HttpRemote;
use dashgrid_core::{
    DashboardState, DashboardStore, OfflineQueue, SyncDecision, Timestamp, reconcile,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of [`SyncedStorage::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written locally and remotely.
    Synced,
    /// Written locally; the remote write is waiting in the offline queue.
    Queued,
    /// The remote held a newer document, which replaced the local copy.
    Superseded(DashboardState),
}

/// Result of [`SyncedStorage::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was waiting.
    Idle,
    /// The pending write reached the remote.
    Delivered,
    /// The remote already had something newer; the pending write was dropped.
    Discarded,
    /// The remote is still unreachable; the write stays queued.
    StillOffline,
}

/// Snapshot of the sync state, for `dashgrid sync --status` and logs.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub local: String,
    pub remote: String,
    pub online: bool,
    pub pending: usize,
    pub dropped: u64,
    pub last_sync: Option<u64>,
}

/// Local store plus remote copy plus offline queue.
pub struct SyncedStorage<S> {
    local: S,
    remote: HttpRemote,
    queue: OfflineQueue,
    online: bool,
    last_sync: Option<Timestamp>,
}

impl<S: DashboardStore> SyncedStorage<S> {
    pub fn new(local: S, remote: HttpRemote) -> Self {
        Self::with_queue(local, remote, OfflineQueue::default())
    }

    pub fn with_queue(local: S, remote: HttpRemote, queue: OfflineQueue) -> Self {
        Self {
            local,
            remote,
            queue,
            online: true,
            last_sync: None,
        }
    }

    pub fn local(&self) -> &S {
        &self.local
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            local: self.local.describe(),
            remote: self.remote.base_url().to_string(),
            online: self.online,
            pending: self.queue.len(),
            dropped: self.queue.dropped(),
            last_sync: self.last_sync.map(Timestamp::millis),
        }
    }

    /// Load the authoritative document.
    ///
    /// When the remote is unreachable the local copy is returned as-is and
    /// the storage is marked offline.
    pub async fn load(&mut self) -> AppResult<Option<DashboardState>> {
        let local = self.local.load()?;

        let remote = match self.remote.fetch().await {
            Ok(remote) => {
                self.mark_online();
                remote
            }
            Err(e) if e.is_transient() => {
                self.mark_offline(&e);
                return Ok(local);
            }
            Err(e) => return Err(e),
        };

        let decision = reconcile(local.as_ref(), remote.as_ref());
        debug!(?decision, "reconciled local and remote");

        match decision {
            SyncDecision::Empty => Ok(None),
            SyncDecision::InSync => {
                self.queue.clear();
                self.last_sync = Some(now());
                Ok(local)
            }
            SyncDecision::UseLocal { push_remote } => {
                if let (true, Some(state)) = (push_remote, local.as_ref()) {
                    match self.push_or_queue(state).await? {
                        SaveOutcome::Superseded(remote) => return Ok(Some(remote)),
                        SaveOutcome::Synced | SaveOutcome::Queued => {}
                    }
                }
                Ok(local)
            }
            SyncDecision::UseRemote { write_local } => {
                if let Some(state) = remote.as_ref() {
                    if write_local {
                        self.local.save(state)?;
                        info!(revision = state.revision, "local copy replaced by remote");
                    }
                    let discarded = self.queue.discard_older_than(state);
                    if discarded > 0 {
                        info!(discarded, "queued writes older than the remote copy dropped");
                    }
                }
                self.last_sync = Some(now());
                Ok(remote)
            }
        }
    }

    /// Save a document locally and push it to the remote.
    pub async fn save(&mut self, state: &DashboardState) -> AppResult<SaveOutcome> {
        self.local.save(state)?;
        self.push_or_queue(state).await
    }

    /// Deliver the newest queued write, if the remote is back.
    pub async fn flush(&mut self) -> AppResult<FlushOutcome> {
        if self.queue.is_empty() {
            return Ok(FlushOutcome::Idle);
        }

        let remote = match self.remote.fetch().await {
            Ok(remote) => {
                self.mark_online();
                remote
            }
            Err(e) if e.is_transient() => {
                self.mark_offline(&e);
                return Ok(FlushOutcome::StillOffline);
            }
            Err(e) => return Err(e),
        };

        let Some(pending) = self.queue.take_ready(remote.as_ref()) else {
            info!("queued writes were older than the remote copy; dropped");
            return Ok(FlushOutcome::Discarded);
        };

        match self.remote.push(&pending.state).await {
            Ok(()) => {
                self.last_sync = Some(now());
                info!(
                    revision = pending.state.revision,
                    attempts = pending.attempts,
                    "queued write delivered"
                );
                Ok(FlushOutcome::Delivered)
            }
            Err(AppError::StaleWrite) => Ok(FlushOutcome::Discarded),
            Err(e) if e.is_transient() => {
                self.mark_offline(&e);
                self.queue.requeue(pending);
                Ok(FlushOutcome::StillOffline)
            }
            Err(e) => {
                self.queue.requeue(pending);
                Err(e)
            }
        }
    }

    async fn push_or_queue(&mut self, state: &DashboardState) -> AppResult<SaveOutcome> {
        match self.remote.push(state).await {
            Ok(()) => {
                self.mark_online();
                self.queue.clear();
                self.last_sync = Some(now());
                Ok(SaveOutcome::Synced)
            }
            Err(AppError::StaleWrite) => {
                self.mark_online();
                match self.remote.fetch().await {
                    Ok(Some(remote)) => {
                        self.local.save(&remote)?;
                        self.queue.clear();
                        self.last_sync = Some(now());
                        warn!(
                            local_revision = state.revision,
                            remote_revision = remote.revision,
                            "remote copy is newer; local write superseded"
                        );
                        Ok(SaveOutcome::Superseded(remote))
                    }
                    // Rejected, then gone: nothing to adopt, keep it queued.
                    Ok(None) => {
                        self.queue.enqueue(state.clone(), now());
                        Ok(SaveOutcome::Queued)
                    }
                    // Lost the remote between the push and the fetch.
                    Err(e) if e.is_transient() => {
                        self.mark_offline(&e);
                        self.queue.enqueue(state.clone(), now());
                        Ok(SaveOutcome::Queued)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) if e.is_transient() => {
                self.mark_offline(&e);
                self.queue.enqueue(state.clone(), now());
                Ok(SaveOutcome::Queued)
            }
            Err(e) => Err(e),
        }
    }

    fn mark_online(&mut self) {
        if !self.online {
            info!(remote = %self.remote.base_url(), "remote reachable again");
        }
        self.online = true;
    }

    fn mark_offline(&mut self, err: &AppError) {
        if self.online {
            warn!(remote = %self.remote.base_url(), error = %err, "remote unreachable; working offline");
        }
        self.online = false;
    }
}
