//! Listing sessions: one background page stream and the events it sends back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use serde::Serialize;

use crate::api::ApiError;
use crate::listing::{DirectoryEntry, ListingOutcome, ServerItem};

/// Where the current folder view stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    /// Request sent, nothing received yet
    Loading,
    /// At least one batch applied
    Streaming,
    Complete,
    Errored,
    Cancelled,
}

impl SessionState {
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Loading | Self::Streaming)
    }
}

/// Something a background task reports to the controller.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Batch(Vec<DirectoryEntry>),
    Finished(ListingOutcome),
    SearchResults(Result<Vec<ServerItem>, ApiError>),
}

/// A [`SessionEvent`] tagged with the session that produced it.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub session: u64,
    pub event: SessionEvent,
}

/// One page request of a folder listing.
#[derive(Debug)]
pub struct ListingSession {
    pub id: u64,
    pub path: String,
    pub offset: usize,
    pub limit: usize,
    /// Entries this page delivered
    pub received: usize,
    pub is_loading: bool,
    pub has_more: bool,
    cancelled: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
}

impl ListingSession {
    pub(crate) fn new(
        id: u64,
        path: String,
        offset: usize,
        limit: usize,
        cancelled: Arc<AtomicBool>,
        done: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            id,
            path,
            offset,
            limit,
            received: 0,
            is_loading: true,
            has_more: false,
            cancelled,
            done,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Asks the background task to stop, then waits up to `grace` for it.
    ///
    /// Returns false if the task was still running when the grace period ran out. It
    /// is abandoned then; whatever it still sends carries a stale session id.
    pub(crate) fn cancel(&mut self, grace: Duration) -> bool {
        self.cancelled.store(true, Ordering::Relaxed);
        self.is_loading = false;
        match self.done.recv_timeout(grace) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => true,
            Err(mpsc::RecvTimeoutError::Timeout) => false,
        }
    }
}
