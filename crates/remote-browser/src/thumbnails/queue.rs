//! Two-tier request queue: visible requests at the front, prefetches at the back.

use std::collections::{HashSet, VecDeque};

use super::cache::ThumbnailKey;

/// Where a request goes in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Item is in (or near) the viewport
    Visible,
    /// Off-screen prefetch
    Background,
}

/// One pending or in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub key: ThumbnailKey,
    pub priority: Priority,
    /// Thumbnail endpoint URL, kept for logging
    pub url: String,
}

/// What [`RequestQueue::enqueue`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Added,
    /// Was queued in the background tier, moved to the front
    Promoted,
    AlreadyQueued,
    InFlight,
}

/// Pending requests plus the set of keys being fetched.
///
/// A key is never both queued and in flight, and never queued twice.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: VecDeque<ThumbnailRequest>,
    queued: HashSet<ThumbnailKey>,
    in_flight: HashSet<ThumbnailKey>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: ThumbnailRequest) -> Enqueued {
        if self.in_flight.contains(&request.key) {
            return Enqueued::InFlight;
        }
        if self.queued.contains(&request.key) {
            return if request.priority == Priority::Visible {
                self.promote(&request.key)
            } else {
                Enqueued::AlreadyQueued
            };
        }

        self.queued.insert(request.key.clone());
        match request.priority {
            Priority::Visible => self.pending.push_front(request),
            Priority::Background => self.pending.push_back(request),
        }
        Enqueued::Added
    }

    fn promote(&mut self, key: &ThumbnailKey) -> Enqueued {
        let Some(position) = self.pending.iter().position(|r| &r.key == key) else {
            return Enqueued::AlreadyQueued;
        };
        if position == 0 {
            return Enqueued::AlreadyQueued;
        }
        let Some(mut request) = self.pending.remove(position) else {
            return Enqueued::AlreadyQueued;
        };
        request.priority = Priority::Visible;
        self.pending.push_front(request);
        Enqueued::Promoted
    }

    /// Takes the next request and marks its key in flight.
    pub fn pop_next(&mut self) -> Option<ThumbnailRequest> {
        let request = self.pending.pop_front()?;
        self.queued.remove(&request.key);
        self.in_flight.insert(request.key.clone());
        Some(request)
    }

    /// Drops the in-flight marker. Returns false if the key wasn't in flight.
    pub fn finish(&mut self, key: &ThumbnailKey) -> bool {
        self.in_flight.remove(key)
    }

    pub fn is_in_flight(&self, key: &ThumbnailKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn is_queued(&self, key: &ThumbnailKey) -> bool {
        self.queued.contains(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Forgets every pending request. In-flight fetches are left to finish.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
        self.queued.clear();
    }
}
