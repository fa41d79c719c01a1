//! Bounded-concurrency thumbnail fetching.
//!
//! The scheduler lives on the owning (UI) thread. Fetches and decodes run on the tokio
//! runtime and report back over a channel; `poll_completions` applies them. Every
//! completion frees one slot and starts at most one queued request, so the cap holds
//! without a separate scheduler tick.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tokio::runtime::Handle;

use super::cache::{Thumbnail, ThumbnailCache, ThumbnailKey};
use super::decode::{ThumbnailError, decode_thumbnail};
use super::queue::{Enqueued, Priority, RequestQueue, ThumbnailRequest};
use crate::api::{ApiFuture, FileServer};

/// Default cap on simultaneous thumbnail fetches. Fast local links take 32 without trouble.
pub const DEFAULT_MAX_CONCURRENT: usize = 32;

/// Receives finished thumbnails.
pub trait ThumbnailTarget {
    /// Shows `thumbnail` on every displayed item whose path is `path`.
    /// Items that are gone or not rendered yet are skipped. Returns how many were updated.
    fn apply_thumbnail(&mut self, path: &str, thumbnail: &Thumbnail) -> usize;
}

/// What [`ThumbnailScheduler::request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Applied from cache, no network
    CacheHit,
    /// Same key is being fetched
    InFlight,
    /// Same key is already waiting
    AlreadyQueued,
    /// Same key was waiting behind others and moved to the front
    Promoted,
    Queued,
    /// Scheduler was shut down
    Rejected,
}

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThumbnailStats {
    pub active: usize,
    pub pending: usize,
    pub cached: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub completed: u64,
    pub failed: u64,
}

struct Completion {
    key: ThumbnailKey,
    result: Result<RgbaImage, ThumbnailError>,
}

pub struct ThumbnailScheduler {
    server: Arc<dyn FileServer>,
    runtime: Handle,
    queue: RequestQueue,
    cache: ThumbnailCache,
    max_concurrent: usize,
    accepting: bool,
    completed: u64,
    failed: u64,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
}

impl ThumbnailScheduler {
    /// Creates a scheduler that fetches through `server` on `runtime`.
    /// A `max_concurrent` of 0 is treated as 1.
    pub fn new(server: Arc<dyn FileServer>, runtime: Handle, max_concurrent: usize, cache_capacity: usize) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            server,
            runtime,
            queue: RequestQueue::new(),
            cache: ThumbnailCache::new(cache_capacity),
            max_concurrent: max_concurrent.max(1),
            accepting: true,
            completed: 0,
            failed: 0,
            completions_tx,
            completions_rx,
        }
    }

    /// Asks for the thumbnail of `path` at `width` x `height`.
    ///
    /// A cached thumbnail is applied to `target` right away. Otherwise the request is
    /// queued unless the same key is already queued or in flight; a visible request for a
    /// queued key moves it to the front.
    pub fn request(
        &mut self,
        path: &str,
        width: u32,
        height: u32,
        visible: bool,
        target: &mut dyn ThumbnailTarget,
    ) -> RequestOutcome {
        let key = ThumbnailKey::new(path, width, height);
        if let Some(thumbnail) = self.cache.get(&key) {
            target.apply_thumbnail(path, &thumbnail);
            return RequestOutcome::CacheHit;
        }
        if !self.accepting {
            return RequestOutcome::Rejected;
        }

        let priority = if visible { Priority::Visible } else { Priority::Background };
        let url = self.server.thumbnail_url(path, width, height);
        let outcome = match self.queue.enqueue(ThumbnailRequest { key, priority, url }) {
            Enqueued::Added => RequestOutcome::Queued,
            Enqueued::Promoted => RequestOutcome::Promoted,
            Enqueued::AlreadyQueued => RequestOutcome::AlreadyQueued,
            Enqueued::InFlight => RequestOutcome::InFlight,
        };
        self.pump();
        outcome
    }

    /// Re-prioritizes items near the viewport: requests every path that is neither cached
    /// nor in flight as visible. Paths are in display order; the first one ends up first
    /// in the queue.
    pub fn request_visible(&mut self, paths: &[String], width: u32, height: u32, target: &mut dyn ThumbnailTarget) -> usize {
        let wanted: Vec<&String> = paths
            .iter()
            .filter(|path| {
                let key = ThumbnailKey::new(path.as_str(), width, height);
                !self.cache.contains(&key) && !self.queue.is_in_flight(&key)
            })
            .collect();
        // Visible requests go to the front, so push the bottom one first
        for path in wanted.iter().rev() {
            self.request(path, width, height, true, target);
        }
        wanted.len()
    }

    /// Starts queued requests while there are free slots.
    fn pump(&mut self) -> usize {
        let mut started = 0;
        while self.accepting && self.queue.in_flight_len() < self.max_concurrent {
            let Some(request) = self.queue.pop_next() else {
                break;
            };
            self.start(request);
            started += 1;
        }
        started
    }

    fn start(&self, request: ThumbnailRequest) {
        log::debug!("thumbnail fetch ({:?}): {}", request.priority, request.url);
        let key = request.key;
        let fetch = self.server.fetch_thumbnail(&key.path, key.width, key.height);
        let completions = self.completions_tx.clone();
        self.runtime.spawn(async move {
            let result = fetch_and_decode(fetch, key.width, key.height).await;
            // The scheduler may be gone by now; nothing left to tell then
            let _ = completions.send(Completion { key, result });
        });
    }

    /// Applies every finished fetch to `target`. Returns how many were handled.
    pub fn poll_completions(&mut self, target: &mut dyn ThumbnailTarget) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.complete(completion, target);
            handled += 1;
        }
        handled
    }

    /// Blocks up to `timeout` for a completion, then applies it and any others ready.
    pub fn wait_for_completion(&mut self, target: &mut dyn ThumbnailTarget, timeout: Duration) -> usize {
        match self.completions_rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.complete(completion, target);
                1 + self.poll_completions(target)
            }
            Err(_) => 0,
        }
    }

    /// Applies completions until nothing is queued or in flight. Returns false on timeout.
    pub fn wait_until_idle(&mut self, target: &mut dyn ThumbnailTarget, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.wait_for_completion(target, deadline - now);
        }
        true
    }

    fn complete(&mut self, completion: Completion, target: &mut dyn ThumbnailTarget) {
        let Completion { key, result } = completion;
        self.queue.finish(&key);
        match result {
            Ok(image) => {
                let thumbnail = Arc::new(image);
                self.cache.insert(key.clone(), Arc::clone(&thumbnail));
                let applied = target.apply_thumbnail(&key.path, &thumbnail);
                self.completed += 1;
                log::debug!("thumbnail ready: {} (applied to {applied} items)", key.path);
            }
            Err(e) => {
                // No retry: the next visibility scan asks again
                self.failed += 1;
                log::debug!("thumbnail failed: {}: {e}", key.path);
            }
        }
        self.pump();
    }

    /// Drops every queued request, as when leaving a folder. In-flight fetches finish.
    pub fn clear_pending(&mut self) {
        self.queue.clear_pending();
    }

    /// Stops all new dequeues and forgets the queue. Cached thumbnails stay usable.
    pub fn shutdown(&mut self) {
        self.accepting = false;
        self.queue.clear_pending();
        log::debug!(
            "thumbnail scheduler shut down with {} fetches in flight",
            self.queue.in_flight_len()
        );
    }

    pub fn active_count(&self) -> usize {
        self.queue.in_flight_len()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.pending_len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.in_flight_len() == 0 && self.queue.pending_len() == 0
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn is_cached(&self, path: &str, width: u32, height: u32) -> bool {
        self.cache.contains(&ThumbnailKey::new(path, width, height))
    }

    pub fn stats(&self) -> ThumbnailStats {
        ThumbnailStats {
            active: self.active_count(),
            pending: self.pending_len(),
            cached: self.cache.len(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            completed: self.completed,
            failed: self.failed,
        }
    }
}

async fn fetch_and_decode(fetch: ApiFuture<bytes::Bytes>, width: u32, height: u32) -> Result<RgbaImage, ThumbnailError> {
    let bytes = fetch.await.map_err(ThumbnailError::Fetch)?;
    if bytes.is_empty() {
        return Err(ThumbnailError::Empty);
    }
    // Decoding is CPU-bound, keep it off the async workers
    tokio::task::spawn_blocking(move || decode_thumbnail(&bytes, width, height))
        .await
        .map_err(|e| ThumbnailError::Task(e.to_string()))?
}
