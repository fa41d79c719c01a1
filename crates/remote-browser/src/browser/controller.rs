//! Folder session controller.
//!
//! Owns the current folder, its history, the accumulated entries and the displayed view.
//! Listing pages and searches run on the tokio runtime and report back through one
//! channel; `pump()` applies what arrived, on the owning thread, in arrival order.
//! Every report carries the id of the session that sent it, and reports from anything
//! but the current session are dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;

use super::actions::FileActionSink;
use super::filter::SearchFilter;
use super::history::{NavigationHistory, normalize_path, parent_path};
use super::session::{Envelope, ListingSession, SessionEvent, SessionState};
use super::view::{FolderView, ViewItem, ViewMode};
use crate::api::{FileServer, ListingQuery};
use crate::config::BrowserConfig;
use crate::listing::{DirectoryEntry, ListingOutcome, ServerItem, SortField, SortOrder, SortSpec, stream_listing};
use crate::thumbnails::{ThumbnailScheduler, ThumbnailStats, Viewport};

/// Scrolling past this fraction of the content asks for the next page.
pub const LOAD_MORE_THRESHOLD: f32 = 0.8;

/// How often `wait_until_idle` wakes up to re-check.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct FolderController {
    server: Arc<dyn FileServer>,
    runtime: Handle,
    actions: Box<dyn FileActionSink>,
    config: BrowserConfig,

    current_path: String,
    history: NavigationHistory,
    /// Everything received for the current folder, in arrival order
    entries: Vec<DirectoryEntry>,
    seen_paths: HashSet<String>,
    /// Records the server sent for the current folder, duplicates included.
    /// The server pages by this count, not by what survived dedup.
    server_offset: usize,
    view: FolderView,
    sort: SortSpec,
    mode: ViewMode,
    filter: Option<SearchFilter>,
    viewport: Viewport,

    session: Option<ListingSession>,
    /// Only events tagged with this id are applied
    current_id: u64,
    state: SessionState,
    has_more: bool,
    status_text: Option<String>,
    initial_load_failed: bool,

    events_tx: mpsc::Sender<Envelope>,
    events_rx: mpsc::Receiver<Envelope>,
    thumbnails: ThumbnailScheduler,
}

impl FolderController {
    /// Creates an idle controller at `/`. Nothing is requested until `load_path`.
    pub fn new(
        server: Arc<dyn FileServer>,
        runtime: Handle,
        config: BrowserConfig,
        actions: Box<dyn FileActionSink>,
    ) -> Self {
        let thumbnails = ThumbnailScheduler::new(
            Arc::clone(&server),
            runtime.clone(),
            config.thumbnail_concurrency,
            config.thumbnail_cache_capacity,
        );
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            server,
            runtime,
            actions,
            config,
            current_path: String::from("/"),
            history: NavigationHistory::new(),
            entries: Vec::new(),
            seen_paths: HashSet::new(),
            server_offset: 0,
            view: FolderView::new(),
            sort: SortSpec::default(),
            mode: ViewMode::default(),
            filter: None,
            viewport: Viewport::new(0.0, 800.0, 600.0),
            session: None,
            current_id: 0,
            state: SessionState::Idle,
            has_more: false,
            status_text: None,
            initial_load_failed: false,
            events_tx,
            events_rx,
            thumbnails,
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Opens a folder. The previous folder goes on the back stack unless it's the same one.
    pub fn load_path(&mut self, path: &str) {
        let path = normalize_path(path);
        self.history.visit(&self.current_path, &path);
        self.current_path = path;
        self.reload();
    }

    /// Reloads the current folder without touching history.
    pub fn refresh(&mut self) {
        self.reload();
    }

    pub fn navigate_back(&mut self) -> bool {
        let Some(previous) = self.history.go_back(&self.current_path) else {
            return false;
        };
        self.current_path = previous;
        self.reload();
        true
    }

    pub fn navigate_forward(&mut self) -> bool {
        let Some(next) = self.history.go_forward(&self.current_path) else {
            return false;
        };
        self.current_path = next;
        self.reload();
        true
    }

    /// Goes to the parent folder. Does nothing at `/`.
    pub fn navigate_up(&mut self) -> bool {
        if !self.can_go_up() {
            return false;
        }
        let parent = parent_path(&self.current_path);
        self.load_path(&parent);
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    pub fn can_go_up(&self) -> bool {
        self.current_path != "/"
    }

    /// Starts the current folder over: fresh entries, fresh view, first page.
    fn reload(&mut self) {
        self.cancel_active();
        self.filter = None;
        self.entries.clear();
        self.seen_paths.clear();
        self.server_offset = 0;
        self.view.clear();
        self.has_more = false;
        self.status_text = None;
        self.initial_load_failed = false;
        self.thumbnails.clear_pending();
        self.start_page(0, self.config.initial_page_size);
    }

    // ========================================================================
    // Paging
    // ========================================================================

    /// Requests the next page. Only while more entries exist and nothing is loading.
    pub fn load_more(&mut self) -> bool {
        if !self.has_more || self.is_loading() || self.filter.is_some() {
            return false;
        }
        self.start_page(self.server_offset, self.config.page_size);
        true
    }

    /// Reacts to scrolling: near the bottom it asks for more, in thumbnail mode it
    /// re-prioritizes thumbnails around the viewport.
    pub fn on_scroll(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let content_height = self.mode.metrics().content_height(self.view.len(), viewport.width);
        if viewport.scroll_fraction(content_height) > LOAD_MORE_THRESHOLD {
            self.load_more();
        }
        self.prefetch_visible_thumbnails();
    }

    fn next_session_id(&mut self) -> u64 {
        self.current_id += 1;
        self.current_id
    }

    fn start_page(&mut self, offset: usize, limit: usize) {
        self.cancel_active();
        let id = self.next_session_id();
        let cancelled = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();
        let query = ListingQuery::new(self.current_path.clone(), offset, limit);
        log::debug!(
            "session {id}: listing {} (offset={offset}, limit={limit})",
            self.current_path
        );

        let server = Arc::clone(&self.server);
        let events = self.events_tx.clone();
        let batch_size = self.config.batch_size.max(1);
        let flag = Arc::clone(&cancelled);
        self.runtime.spawn(async move {
            run_listing(server, query, id, batch_size, flag, events).await;
            let _ = done_tx.send(());
        });

        self.session = Some(ListingSession::new(
            id,
            self.current_path.clone(),
            offset,
            limit,
            cancelled,
            done_rx,
        ));
        self.state = SessionState::Loading;
    }

    /// Cancels whatever is running. Cancelling is a normal end, not an error.
    fn cancel_active(&mut self) {
        if let Some(session) = self.session.as_mut()
            && session.is_loading
        {
            let stopped = session.cancel(self.config.cancel_grace);
            log::debug!(
                "session {}: cancelled ({})",
                session.id,
                if stopped { "stopped" } else { "abandoned" }
            );
        }
        if self.state.is_busy() {
            self.state = SessionState::Cancelled;
        }
        // Whatever the abandoned task still sends is stale from here on
        self.current_id += 1;
    }

    // ========================================================================
    // Sorting and filtering
    // ========================================================================

    /// Re-sorts the displayed items in memory. No network.
    pub fn set_sort(&mut self, field: SortField, ascending: bool) {
        self.sort = SortSpec {
            field,
            order: SortOrder::from_ascending(ascending),
        };
        self.view.sort(self.sort);
        self.prefetch_visible_thumbnails();
    }

    /// Replaces the displayed items with the results of a one-shot search under the
    /// current folder. History is untouched. An empty filter clears instead.
    pub fn apply_filter(&mut self, filter: SearchFilter) {
        if filter.is_empty() {
            self.clear_filter();
            return;
        }
        self.cancel_active();
        let id = self.next_session_id();
        let query = filter.to_query(&self.current_path);
        log::debug!("session {id}: search in {} ({:?})", self.current_path, query.query);

        let search = self.server.search(&query);
        let events = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = search.await;
            let _ = events.send(Envelope {
                session: id,
                event: SessionEvent::SearchResults(result),
            });
        });

        // Search results don't belong to any listing page
        self.session = None;
        self.filter = Some(filter);
        self.has_more = false;
        self.status_text = None;
        self.state = SessionState::Loading;
    }

    /// Drops the filter and reloads the current folder, if a filter was active.
    pub fn clear_filter(&mut self) {
        if self.filter.is_some() {
            self.reload();
        }
    }

    /// Switches presentation and reloads the current folder. Before the first
    /// `load_path` there is nothing to reload and no request is made.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
        if self.current_id > 0 {
            self.reload();
        }
    }

    // ========================================================================
    // Event application
    // ========================================================================

    /// Applies everything background tasks reported so far, plus finished thumbnails.
    /// Returns the number of listing/search events applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(envelope) = self.events_rx.try_recv() {
            if self.apply(envelope) {
                applied += 1;
            }
        }
        self.thumbnails.poll_completions(&mut self.view);
        applied
    }

    /// Pumps until nothing is loading. Returns false if `timeout` ran out first.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if !self.is_loading() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Ok(envelope) = self.events_rx.recv_timeout(IDLE_POLL_INTERVAL.min(deadline - now)) {
                self.apply(envelope);
            }
        }
    }

    /// Waits for queued and in-flight thumbnails. Returns false on timeout.
    pub fn wait_for_thumbnails(&mut self, timeout: Duration) -> bool {
        self.thumbnails.wait_until_idle(&mut self.view, timeout)
    }

    fn apply(&mut self, envelope: Envelope) -> bool {
        if envelope.session != self.current_id {
            log::debug!("dropping event of stale session {}", envelope.session);
            return false;
        }
        match envelope.event {
            SessionEvent::Batch(batch) => self.apply_batch(batch),
            SessionEvent::Finished(outcome) => self.apply_outcome(outcome),
            SessionEvent::SearchResults(Ok(items)) => self.apply_search_results(items),
            SessionEvent::SearchResults(Err(e)) => {
                log::warn!("search in {} failed: {e}", self.current_path);
                self.state = SessionState::Errored;
                self.status_text = Some(format!("Search failed: {e}"));
            }
        }
        true
    }

    fn apply_batch(&mut self, batch: Vec<DirectoryEntry>) {
        if let Some(session) = self.session.as_mut() {
            session.received += batch.len();
        }
        self.server_offset += batch.len();
        let fresh: Vec<DirectoryEntry> = batch
            .into_iter()
            .filter(|entry| self.seen_paths.insert(entry.path.clone()))
            .collect();
        self.entries.extend(fresh.iter().cloned());
        self.state = SessionState::Streaming;
        // Items must be displayed before cache hits can land on them
        self.view.append(fresh.iter().cloned(), self.sort);
        self.request_thumbnails(&fresh);
        self.prefetch_visible_thumbnails();
    }

    fn apply_outcome(&mut self, outcome: ListingOutcome) {
        let first_page = self.session.as_ref().is_some_and(|s| s.offset == 0);
        if let Some(session) = self.session.as_mut() {
            session.is_loading = false;
            session.has_more = outcome.has_more && outcome.error.is_none();
        }
        match outcome.error {
            Some(message) => {
                log::warn!("listing {} failed: {message}", self.current_path);
                self.has_more = false;
                self.state = SessionState::Errored;
                self.status_text = Some(format!("Error loading files: {message}"));
                self.initial_load_failed = first_page;
            }
            None => {
                self.has_more = outcome.has_more;
                self.state = SessionState::Complete;
                self.status_text = None;
            }
        }
    }

    fn apply_search_results(&mut self, items: Vec<ServerItem>) {
        log::debug!("search in {}: {} results", self.current_path, items.len());
        self.entries.clear();
        self.seen_paths.clear();
        for item in items {
            let entry = DirectoryEntry::from_server_item(item, &self.current_path);
            if self.seen_paths.insert(entry.path.clone()) {
                self.entries.push(entry);
            }
        }
        self.view.replace(self.entries.iter().cloned(), self.sort);
        self.request_thumbnails(&self.entries.clone());
        self.prefetch_visible_thumbnails();
        self.has_more = false;
        self.state = SessionState::Complete;
    }

    // ========================================================================
    // Thumbnails
    // ========================================================================

    /// Queues background thumbnails for newly shown files, in thumbnail mode only.
    fn request_thumbnails(&mut self, entries: &[DirectoryEntry]) {
        let Some(size) = self.mode.thumbnail_size() else {
            return;
        };
        for entry in entries.iter().filter(|e| !e.is_directory()) {
            self.thumbnails.request(&entry.path, size, size, false, &mut self.view);
        }
    }

    /// Moves files around the viewport to the front of the thumbnail queue.
    fn prefetch_visible_thumbnails(&mut self) {
        let Some(size) = self.mode.thumbnail_size() else {
            return;
        };
        let range = self.mode.metrics().prefetch_range(&self.viewport, self.view.len());
        let paths = self.view.files_without_thumbnail(range);
        self.thumbnails.request_visible(&paths, size, size, &mut self.view);
    }

    // ========================================================================
    // Item actions
    // ========================================================================

    /// Activates a displayed item: folders open, files go to the action sink.
    pub fn activate(&mut self, index: usize) -> bool {
        let Some(entry) = self.view.get(index).map(|item| item.entry.clone()) else {
            return false;
        };
        if entry.is_directory() {
            self.load_path(&entry.path);
        } else {
            self.actions.open(&entry);
        }
        true
    }

    pub fn delete_item(&mut self, index: usize) -> bool {
        let Some(item) = self.view.get(index) else {
            return false;
        };
        self.actions.delete(&item.entry.path);
        true
    }

    pub fn rename_item(&mut self, index: usize, new_name: &str) -> bool {
        let Some(item) = self.view.get(index) else {
            return false;
        };
        self.actions.rename(&item.entry.path, new_name);
        true
    }

    pub fn download_item(&mut self, index: usize) -> bool {
        let Some(item) = self.view.get(index) else {
            return false;
        };
        self.actions.download(&item.entry);
        true
    }

    pub fn show_properties(&mut self, index: usize) -> bool {
        let Some(item) = self.view.get(index) else {
            return false;
        };
        self.actions.show_properties(&item.entry);
        true
    }

    /// Creates a folder in the current folder.
    pub fn create_folder(&mut self, name: &str) {
        self.actions.create_folder(&self.current_path, name);
    }

    /// Creates an empty file in the current folder.
    pub fn create_file(&mut self, name: &str) {
        self.actions.create_file(&self.current_path, name);
    }

    /// Cancels the active listing and stops thumbnail dequeues.
    pub fn shutdown(&mut self) {
        self.cancel_active();
        self.thumbnails.shutdown();
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Accumulated entries of the current folder (or search), in arrival order.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Displayed items, in display order.
    pub fn items(&self) -> &[ViewItem] {
        self.view.items()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_busy()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Error text shown in place of the loading indicator.
    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    /// True when the first page of the folder failed, which deserves more than a status line.
    pub fn initial_load_failed(&self) -> bool {
        self.initial_load_failed
    }

    /// The listing page loading or last loaded. `None` while search results are shown.
    pub fn session(&self) -> Option<&ListingSession> {
        self.session.as_ref()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.mode
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn active_filter(&self) -> Option<&SearchFilter> {
        self.filter.as_ref()
    }

    pub fn thumbnail_stats(&self) -> ThumbnailStats {
        self.thumbnails.stats()
    }
}

/// Background side of one listing page: streams entries and forwards them in batches.
async fn run_listing(
    server: Arc<dyn FileServer>,
    query: ListingQuery,
    session: u64,
    batch_size: usize,
    cancelled: Arc<AtomicBool>,
    events: mpsc::Sender<Envelope>,
) {
    let send = |event: SessionEvent| {
        // The controller may be gone; then nobody is listening anyway
        let _ = events.send(Envelope { session, event });
    };

    let mut batch = Vec::with_capacity(batch_size);
    let outcome = stream_listing(server.as_ref(), &query, |entry| {
        if cancelled.load(Ordering::Relaxed) {
            return false;
        }
        batch.push(entry);
        if batch.len() >= batch_size {
            send(SessionEvent::Batch(std::mem::replace(
                &mut batch,
                Vec::with_capacity(batch_size),
            )));
        }
        true
    })
    .await;

    if cancelled.load(Ordering::Relaxed) {
        log::debug!("session {session}: stopped after cancellation");
        return;
    }
    if !batch.is_empty() {
        send(SessionEvent::Batch(batch));
    }
    send(SessionEvent::Finished(outcome));
}
