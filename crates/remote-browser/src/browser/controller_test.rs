//! Tests for the folder session controller, run against the in-memory server.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;

use super::actions::FileActionSink;
use super::controller::FolderController;
use super::filter::SearchFilter;
use super::session::SessionState;
use super::view::ViewMode;
use crate::api::InMemoryServer;
use crate::config::BrowserConfig;
use crate::listing::{DirectoryEntry, SortField};
use crate::thumbnails::Viewport;

const WAIT: Duration = Duration::from_secs(5);

/// Records every action as `"<action> <path>"`.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl FileActionSink for Recorder {
    fn open(&mut self, entry: &DirectoryEntry) {
        self.push(format!("open {}", entry.path));
    }
    fn delete(&mut self, path: &str) {
        self.push(format!("delete {path}"));
    }
    fn rename(&mut self, path: &str, new_name: &str) {
        self.push(format!("rename {path} {new_name}"));
    }
    fn download(&mut self, entry: &DirectoryEntry) {
        self.push(format!("download {}", entry.path));
    }
    fn show_properties(&mut self, entry: &DirectoryEntry) {
        self.push(format!("properties {}", entry.path));
    }
    fn create_folder(&mut self, parent: &str, name: &str) {
        self.push(format!("mkdir {parent} {name}"));
    }
    fn create_file(&mut self, parent: &str, name: &str) {
        self.push(format!("touch {parent} {name}"));
    }
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn test_config() -> BrowserConfig {
    BrowserConfig {
        cancel_grace: Duration::from_millis(20),
        ..BrowserConfig::default()
    }
}

fn controller_with(runtime: &Runtime, server: &InMemoryServer, config: BrowserConfig) -> (FolderController, Recorder) {
    let recorder = Recorder::default();
    let controller = FolderController::new(
        Arc::new(server.clone()),
        runtime.handle().clone(),
        config,
        Box::new(recorder.clone()),
    );
    (controller, recorder)
}

fn controller(runtime: &Runtime, server: &InMemoryServer) -> (FolderController, Recorder) {
    controller_with(runtime, server, test_config())
}

fn pump_until(controller: &mut FolderController, done: impl Fn(&FolderController) -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        controller.pump();
        if done(controller) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

fn entry_names(controller: &FolderController) -> Vec<String> {
    controller.entries().iter().map(|e| e.name.clone()).collect()
}

fn item_names(controller: &FolderController) -> Vec<String> {
    controller.items().iter().map(|i| i.entry.name.clone()).collect()
}

// ============================================================================
// Paging
// ============================================================================

#[test]
fn test_paging_through_250_files() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/Movies", 250);
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/Movies");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.entries().len(), 100);
    assert!(controller.has_more());
    assert_eq!(controller.state(), SessionState::Complete);

    assert!(controller.load_more());
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.entries().len(), 200);
    assert!(controller.has_more());

    assert!(controller.load_more());
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.entries().len(), 250);
    assert!(!controller.has_more());
    assert!(!controller.load_more());

    let offsets: Vec<(usize, usize)> = server.listing_requests().iter().map(|q| (q.offset, q.limit)).collect();
    assert_eq!(offsets, vec![(0, 100), (100, 100), (200, 100)]);
    assert_eq!(controller.entries()[249].path, "/Movies/file_00249.jpg");
}

#[test]
fn test_entries_keep_arrival_order_for_any_batch_size() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/", 37);
    server.set_chunk_size(7);
    let expected: Vec<String> = (0..37).map(|i| format!("file_{i:05}.jpg")).collect();

    for batch_size in [1, 3, 10, 64] {
        let config = BrowserConfig {
            batch_size,
            ..test_config()
        };
        let (mut controller, _) = controller_with(&runtime, &server, config);
        controller.load_path("/");
        assert!(controller.wait_until_idle(WAIT));
        assert_eq!(entry_names(&controller), expected, "batch size {batch_size}");
        assert!(!controller.has_more());
    }
}

#[test]
fn test_scrolling_near_bottom_loads_next_page() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/", 250);
    let (mut controller, _) = controller(&runtime, &server);
    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));

    // 100 rows of 24px = 2400px of content, 1800px of scroll range
    controller.on_scroll(Viewport::new(900.0, 800.0, 600.0));
    assert!(!controller.is_loading());
    assert_eq!(server.listing_requests().len(), 1);

    controller.on_scroll(Viewport::new(1620.0, 800.0, 600.0));
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.entries().len(), 200);
    assert_eq!(server.listing_requests().len(), 2);
}

#[test]
fn test_duplicate_paths_are_dropped() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    server.add_file("/", "a.txt", 1, None);
    server.add_file("/", "b.txt", 1, None);
    server.add_file("/", "a.txt", 1, None);
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(entry_names(&controller), vec!["a.txt", "b.txt"]);
}

#[test]
fn test_duplicates_across_pages_do_not_stall_paging() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    for name in ["a.txt", "b.txt", "a.txt", "b.txt", "c.txt"] {
        server.add_file("/", name, 1, None);
    }
    let config = BrowserConfig {
        initial_page_size: 2,
        page_size: 2,
        ..test_config()
    };
    let (mut controller, _) = controller_with(&runtime, &server, config);

    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    let mut rounds = 0;
    while controller.load_more() {
        assert!(controller.wait_until_idle(WAIT));
        rounds += 1;
        assert!(rounds <= 5, "paging never ran out");
    }

    assert_eq!(entry_names(&controller), vec!["a.txt", "b.txt", "c.txt"]);
    assert!(!controller.has_more());
    let offsets: Vec<usize> = server.listing_requests().iter().map(|q| q.offset).collect();
    assert_eq!(offsets, vec![0, 2, 4]);
}

// ============================================================================
// Cancellation and errors
// ============================================================================

#[test]
fn test_cancelled_session_never_delivers_later_batches() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/Movies", 25);
    server.add_file("/Other", "x.txt", 1, None);
    server.add_file("/Other", "y.txt", 1, None);
    server.pause_listings_after(10);
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/Movies");
    assert!(pump_until(&mut controller, |c| c.entries().len() == 10));
    assert_eq!(controller.state(), SessionState::Streaming);

    controller.load_path("/Other");
    server.resume_listings();
    assert!(controller.wait_until_idle(WAIT));

    // Give the abandoned task time to run into its cancellation flag
    std::thread::sleep(Duration::from_millis(50));
    controller.pump();
    assert_eq!(entry_names(&controller), vec!["x.txt", "y.txt"]);
    assert!(controller.entries().iter().all(|e| e.path.starts_with("/Other/")));
    assert_eq!(controller.status_text(), None);
}

#[test]
fn test_server_error_keeps_received_items() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/", 12);
    server.push_raw_line("/", r#"{"error":"Disk unplugged"}"#);
    server.push_raw_line("/", r#"{"name":"after-error.txt"}"#);
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.entries().len(), 12);
    assert_eq!(controller.state(), SessionState::Errored);
    assert_eq!(controller.status_text(), Some("Error loading files: Disk unplugged"));
    assert!(controller.initial_load_failed());
    assert!(!controller.has_more());
}

#[test]
fn test_malformed_lines_do_not_abort_listing() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/", 3);
    server.push_raw_line("/", "{broken");
    server.add_file("/", "last.txt", 1, None);
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.entries().len(), 4);
    assert_eq!(controller.state(), SessionState::Complete);
}

#[test]
fn test_missing_folder_is_an_initial_load_failure() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/nope");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.status_text(), Some("Error loading files: HTTP 404: Not found"));
    assert!(controller.initial_load_failed());
    assert!(controller.entries().is_empty());
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_history_back_forward_and_up() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    server.add_folder("/", "a");
    server.add_folder("/a", "b");
    let (mut controller, _) = controller(&runtime, &server);

    assert!(!controller.navigate_up());
    controller.load_path("/a");
    controller.load_path("a/b/");
    assert_eq!(controller.current_path(), "/a/b");
    assert!(controller.can_go_back());
    assert!(!controller.can_go_forward());

    assert!(controller.navigate_up());
    assert_eq!(controller.current_path(), "/a");
    assert!(controller.navigate_back());
    assert_eq!(controller.current_path(), "/a/b");
    assert!(controller.navigate_back());
    assert_eq!(controller.current_path(), "/a");
    assert!(controller.can_go_forward());
    assert!(controller.navigate_forward());
    assert_eq!(controller.current_path(), "/a/b");

    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(entry_names(&controller), Vec::<String>::new());
    assert_eq!(controller.state(), SessionState::Complete);
}

#[test]
fn test_reloading_same_folder_keeps_history() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/", 2);
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/");
    controller.refresh();
    assert!(controller.wait_until_idle(WAIT));
    assert!(!controller.can_go_back());
    assert_eq!(controller.entries().len(), 2);
    assert_eq!(server.listing_requests().len(), 2);
}

// ============================================================================
// Sorting and filtering
// ============================================================================

fn sized_server() -> InMemoryServer {
    let server = InMemoryServer::new();
    server.add_file("/", "b.txt", 30, Some(3));
    server.add_folder("/", "Docs");
    server.add_file("/", "a.txt", 10, Some(1));
    server.add_file("/", "C.txt", 20, None);
    server
}

#[test]
fn test_sort_is_in_memory_and_keeps_arrival_order_of_entries() {
    let runtime = runtime();
    let server = sized_server();
    let (mut controller, _) = controller(&runtime, &server);
    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(item_names(&controller), vec!["a.txt", "b.txt", "C.txt", "Docs"]);

    controller.set_sort(SortField::Size, false);
    assert_eq!(item_names(&controller), vec!["b.txt", "C.txt", "a.txt", "Docs"]);
    controller.set_sort(SortField::Type, true);
    assert_eq!(item_names(&controller), vec!["Docs", "a.txt", "b.txt", "C.txt"]);
    controller.set_sort(SortField::Date, true);
    assert_eq!(item_names(&controller), vec!["Docs", "C.txt", "a.txt", "b.txt"]);

    assert_eq!(server.listing_requests().len(), 1);
    assert_eq!(entry_names(&controller), vec!["b.txt", "Docs", "a.txt", "C.txt"]);
}

#[test]
fn test_filter_replaces_items_and_clearing_reloads() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    server.add_file("/", "beach.jpg", 10, None);
    server.add_file("/", "notes.txt", 10, None);
    server.add_folder("/", "Trips");
    server.add_file("/Trips", "beach2.jpg", 10, None);
    let (mut controller, _) = controller(&runtime, &server);
    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(controller.items().len(), 3);

    controller.apply_filter(SearchFilter::by_name("beach"));
    assert!(controller.wait_until_idle(WAIT));
    let paths: Vec<&str> = controller.items().iter().map(|i| i.entry.path.as_str()).collect();
    assert_eq!(paths, vec!["/beach.jpg", "/Trips/beach2.jpg"]);
    assert!(controller.active_filter().is_some());
    assert!(!controller.can_go_back());
    assert!(!controller.load_more());
    assert!(controller.session().is_none());
    assert_eq!(server.search_requests()[0].query.as_deref(), Some("beach"));

    controller.clear_filter();
    assert!(controller.wait_until_idle(WAIT));
    assert!(controller.active_filter().is_none());
    assert_eq!(controller.session().map(|s| (s.path.as_str(), s.offset)), Some(("/", 0)));
    assert_eq!(controller.items().len(), 3);
    assert_eq!(server.listing_requests().len(), 2);
}

#[test]
fn test_search_results_for_abandoned_filter_are_dropped() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    server.add_file("/", "beach.jpg", 10, None);
    server.add_folder("/", "Trips");
    server.add_file("/Trips", "x.jpg", 10, None);
    let (mut controller, _) = controller(&runtime, &server);

    controller.apply_filter(SearchFilter::by_name("beach"));
    controller.load_path("/Trips");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(entry_names(&controller), vec!["x.jpg"]);
    assert!(controller.active_filter().is_none());
}

#[test]
fn test_empty_filter_without_active_filter_does_nothing() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/", 1);
    let (mut controller, _) = controller(&runtime, &server);
    controller.apply_filter(SearchFilter::by_name("   "));
    assert!(server.search_requests().is_empty());
    assert!(server.listing_requests().is_empty());
}

// ============================================================================
// View modes and thumbnails
// ============================================================================

#[test]
fn test_thumbnail_mode_fetches_files_only() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    server.add_folder("/", "Albums");
    server.add_file("/", "one.jpg", 10, None);
    server.add_file("/", "two.jpg", 10, None);
    let (mut controller, _) = controller(&runtime, &server);

    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    assert!(controller.wait_for_thumbnails(WAIT));
    assert!(server.thumbnail_requests().is_empty());

    controller.set_view_mode(ViewMode::Thumbnails);
    assert!(controller.wait_until_idle(WAIT));
    assert!(controller.wait_for_thumbnails(WAIT));

    let mut requested = server.thumbnail_requests();
    requested.sort();
    assert_eq!(requested, vec!["/one.jpg", "/two.jpg"]);
    for item in controller.items() {
        if item.entry.is_directory() {
            assert!(item.thumbnail.is_none());
        } else {
            // Placeholder is 224x112, scaled into the 112x112 box
            assert_eq!(item.thumbnail.as_ref().map(|t| t.dimensions()), Some((112, 56)));
        }
    }

    // Coming back to the folder hits the cache
    controller.refresh();
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(server.thumbnail_requests().len(), 2);
    assert!(controller.items().iter().filter(|i| !i.entry.is_directory()).all(|i| i.thumbnail.is_some()));
    assert_eq!(controller.thumbnail_stats().cache_hits, 2);
}

#[test]
fn test_mode_switch_before_first_load_sends_one_listing() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/Photos", 3);
    let (mut controller, _) = controller(&runtime, &server);

    controller.set_view_mode(ViewMode::Thumbnails);
    assert!(server.listing_requests().is_empty());
    assert_eq!(controller.state(), SessionState::Idle);

    controller.load_path("/Photos");
    assert!(controller.wait_until_idle(WAIT));
    assert!(controller.wait_for_thumbnails(WAIT));
    let paths: Vec<String> = server.listing_requests().iter().map(|q| q.path.clone()).collect();
    assert_eq!(paths, vec!["/Photos"]);
    assert!(controller.items().iter().all(|i| i.thumbnail.is_some()));
}

// ============================================================================
// Item actions
// ============================================================================

#[test]
fn test_activate_opens_folders_and_hands_files_to_sink() {
    let runtime = runtime();
    let server = InMemoryServer::new();
    server.add_folder("/", "Docs");
    server.add_file("/", "a.mp4", 10, None);
    let (mut controller, recorder) = controller(&runtime, &server);
    controller.load_path("/");
    assert!(controller.wait_until_idle(WAIT));
    assert_eq!(item_names(&controller), vec!["a.mp4", "Docs"]);

    assert!(controller.activate(0));
    assert_eq!(recorder.lines(), vec!["open /a.mp4"]);
    assert!(controller.activate(1));
    assert_eq!(controller.current_path(), "/Docs");
    assert!(!controller.activate(5));
}

#[test]
fn test_item_actions_reach_the_sink() {
    let runtime = runtime();
    let server = InMemoryServer::with_file_count("/Music", 2);
    let (mut controller, recorder) = controller(&runtime, &server);
    controller.load_path("/Music");
    assert!(controller.wait_until_idle(WAIT));

    assert!(controller.delete_item(0));
    assert!(controller.rename_item(1, "renamed.jpg"));
    assert!(controller.download_item(0));
    assert!(controller.show_properties(1));
    controller.create_folder("New folder");
    controller.create_file("notes.txt");
    assert!(!controller.delete_item(2));

    assert_eq!(
        recorder.lines(),
        vec![
            "delete /Music/file_00000.jpg",
            "rename /Music/file_00001.jpg renamed.jpg",
            "download /Music/file_00000.jpg",
            "properties /Music/file_00001.jpg",
            "mkdir /Music New folder",
            "touch /Music notes.txt",
        ]
    );
}
