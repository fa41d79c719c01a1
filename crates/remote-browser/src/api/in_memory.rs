//! In-memory file server for testing and demos.
//!
//! Serves folder listings as NDJSON lines held in memory, with knobs to split the body
//! into arbitrary chunks, inject broken lines, hold streams and thumbnail fetches at a
//! gate, and count what was requested.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::{FutureExt, StreamExt, stream};
use tokio::sync::Semaphore;

use super::{ApiError, ApiFuture, ByteStream, ExtendedMetadata, FileServer, ListingQuery, SearchQuery};
use crate::ignore_poison::IgnorePoison;
use crate::listing::entry::{EntryKind, ServerItem, join_path};

/// One stored record: the NDJSON line as sent, plus the parsed item for search.
#[derive(Clone)]
struct StoredLine {
    line: String,
    item: Option<ServerItem>,
}

#[derive(Default)]
struct Tree {
    /// Folder path -> lines in server order
    folders: HashMap<String, Vec<StoredLine>>,
    files: HashSet<String>,
    thumbnails: HashMap<String, Bytes>,
    /// Split bodies into chunks of this many bytes; `None` sends one line per chunk
    chunk_size: Option<usize>,
    /// Hold listing bodies after this many chunks until the gate opens
    listing_pause: Option<(usize, Arc<Semaphore>)>,
    /// Hold thumbnail fetches until the gate hands out permits
    thumbnail_gate: Option<Arc<Semaphore>>,
    listing_requests: Vec<ListingQuery>,
    search_requests: Vec<SearchQuery>,
    /// Thumbnail paths in the order fetches reached the server
    thumbnail_requests: Vec<String>,
}

/// Counts concurrent thumbnail fetches and remembers the peak.
#[derive(Default)]
struct FetchCounters {
    started: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// In-memory implementation of [`FileServer`].
#[derive(Clone, Default)]
pub struct InMemoryServer {
    tree: Arc<Mutex<Tree>>,
    counters: Arc<FetchCounters>,
}

impl InMemoryServer {
    pub fn new() -> Self {
        let server = Self::default();
        server.tree.lock_ignore_poison().folders.insert(String::from("/"), Vec::new());
        server
    }

    /// Creates a server whose `folder` holds `count` files named `file_00000.jpg` onward.
    pub fn with_file_count(folder: &str, count: usize) -> Self {
        let server = Self::new();
        server.add_folder_path(folder);
        for i in 0..count {
            server.add_file(folder, &format!("file_{i:05}.jpg"), (i as u64 + 1) * 1024, None);
        }
        server
    }

    fn add_folder_path(&self, path: &str) {
        let mut tree = self.tree.lock_ignore_poison();
        tree.folders.entry(path.to_string()).or_default();
    }

    fn push_item(&self, parent: &str, item: serde_json::Value) {
        let line = item.to_string();
        let parsed = serde_json::from_str::<ServerItem>(&line).ok();
        let mut tree = self.tree.lock_ignore_poison();
        tree.folders
            .entry(parent.to_string())
            .or_default()
            .push(StoredLine { line, item: parsed });
    }

    /// Adds a file record to `parent`. The record carries no `path`, so clients derive it.
    pub fn add_file(&self, parent: &str, name: &str, size: u64, last_modified: Option<i64>) {
        let mut record = serde_json::json!({"name": name, "type": "file", "size": size});
        if let Some(modified) = last_modified {
            record["lastModified"] = serde_json::json!(modified);
        }
        self.push_item(parent, record);
        self.tree.lock_ignore_poison().files.insert(join_path(parent, name));
    }

    /// Adds a folder record to `parent` and makes the folder itself listable.
    pub fn add_folder(&self, parent: &str, name: &str) {
        // Folders come with an empty-string size, as the real server sends them
        self.push_item(parent, serde_json::json!({"name": name, "type": "dir", "size": ""}));
        self.add_folder_path(&join_path(parent, name));
    }

    /// Appends a raw line to a folder's body (malformed JSON, `{"error": ...}`, anything).
    pub fn push_raw_line(&self, parent: &str, line: &str) {
        let mut tree = self.tree.lock_ignore_poison();
        tree.folders.entry(parent.to_string()).or_default().push(StoredLine {
            line: line.to_string(),
            item: None,
        });
    }

    /// Registers exact thumbnail bytes for a path (an empty body is allowed).
    pub fn add_thumbnail(&self, path: &str, bytes: impl Into<Bytes>) {
        self.tree.lock_ignore_poison().thumbnails.insert(path.to_string(), bytes.into());
    }

    /// Splits listing bodies into chunks of `size` bytes, cutting through lines.
    pub fn set_chunk_size(&self, size: usize) {
        self.tree.lock_ignore_poison().chunk_size = Some(size.max(1));
    }

    /// Holds every listing body after `chunks` chunks until [`resume_listings`] is called.
    ///
    /// [`resume_listings`]: Self::resume_listings
    pub fn pause_listings_after(&self, chunks: usize) {
        self.tree.lock_ignore_poison().listing_pause = Some((chunks, Arc::new(Semaphore::new(0))));
    }

    pub fn resume_listings(&self) {
        if let Some((_, gate)) = self.tree.lock_ignore_poison().listing_pause.take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Makes thumbnail fetches wait until permits are released one by one.
    pub fn hold_thumbnails(&self) {
        self.tree.lock_ignore_poison().thumbnail_gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets `count` held thumbnail fetches finish.
    pub fn release_thumbnails(&self, count: usize) {
        if let Some(gate) = &self.tree.lock_ignore_poison().thumbnail_gate {
            gate.add_permits(count);
        }
    }

    pub fn listing_requests(&self) -> Vec<ListingQuery> {
        self.tree.lock_ignore_poison().listing_requests.clone()
    }

    pub fn search_requests(&self) -> Vec<SearchQuery> {
        self.tree.lock_ignore_poison().search_requests.clone()
    }

    pub fn thumbnail_requests(&self) -> Vec<String> {
        self.tree.lock_ignore_poison().thumbnail_requests.clone()
    }

    /// Number of thumbnail fetches that reached the server.
    pub fn thumbnail_fetches(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    /// Highest number of thumbnail fetches in progress at the same time.
    pub fn peak_concurrent_thumbnails(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    fn body_chunks(lines: &[StoredLine], chunk_size: Option<usize>) -> Vec<Bytes> {
        match chunk_size {
            None => lines.iter().map(|l| Bytes::from(format!("{}\n", l.line))).collect(),
            Some(size) => {
                let body: String = lines.iter().map(|l| format!("{}\n", l.line)).collect();
                body.as_bytes().chunks(size).map(Bytes::copy_from_slice).collect()
            }
        }
    }
}

/// Renders a flat PNG twice as wide as the requested box, so clients have to downscale it.
fn render_placeholder(width: u32, height: u32) -> Result<Bytes, ApiError> {
    let image = image::RgbaImage::from_pixel(width.max(1) * 2, height.max(1), image::Rgba([90, 140, 200, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| ApiError::Other(format!("Couldn't render placeholder: {e}")))?;
    Ok(Bytes::from(buffer.into_inner()))
}

fn matches_search(item: &ServerItem, query: &SearchQuery) -> bool {
    let kind = item.kind.as_deref().map(EntryKind::from_wire).unwrap_or_default();
    if let Some(q) = query.query.as_deref()
        && !item.name.to_lowercase().contains(&q.trim().to_lowercase())
    {
        return false;
    }
    if query.kind.is_some_and(|wanted| wanted != kind) {
        return false;
    }
    let size = item.size.unwrap_or(0);
    if query.size_min.is_some_and(|min| size < min) || query.size_max.is_some_and(|max| size > max) {
        return false;
    }
    let modified = item.last_modified.unwrap_or(0);
    if query.modified_after.is_some_and(|after| modified < after)
        || query.modified_before.is_some_and(|before| modified > before)
    {
        return false;
    }
    true
}

impl FileServer for InMemoryServer {
    fn list_files(&self, query: &ListingQuery) -> ApiFuture<ByteStream> {
        let mut tree = self.tree.lock_ignore_poison();
        tree.listing_requests.push(query.clone());

        let Some(lines) = tree.folders.get(&query.path) else {
            return futures_util::future::ready(Err(ApiError::Status {
                code: 404,
                message: String::from("Not found"),
            }))
            .boxed();
        };
        let page: Vec<StoredLine> = lines.iter().skip(query.offset).take(query.limit).cloned().collect();
        let chunks = Self::body_chunks(&page, tree.chunk_size);
        let pause = tree.listing_pause.clone();
        drop(tree);

        let body = stream::unfold((chunks.into_iter(), 0usize, pause), |(mut chunks, index, pause)| async move {
            let chunk = chunks.next()?;
            if let Some((pause_at, gate)) = &pause
                && index == *pause_at
                && let Ok(permit) = gate.acquire().await
            {
                permit.forget();
            }
            Some((Ok(chunk), (chunks, index + 1, pause)))
        });
        let body: ByteStream = body.boxed();
        futures_util::future::ready(Ok(body)).boxed()
    }

    fn search(&self, query: &SearchQuery) -> ApiFuture<Vec<ServerItem>> {
        let mut tree = self.tree.lock_ignore_poison();
        tree.search_requests.push(query.clone());

        let prefix = query.path.trim_end_matches('/').to_string();
        let mut results = Vec::new();
        let mut folders: Vec<&String> = tree
            .folders
            .keys()
            .filter(|folder| *folder == &query.path || folder.starts_with(&format!("{prefix}/")))
            .collect();
        folders.sort();
        for folder in folders {
            for stored in &tree.folders[folder] {
                if let Some(item) = &stored.item
                    && matches_search(item, query)
                {
                    let mut item = item.clone();
                    item.path = Some(join_path(folder, &item.name));
                    results.push(item);
                }
            }
        }
        results.truncate(query.limit);
        futures_util::future::ready(Ok(results)).boxed()
    }

    fn fetch_thumbnail(&self, path: &str, width: u32, height: u32) -> ApiFuture<Bytes> {
        let mut tree = self.tree.lock_ignore_poison();
        tree.thumbnail_requests.push(path.to_string());
        let registered = tree.thumbnails.get(path).cloned();
        let known_file = tree.files.contains(path);
        let gate = tree.thumbnail_gate.clone();
        drop(tree);

        let counters = Arc::clone(&self.counters);
        let path = path.to_string();
        async move {
            counters.started.fetch_add(1, Ordering::SeqCst);
            let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
            counters.peak.fetch_max(active, Ordering::SeqCst);

            if let Some(gate) = gate
                && let Ok(permit) = gate.acquire().await
            {
                permit.forget();
            }

            let result = match registered {
                Some(bytes) => Ok(bytes),
                None if known_file => render_placeholder(width, height),
                None => Err(ApiError::Status {
                    code: 404,
                    message: format!("No thumbnail for {path}"),
                }),
            };
            counters.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
        .boxed()
    }

    fn get_meta(&self, path: &str) -> ApiFuture<ExtendedMetadata> {
        let tree = self.tree.lock_ignore_poison();
        let result = if let Some(children) = tree.folders.get(path) {
            Ok(ExtendedMetadata {
                item_count: Some(children.len() as u64),
                ..ExtendedMetadata::default()
            })
        } else if tree.files.contains(path) {
            let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
            let parent = if parent.is_empty() { "/" } else { parent };
            let size = tree
                .folders
                .get(parent)
                .and_then(|lines| lines.iter().filter_map(|l| l.item.as_ref()).find(|i| i.name == name))
                .and_then(|i| i.size);
            Ok(ExtendedMetadata {
                size,
                ..ExtendedMetadata::default()
            })
        } else {
            Err(ApiError::Status {
                code: 404,
                message: String::from("Not found"),
            })
        };
        futures_util::future::ready(result).boxed()
    }

    fn thumbnail_url(&self, path: &str, width: u32, height: u32) -> String {
        format!("memory:///thumb?path={path}&w={width}&h={height}")
    }
}
