//! File server seam: the endpoints the browsing core consumes.
//!
//! The `FileServer` trait abstracts the HTTP API so the listing pipeline and the
//! thumbnail scheduler can run against the real server (`ServerClient`) or an
//! in-memory tree (`InMemoryServer`).

mod client;
mod errors;
mod in_memory;
mod types;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

pub use client::ServerClient;
pub use errors::ApiError;
pub use in_memory::InMemoryServer;
pub use types::{DEFAULT_SEARCH_LIMIT, ExtendedMetadata, ListingQuery, SearchQuery, SearchResponse};

use crate::listing::entry::ServerItem;

/// Raw body chunks of a streaming response, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Boxed future returned by every `FileServer` call.
pub type ApiFuture<T> = BoxFuture<'static, Result<T, ApiError>>;

/// The endpoints of the file server used by the browsing core.
///
/// All futures are `'static` so they can be spawned onto the runtime without borrowing
/// the server.
pub trait FileServer: Send + Sync {
    /// `GET /files`: opens the NDJSON listing stream. Resolves once headers arrived.
    fn list_files(&self, query: &ListingQuery) -> ApiFuture<ByteStream>;

    /// `GET /search`: one-shot filtered search.
    fn search(&self, query: &SearchQuery) -> ApiFuture<Vec<ServerItem>>;

    /// `GET /thumb`: raw image bytes of a server-rendered thumbnail.
    fn fetch_thumbnail(&self, path: &str, width: u32, height: u32) -> ApiFuture<Bytes>;

    /// `GET /meta`: extended metadata for a details view.
    fn get_meta(&self, path: &str) -> ApiFuture<ExtendedMetadata>;

    /// URL of the thumbnail endpoint for this path and box, used for logging and hand-off.
    fn thumbnail_url(&self, path: &str, width: u32, height: u32) -> String;
}
