// Deny unused code to catch dead code early
#![deny(unused)]
// Warn on unused dependencies
#![warn(unused_crate_dependencies)]
// Warn on redundant path prefixes (e.g., std::path::Path when Path is imported)
#![warn(unused_qualifications)]
// Use log::* macros instead of println!/eprintln! for proper log level control
#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Progressive folder browsing for a remote personal file server.
//!
//! Three pieces do the real work:
//! - [`listing::streaming`] consumes the server's NDJSON folder listing incrementally.
//! - [`browser::FolderController`] owns the current folder, history, sorting and filtering,
//!   and restarts the listing stream on navigation.
//! - [`thumbnails::ThumbnailScheduler`] fetches thumbnails with bounded concurrency,
//!   visible items first, deduplicated and cached.
//!
//! Everything that touches the network runs on a tokio runtime; results come back to the
//! owning (UI) thread over channels and are applied by `pump()`.

// clap and env_logger are only used by the binary
use clap as _;
use env_logger as _;

pub mod api;
pub mod browser;
pub mod config;
mod ignore_poison;
pub mod listing;
pub mod thumbnails;

pub use api::{ApiError, FileServer, InMemoryServer, ServerClient};
pub use browser::{FileActionSink, FolderController, SessionState, ViewMode};
pub use config::BrowserConfig;
pub use listing::{DirectoryEntry, EntryKind, SortField};
pub use thumbnails::{ThumbnailScheduler, ThumbnailTarget};
