//! Folder browsing: the session controller and what it drives.

pub mod actions;
pub mod controller;
pub mod filter;
pub mod history;
pub mod session;
pub mod view;

#[cfg(test)]
mod controller_test;

pub use actions::{FileActionSink, NoActions, ServerActions};
pub use controller::{FolderController, LOAD_MORE_THRESHOLD};
pub use filter::SearchFilter;
pub use history::{NavigationHistory, normalize_path, parent_path};
pub use session::{ListingSession, SessionState};
pub use view::{FolderView, THUMBNAIL_SIZE, ViewItem, ViewMode};
