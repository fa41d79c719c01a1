//! Folder listing: entry model, sorting, and the streaming consumer.

pub mod entry;
pub mod sorting;
pub mod streaming;


pub use entry::{DirectoryEntry, EntryKind, ServerItem, join_path};
pub use sorting::{SortField, SortOrder, SortSpec, compare_entries, sort_entries};
pub use streaming::{ListingOutcome, NdjsonDecoder, consume_listing, stream_listing};
