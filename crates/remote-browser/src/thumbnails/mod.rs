//! Thumbnail prefetching: bounded-concurrency fetches, visible items first.

pub mod cache;
pub mod decode;
pub mod queue;
pub mod scheduler;
pub mod viewport;


pub use cache::{DEFAULT_CACHE_CAPACITY, Thumbnail, ThumbnailCache, ThumbnailKey};
pub use decode::{ThumbnailError, decode_thumbnail};
pub use queue::{Priority, ThumbnailRequest};
pub use scheduler::{DEFAULT_MAX_CONCURRENT, RequestOutcome, ThumbnailScheduler, ThumbnailStats, ThumbnailTarget};
pub use viewport::{GridMetrics, Viewport};
