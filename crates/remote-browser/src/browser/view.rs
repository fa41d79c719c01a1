//! Displayed items of the current folder, in display order.
//!
//! This is what a toolkit would render: the entries after sorting or filtering, each
//! with its thumbnail once one arrived.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::listing::{DirectoryEntry, SortSpec, compare_entries};
use crate::thumbnails::{GridMetrics, Thumbnail, ThumbnailTarget};

/// Box size requested for thumbnails in thumbnail mode.
pub const THUMBNAIL_SIZE: u32 = 112;

/// How the folder is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    #[default]
    List,
    Icons,
    Thumbnails,
}

impl ViewMode {
    pub fn metrics(self) -> GridMetrics {
        match self {
            Self::List => GridMetrics {
                cell_width: None,
                cell_height: 24,
                icon_size: 16,
            },
            Self::Icons => GridMetrics {
                cell_width: Some(120),
                cell_height: 100,
                icon_size: 48,
            },
            Self::Thumbnails => GridMetrics {
                cell_width: Some(150),
                cell_height: 140,
                icon_size: THUMBNAIL_SIZE,
            },
        }
    }

    /// Thumbnail box for this mode, if it shows thumbnails at all.
    pub fn thumbnail_size(self) -> Option<u32> {
        match self {
            Self::Thumbnails => Some(THUMBNAIL_SIZE),
            Self::List | Self::Icons => None,
        }
    }
}

/// One displayed item.
#[derive(Debug, Clone)]
pub struct ViewItem {
    pub entry: DirectoryEntry,
    pub thumbnail: Option<Thumbnail>,
    /// Arrival position, the tie-breaker for every sort
    seq: usize,
}

/// Displayed items, kept sorted by the active sort.
#[derive(Debug, Default)]
pub struct FolderView {
    items: Vec<ViewItem>,
    next_seq: usize,
}

impl FolderView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ViewItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&ViewItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.next_seq = 0;
    }

    /// Adds newly arrived entries and merges them into the sort order.
    /// Only the new entries are sorted; the displayed ones already are.
    pub fn append(&mut self, entries: impl IntoIterator<Item = DirectoryEntry>, sort: SortSpec) {
        let mut incoming: Vec<ViewItem> = entries
            .into_iter()
            .map(|entry| {
                let item = ViewItem {
                    entry,
                    thumbnail: None,
                    seq: self.next_seq,
                };
                self.next_seq += 1;
                item
            })
            .collect();
        if incoming.is_empty() {
            return;
        }
        incoming.sort_by(|a, b| compare_items(a, b, sort));

        let existing = std::mem::take(&mut self.items);
        self.items.reserve(existing.len() + incoming.len());
        let mut existing = existing.into_iter().peekable();
        let mut incoming = incoming.into_iter().peekable();
        loop {
            let from_existing = match (existing.peek(), incoming.peek()) {
                (Some(a), Some(b)) => compare_items(a, b, sort) != Ordering::Greater,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if from_existing { existing.next() } else { incoming.next() };
            self.items.extend(next);
        }
    }

    /// Replaces everything, as search results do.
    pub fn replace(&mut self, entries: impl IntoIterator<Item = DirectoryEntry>, sort: SortSpec) {
        self.clear();
        self.append(entries, sort);
    }

    /// Re-sorts in place. Equal keys keep arrival order whatever the previous sort was.
    pub fn sort(&mut self, sort: SortSpec) {
        self.items.sort_by(|a, b| compare_items(a, b, sort));
    }

    /// Paths of files in `range` that still show a generic icon.
    pub fn files_without_thumbnail(&self, range: std::ops::Range<usize>) -> Vec<String> {
        self.items
            .get(range)
            .unwrap_or_default()
            .iter()
            .filter(|item| !item.entry.is_directory() && item.thumbnail.is_none())
            .map(|item| item.entry.path.clone())
            .collect()
    }
}

fn compare_items(a: &ViewItem, b: &ViewItem, sort: SortSpec) -> Ordering {
    compare_entries(&a.entry, &b.entry, sort).then_with(|| a.seq.cmp(&b.seq))
}

impl ThumbnailTarget for FolderView {
    fn apply_thumbnail(&mut self, path: &str, thumbnail: &Thumbnail) -> usize {
        let mut applied = 0;
        for item in self.items.iter_mut().filter(|item| item.entry.path == path) {
            if item.entry.is_directory() {
                continue;
            }
            item.thumbnail = Some(Arc::clone(thumbnail));
            applied += 1;
        }
        applied
    }
}
