//! Sorting configuration and logic for folder listings.
//!
//! All sorts are stable: entries with equal keys keep their arrival order, in both
//! directions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::listing::entry::{DirectoryEntry, EntryKind};

// ============================================================================
// Sorting configuration
// ============================================================================

/// Field to sort entries by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Name,
    Date,
    Size,
    Type,
}

/// Sort order (ascending or descending).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending { Self::Ascending } else { Self::Descending }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Active sort of a folder view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

// ============================================================================
// Sorting logic
// ============================================================================

/// Case-insensitive name comparison, without allocating.
fn compare_names(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    a.name
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.name.chars().flat_map(char::to_lowercase))
}

/// Size key: directories are -1 so they sort below every file; files without a size are 0.
fn size_key(entry: &DirectoryEntry) -> i128 {
    match entry.kind {
        EntryKind::Directory => -1,
        EntryKind::File => i128::from(entry.size.unwrap_or(0)),
    }
}

fn date_key(entry: &DirectoryEntry) -> i64 {
    entry.last_modified.unwrap_or(0)
}

/// Compares two entries by one field, in the given order.
pub fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry, spec: SortSpec) -> Ordering {
    let primary = match spec.field {
        SortField::Name => compare_names(a, b),
        SortField::Date => date_key(a).cmp(&date_key(b)),
        SortField::Size => size_key(a).cmp(&size_key(b)),
        SortField::Type => {
            // Directories before files, then by name
            let kind_cmp = match (a.kind, b.kind) {
                (EntryKind::Directory, EntryKind::File) => Ordering::Less,
                (EntryKind::File, EntryKind::Directory) => Ordering::Greater,
                _ => Ordering::Equal,
            };
            kind_cmp.then_with(|| compare_names(a, b))
        }
    };
    spec.order.apply(primary)
}

/// Sorts entries in place. Stable, so ties stay in arrival order.
pub fn sort_entries(entries: &mut [DirectoryEntry], spec: SortSpec) {
    entries.sort_by(|a, b| compare_entries(a, b, spec));
}
