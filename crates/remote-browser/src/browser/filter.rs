//! Search filter applied over the current folder.

use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_SEARCH_LIMIT, SearchQuery};
use crate::listing::EntryKind;

/// Criteria of a folder search. Unset criteria don't constrain results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    /// Name fragment
    pub query: Option<String>,
    pub kind: Option<EntryKind>,
    /// Bytes
    pub size_min: Option<u64>,
    /// Bytes
    pub size_max: Option<u64>,
    /// Epoch milliseconds
    pub modified_after: Option<i64>,
    /// Epoch milliseconds
    pub modified_before: Option<i64>,
}

impl SearchFilter {
    pub fn by_name(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// The `/search` request for this filter rooted at `path`.
    pub fn to_query(&self, path: &str) -> SearchQuery {
        SearchQuery {
            path: path.to_string(),
            query: self.query.clone(),
            kind: self.kind,
            size_min: self.size_min,
            size_max: self.size_max,
            modified_after: self.modified_after,
            modified_before: self.modified_before,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.to_query("/").has_criteria()
    }
}
