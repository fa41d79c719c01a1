//! Request and response shapes of the file server endpoints.

use serde::{Deserialize, Serialize};

use crate::listing::entry::{EntryKind, ServerItem};

/// Default result cap for `/search`.
pub const DEFAULT_SEARCH_LIMIT: usize = 200;

/// Parameters of one `/files` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// Server path, starting with `/`
    pub path: String,
    /// Entries to skip before streaming
    pub offset: usize,
    /// Maximum entries to deliver
    pub limit: usize,
}

impl ListingQuery {
    pub fn new(path: impl Into<String>, offset: usize, limit: usize) -> Self {
        Self {
            path: path.into(),
            offset,
            limit,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("path", self.path.clone()),
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Filter criteria for `/search`. Unset criteria are left out of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub path: String,
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
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: None,
            kind: None,
            size_min: None,
            size_max: None,
            modified_after: None,
            modified_before: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// True when at least one criterion is set, so the search is worth sending.
    pub fn has_criteria(&self) -> bool {
        self.query.as_deref().is_some_and(|q| !q.trim().is_empty())
            || self.kind.is_some()
            || self.size_min.is_some()
            || self.size_max.is_some()
            || self.modified_after.is_some()
            || self.modified_before.is_some()
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("path", self.path.clone()), ("limit", self.limit.to_string())];
        if let Some(q) = self.query.as_deref().map(str::trim)
            && !q.is_empty()
        {
            params.push(("q", q.to_string()));
        }
        if let Some(kind) = self.kind {
            params.push(("type", kind.as_wire().to_string()));
        }
        if let Some(size_min) = self.size_min {
            params.push(("sizeMin", size_min.to_string()));
        }
        if let Some(size_max) = self.size_max {
            params.push(("sizeMax", size_max.to_string()));
        }
        if let Some(after) = self.modified_after {
            params.push(("modifiedAfter", after.to_string()));
        }
        if let Some(before) = self.modified_before {
            params.push(("modifiedBefore", before.to_string()));
        }
        params
    }
}

/// Body of a `/search` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<ServerItem>,
}

/// Extended metadata from `/meta`, shown by details views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedMetadata {
    pub size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_ms: Option<u64>,
    pub mime: Option<String>,
    pub item_count: Option<u64>,
}
