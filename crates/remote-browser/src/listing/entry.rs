//! Directory entries as the server sends them and as the browser keeps them.

use serde::{Deserialize, Deserializer, Serialize};

/// What kind of file system object an entry is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    #[default]
    File,
    Directory,
}

impl EntryKind {
    /// Maps the wire `type` value. Only `"dir"` is a directory, everything else is a file.
    pub fn from_wire(value: &str) -> Self {
        if value == "dir" { Self::Directory } else { Self::File }
    }

    /// The wire spelling, as used by the search endpoint's `type` parameter.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "dir",
        }
    }
}

/// One record of a listing or search response, exactly as the server sent it.
///
/// Fields other than `name` may be missing. `size` is sometimes an empty string for
/// folders, so anything that is not a non-negative integer reads as absent.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerItem {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub last_modified: Option<i64>,
}

fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_u64()))
}

/// A file or folder on the server, as held by the browser.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes. Never set for directories by well-behaved servers.
    pub size: Option<u64>,
    /// Absolute server-side path, unique within its parent.
    pub path: String,
    /// Epoch milliseconds.
    pub last_modified: Option<i64>,
}

impl DirectoryEntry {
    /// Builds an entry from a wire record found in `parent`.
    /// The path is derived from `parent` and `name` when the server didn't send one.
    pub fn from_server_item(item: ServerItem, parent: &str) -> Self {
        let kind = item.kind.as_deref().map(EntryKind::from_wire).unwrap_or_default();
        let path = match item.path {
            Some(path) if !path.is_empty() => path,
            _ => join_path(parent, &item.name),
        };
        Self {
            name: item.name,
            kind,
            size: item.size,
            path,
            last_modified: item.last_modified,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Joins a server path and a child name: `("/", "a")` is `/a`, `("/x/", "a")` is `/x/a`.
pub fn join_path(parent: &str, name: &str) -> String {
    let trimmed = parent.trim_end_matches('/');
    format!("{trimmed}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ServerItem {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_join_path_at_root_and_below() {
        assert_eq!(join_path("/", "a.txt"), "/a.txt");
        assert_eq!(join_path("/Movies", "b.mkv"), "/Movies/b.mkv");
        assert_eq!(join_path("/Movies/", "b.mkv"), "/Movies/b.mkv");
    }

    #[test]
    fn test_path_derived_when_missing() {
        let entry = DirectoryEntry::from_server_item(parse(r#"{"name":"clip.mp4","type":"file","size":5}"#), "/Movies");
        assert_eq!(entry.path, "/Movies/clip.mp4");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, Some(5));
        assert_eq!(entry.last_modified, None);
    }

    #[test]
    fn test_server_path_wins() {
        let entry = DirectoryEntry::from_server_item(
            parse(r#"{"name":"x","type":"dir","path":"/elsewhere/x","lastModified":1700000000000}"#),
            "/Movies",
        );
        assert_eq!(entry.path, "/elsewhere/x");
        assert!(entry.is_directory());
        assert_eq!(entry.last_modified, Some(1_700_000_000_000));
    }

    #[test]
    fn test_folder_with_empty_string_size() {
        let entry = DirectoryEntry::from_server_item(parse(r#"{"name":"docs","type":"dir","size":""}"#), "/");
        assert_eq!(entry.size, None);
        assert_eq!(entry.path, "/docs");
    }

    #[test]
    fn test_missing_or_unknown_type_is_file() {
        let missing = DirectoryEntry::from_server_item(parse(r#"{"name":"a"}"#), "/");
        let unknown = DirectoryEntry::from_server_item(parse(r#"{"name":"b","type":"symlink"}"#), "/");
        assert_eq!(missing.kind, EntryKind::File);
        assert_eq!(unknown.kind, EntryKind::File);
    }

    #[test]
    fn test_negative_size_is_absent() {
        let item = parse(r#"{"name":"a","size":-3}"#);
        assert_eq!(item.size, None);
    }

    #[test]
    fn test_record_without_name_is_rejected() {
        assert!(serde_json::from_str::<ServerItem>(r#"{"type":"file"}"#).is_err());
    }
}
