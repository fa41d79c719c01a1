//! Streaming folder listing: incremental NDJSON decoding of `/files` responses.
//!
//! The server sends one JSON object per line. Lines are decoded as soon as they are
//! complete, so a caller sees the first entries of a huge folder long before the body
//! ends. A broken line is skipped; a line with an `error` field ends the listing.

use futures_util::{Stream, StreamExt};

use crate::api::{ApiError, FileServer, ListingQuery};
use crate::listing::entry::{DirectoryEntry, ServerItem};

// ============================================================================
// Types
// ============================================================================

/// How a listing call ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingOutcome {
    /// Transport failure, rejected request, or server-reported error line
    pub error: Option<String>,
    /// True when delivery stopped before the stream ran out (cap hit or caller stopped)
    pub has_more: bool,
}

impl ListingOutcome {
    fn exhausted() -> Self {
        Self::default()
    }

    fn stopped() -> Self {
        Self {
            error: None,
            has_more: true,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            has_more: false,
        }
    }
}

/// Splits a chunked byte stream into complete lines.
///
/// Chunks may cut lines (and UTF-8 sequences) anywhere; bytes are held until the
/// newline arrives. Blank lines are dropped.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete.split(|&b| b == b'\n').filter_map(Self::decode_line).collect()
    }

    /// Returns the final line when the body didn't end with a newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        Self::decode_line(&rest)
    }

    fn decode_line(bytes: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(bytes);
        let line = line.trim();
        if line.is_empty() { None } else { Some(line.to_string()) }
    }
}

/// One decoded line of a listing body.
#[derive(Debug, PartialEq)]
enum ListingLine {
    Item(ServerItem),
    Error(String),
}

fn parse_line(line: &str) -> Result<ListingLine, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if let Some(error) = value.get("error") {
        let message = match error.as_str() {
            Some(text) => text.to_string(),
            None => error.to_string(),
        };
        return Ok(ListingLine::Error(message));
    }
    Ok(ListingLine::Item(serde_json::from_value(value)?))
}

// ============================================================================
// Consumption
// ============================================================================

/// Delivery bookkeeping for one call.
struct Delivery<'a, F> {
    parent: &'a str,
    limit: usize,
    delivered: usize,
    on_item: F,
}

impl<F> Delivery<'_, F>
where
    F: FnMut(DirectoryEntry) -> bool,
{
    /// Handles one line. Returns the outcome when delivery must stop here.
    fn accept(&mut self, line: &str) -> Option<ListingOutcome> {
        match parse_line(line) {
            Ok(ListingLine::Error(message)) => {
                log::debug!("listing {}: server reported error: {message}", self.parent);
                Some(ListingOutcome::failed(message))
            }
            Ok(ListingLine::Item(item)) => {
                let keep_going = (self.on_item)(DirectoryEntry::from_server_item(item, self.parent));
                self.delivered += 1;
                if !keep_going || self.delivered >= self.limit {
                    Some(ListingOutcome::stopped())
                } else {
                    None
                }
            }
            Err(e) => {
                log::debug!("listing {}: skipping malformed line ({e}): {line}", self.parent);
                None
            }
        }
    }
}

/// Consumes an already opened listing body.
///
/// `on_item` runs synchronously for each decoded entry, in arrival order; returning
/// `false` stops delivery. At most `limit` entries are delivered.
pub async fn consume_listing<S, F>(mut body: S, parent: &str, limit: usize, on_item: F) -> ListingOutcome
where
    S: Stream<Item = Result<bytes::Bytes, ApiError>> + Unpin,
    F: FnMut(DirectoryEntry) -> bool,
{
    let mut decoder = NdjsonDecoder::new();
    let mut delivery = Delivery {
        parent,
        limit,
        delivered: 0,
        on_item,
    };

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                log::debug!("listing {parent}: stream failed after {} items: {e}", delivery.delivered);
                return ListingOutcome::failed(e.to_string());
            }
        };
        for line in decoder.push(&chunk) {
            if let Some(outcome) = delivery.accept(&line) {
                return outcome;
            }
        }
    }

    if let Some(line) = decoder.finish()
        && let Some(outcome) = delivery.accept(&line)
    {
        return outcome;
    }
    log::debug!("listing {parent}: stream ended after {} items", delivery.delivered);
    ListingOutcome::exhausted()
}

/// Rejects queries the server would misread.
fn validate(query: &ListingQuery) -> Result<(), ApiError> {
    if !query.path.starts_with('/') {
        return Err(ApiError::InvalidRequest(format!("path must start with '/': {}", query.path)));
    }
    if query.limit == 0 {
        return Err(ApiError::InvalidRequest(String::from("limit must be at least 1")));
    }
    Ok(())
}

/// Streams one page of a folder listing from `server`, calling `on_item` per entry.
///
/// Never fails: transport errors, non-2xx answers and error lines come back in
/// [`ListingOutcome::error`]. No retry, no state kept between calls.
pub async fn stream_listing<F>(server: &dyn FileServer, query: &ListingQuery, on_item: F) -> ListingOutcome
where
    F: FnMut(DirectoryEntry) -> bool,
{
    if let Err(e) = validate(query) {
        return ListingOutcome::failed(e.to_string());
    }
    log::debug!(
        "stream_listing: path={}, offset={}, limit={}",
        query.path,
        query.offset,
        query.limit
    );
    match server.list_files(query).await {
        Ok(body) => consume_listing(body, &query.path, query.limit, on_item).await,
        Err(e) => ListingOutcome::failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryServer;
    use bytes::Bytes;
    use futures_util::stream;

    fn body(chunks: &[&str]) -> impl Stream<Item = Result<Bytes, ApiError>> + Unpin {
        let chunks: Vec<Result<Bytes, ApiError>> = chunks.iter().map(|c| Ok(Bytes::from(c.to_string()))).collect();
        stream::iter(chunks)
    }

    async fn collect(chunks: &[&str], limit: usize) -> (Vec<String>, ListingOutcome) {
        let mut names = Vec::new();
        let outcome = consume_listing(body(chunks), "/d", limit, |entry| {
            names.push(entry.name);
            true
        })
        .await;
        (names, outcome)
    }

    #[test]
    fn test_decoder_joins_split_lines() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(b"{\"name\":").is_empty());
        assert_eq!(decoder.push(b"\"a\"}\n{\"na"), vec![r#"{"name":"a"}"#]);
        assert_eq!(decoder.push(b"me\":\"b\"}\n\n"), vec![r#"{"name":"b"}"#]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_keeps_multibyte_chars_split_across_chunks() {
        let line = "{\"name\":\"caf\u{e9}\"}\n".as_bytes();
        let (head, tail) = line.split_at(13);
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["{\"name\":\"caf\u{e9}\"}"]);
    }

    #[tokio::test]
    async fn test_exhausted_stream_has_no_more() {
        let (names, outcome) = collect(&["{\"name\":\"a\"}\n{\"name\":\"b\"}\n"], 10).await;
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(outcome, ListingOutcome::exhausted());
    }

    #[tokio::test]
    async fn test_final_line_without_newline_is_delivered() {
        let (names, outcome) = collect(&["{\"name\":\"a\"}\n{\"name\":", "\"b\"}"], 10).await;
        assert_eq!(names, vec!["a", "b"]);
        assert!(!outcome.has_more);
    }

    #[tokio::test]
    async fn test_cap_stops_delivery_and_reports_more() {
        let lines: String = (0..8).map(|i| format!("{{\"name\":\"f{i}\"}}\n")).collect();
        let (names, outcome) = collect(&[&lines], 3).await;
        assert_eq!(names, vec!["f0", "f1", "f2"]);
        assert!(outcome.has_more);
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn test_caller_can_stop_early() {
        let mut seen = 0;
        let outcome = consume_listing(body(&["{\"name\":\"a\"}\n{\"name\":\"b\"}\n"]), "/", 10, |_| {
            seen += 1;
            false
        })
        .await;
        assert_eq!(seen, 1);
        assert!(outcome.has_more);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let (names, outcome) = collect(&["{\"name\":\"a\"}\nnot json\n{\"type\":\"file\"}\n{\"name\":\"b\"}\n"], 10).await;
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn test_error_line_is_terminal() {
        let (names, outcome) = collect(
            &["{\"name\":\"a\"}\n{\"error\":\"Permission denied\"}\n{\"name\":\"b\"}\n"],
            10,
        )
        .await;
        assert_eq!(names, vec!["a"]);
        assert_eq!(outcome.error.as_deref(), Some("Permission denied"));
        assert!(!outcome.has_more);
    }

    #[tokio::test]
    async fn test_transport_failure_mid_stream_is_reported() {
        let chunks: Vec<Result<Bytes, ApiError>> = vec![
            Ok(Bytes::from_static(b"{\"name\":\"a\"}\n")),
            Err(ApiError::Other(String::from("connection reset"))),
        ];
        let mut names = Vec::new();
        let outcome = consume_listing(stream::iter(chunks), "/", 10, |e| {
            names.push(e.name);
            true
        })
        .await;
        assert_eq!(names, vec!["a"]);
        assert_eq!(outcome.error.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn test_invalid_queries_never_reach_the_server() {
        let server = InMemoryServer::with_file_count("/", 3);
        let relative = stream_listing(&server, &ListingQuery::new("docs", 0, 10), |_| true).await;
        let zero_limit = stream_listing(&server, &ListingQuery::new("/", 0, 0), |_| true).await;
        assert!(relative.error.is_some());
        assert!(zero_limit.error.is_some());
        assert!(server.listing_requests().is_empty());
    }

    #[tokio::test]
    async fn test_server_cap_with_offset() {
        // More items than the limit: at most `limit` delivered, has_more reported
        let server = InMemoryServer::with_file_count("/Movies", 25);
        server.set_chunk_size(5);
        let mut paths = Vec::new();
        let outcome = stream_listing(&server, &ListingQuery::new("/Movies", 20, 10), |e| {
            paths.push(e.path);
            true
        })
        .await;
        assert_eq!(paths.len(), 5);
        assert_eq!(paths[0], "/Movies/file_00020.jpg");
        assert!(!outcome.has_more);
    }

    #[tokio::test]
    async fn test_missing_folder_reports_status() {
        let server = InMemoryServer::new();
        let outcome = stream_listing(&server, &ListingQuery::new("/gone", 0, 10), |_| true).await;
        assert_eq!(outcome.error.as_deref(), Some("HTTP 404: Not found"));
    }
}
