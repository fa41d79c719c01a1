//! HTTP client for the personal file server.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Serialize;

use super::{ApiError, ApiFuture, ByteStream, ExtendedMetadata, FileServer, ListingQuery, SearchQuery, SearchResponse};
use crate::listing::entry::ServerItem;

/// Time allowed to establish a TCP/TLS connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest silence tolerated between two reads of a response body.
/// Listings stream for as long as the folder is big, so they get no total timeout.
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Total timeout for small one-shot requests (thumbnails, metadata, mutations).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Search walks the folder tree server-side, so it gets more time.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CopyRequest<'a> {
    src: &'a str,
    dst: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest<'a> {
    path: &'a str,
    new_name: &'a str,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    path: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime: Option<&'a str>,
}

/// Client for the file server's REST API.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Clone)]
pub struct ServerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ServerClient {
    /// Creates a client for `base_url` (like `http://192.168.1.9:8080`).
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ApiError::InvalidRequest(format!("Bad server URL {base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http, base_url, token })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Replaces the bearer token. Token lifecycle belongs to the auth flow.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Builds `<base><endpoint>?<params>` with proper query encoding.
    pub fn endpoint_url(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
        Url::parse_with_params(
            &format!("{}{endpoint}", self.base_url),
            params.iter().map(|(key, value)| (*key, value.as_str())),
        )
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    pub fn meta_url(&self, path: &str) -> Result<Url, ApiError> {
        self.endpoint_url("/meta", &[("path", path.to_string())])
    }

    /// Media stream URL for players. Players can't set headers, so the token rides in the query.
    pub fn stream_url(&self, path: &str) -> Result<Url, ApiError> {
        let mut params = vec![("path", path.to_string())];
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }
        self.endpoint_url("/stream", &params)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_mutation(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        let response = builder.timeout(REQUEST_TIMEOUT).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// `DELETE /file`
    pub async fn delete_file(&self, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint_url("/file", &[("path", path.to_string())])?;
        log::debug!("delete_file: path={path}");
        self.send_mutation(self.request(Method::DELETE, url)).await
    }

    /// `POST /copy`
    pub async fn copy_file(&self, src: &str, dst: &str) -> Result<(), ApiError> {
        let url = self.endpoint_url("/copy", &[])?;
        log::debug!("copy_file: src={src}, dst={dst}");
        let builder = self.request(Method::POST, url).json(&CopyRequest { src, dst });
        self.send_mutation(builder).await
    }

    /// `POST /rename`
    pub async fn rename_file(&self, path: &str, new_name: &str) -> Result<(), ApiError> {
        let url = self.endpoint_url("/rename", &[])?;
        log::debug!("rename_file: path={path}, new_name={new_name}");
        let builder = self.request(Method::POST, url).json(&RenameRequest { path, new_name });
        self.send_mutation(builder).await
    }

    /// `POST /mkdir`
    pub async fn create_folder(&self, parent: &str, name: &str) -> Result<(), ApiError> {
        let url = self.endpoint_url("/mkdir", &[])?;
        let builder = self.request(Method::POST, url).json(&CreateRequest {
            path: parent,
            name,
            mime: None,
        });
        self.send_mutation(builder).await
    }

    /// `POST /createFile`
    pub async fn create_file(&self, parent: &str, name: &str, mime: Option<&str>) -> Result<(), ApiError> {
        let url = self.endpoint_url("/createFile", &[])?;
        let builder = self.request(Method::POST, url).json(&CreateRequest {
            path: parent,
            name,
            mime,
        });
        self.send_mutation(builder).await
    }
}

/// Turns a non-2xx response into `ApiError::Status`, keeping the body as the message.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        code: status.as_u16(),
        message: body.trim().to_string(),
    })
}

impl FileServer for ServerClient {
    fn list_files(&self, query: &ListingQuery) -> ApiFuture<ByteStream> {
        let url = self.endpoint_url("/files", &query.params());
        let client = self.clone();
        async move {
            let url = url?;
            log::debug!("list_files: GET {url}");
            let response = client.request(Method::GET, url).send().await?;
            let response = check_status(response).await?;
            let stream: ByteStream = response.bytes_stream().map_err(ApiError::from).boxed();
            Ok(stream)
        }
        .boxed()
    }

    fn search(&self, query: &SearchQuery) -> ApiFuture<Vec<ServerItem>> {
        let url = self.endpoint_url("/search", &query.params());
        let client = self.clone();
        async move {
            let url = url?;
            log::debug!("search: GET {url}");
            let response = client
                .request(Method::GET, url)
                .timeout(SEARCH_TIMEOUT)
                .send()
                .await?;
            let response = check_status(response).await?;
            let body = response.bytes().await?;
            let parsed: SearchResponse = serde_json::from_slice(&body)?;
            Ok(parsed.items)
        }
        .boxed()
    }

    fn fetch_thumbnail(&self, path: &str, width: u32, height: u32) -> ApiFuture<Bytes> {
        let url = self.endpoint_url(
            "/thumb",
            &[("path", path.to_string()), ("w", width.to_string()), ("h", height.to_string())],
        );
        let client = self.clone();
        async move {
            let response = client
                .request(Method::GET, url?)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;
            let response = check_status(response).await?;
            Ok(response.bytes().await?)
        }
        .boxed()
    }

    fn get_meta(&self, path: &str) -> ApiFuture<ExtendedMetadata> {
        let url = self.meta_url(path);
        let client = self.clone();
        async move {
            let response = client
                .request(Method::GET, url?)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;
            let response = check_status(response).await?;
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        }
        .boxed()
    }

    fn thumbnail_url(&self, path: &str, width: u32, height: u32) -> String {
        self.endpoint_url(
            "/thumb",
            &[("path", path.to_string()), ("w", width.to_string()), ("h", height.to_string())],
        )
        .map(String::from)
        .unwrap_or_default()
    }
}
