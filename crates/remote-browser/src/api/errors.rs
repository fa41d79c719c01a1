//! Error types for file server requests.

/// Error types for file server requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Server is not running or not reachable
    Unavailable(String),
    /// Request timed out
    Timeout,
    /// Server answered with a non-success status
    Status { code: u16, message: String },
    /// Response body couldn't be decoded
    Decode(String),
    /// Request was rejected before being sent (bad path, bad limit, bad URL)
    InvalidRequest(String),
    /// Any other transport failure (connection reset mid-stream, etc.)
    Other(String),
}

impl ApiError {
    /// Returns true if the same request may succeed if sent again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout | Self::Other(_))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "Server unavailable: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Status { code, message } if message.is_empty() => write!(f, "HTTP {code}"),
            Self::Status { code, message } => write!(f, "HTTP {code}: {message}"),
            Self::Decode(msg) => write!(f, "Couldn't decode response: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                code: status.as_u16(),
                message: String::new(),
            }
        } else {
            Self::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
