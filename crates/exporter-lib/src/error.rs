//! Error types for array communication and configuration

/// Errors raised while talking to an array's management API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Login was rejected, or the array kept rejecting the session after a re-login.
    #[error("authentication against {ip} failed: status={status}, body={body}")]
    Auth { ip: String, status: u16, body: String },

    /// Non-success status code for an ordinary resource call.
    #[error("request to {ip} failed: status={status}, body={body}")]
    Status { ip: String, status: u16, body: String },

    /// Underlying HTTP transport error from `reqwest` (connect, TLS, timeout).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Valid JSON, but not the shape the endpoint is documented to return.
    #[error("unexpected response from {path}: expected {expected}")]
    UnexpectedShape { path: String, expected: &'static str },

    /// The request budget was shut down while waiting for a permit.
    #[error("request budget closed")]
    BudgetClosed,
}

impl ClientError {
    /// Auth failures survive the single re-login retry, so they are treated as
    /// fatal for the rest of a collection pass.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth { .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Auth { status, .. } | ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Convenience alias for client results.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Problems with a configured target.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("target {ip:?} is missing required field `{field}`")]
    MissingField { ip: String, field: &'static str },

    #[error("target {ip:?} is configured more than once")]
    DuplicateTarget { ip: String },
}

/// Reasons a scrape request cannot be served.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("no array registered for {0}")]
    UnknownTarget(String),

    #[error("unknown resource group {0:?}")]
    UnknownGroup(String),

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
}
