/*
[INPUT]:  Error sources (HTTP, API, crypto, feed sockets, serialization)
[OUTPUT]: Structured error types with context
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::{ApiErrorBody, FeedKind};

/// Main error type for the nExt adapter
#[derive(Error, Debug)]
pub enum NordnetError {
    /// Transport-level HTTP failure (no structured response)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error ({status} {status_text}): {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        status_text: String,
        code: Option<String>,
        message: Option<String>,
    },

    /// Login failed; the session has been cleared
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<Box<NordnetError>>,
    },

    /// REST call attempted without a session key
    #[error("Client is not authenticated, call authenticate first")]
    NotAuthenticated,

    /// Public key material could not be parsed
    #[error("Invalid RSA public key: {0}")]
    KeyFormat(String),

    /// RSA encryption of the credential failed
    #[error("Credential encryption failed: {0}")]
    Encryption(String),

    /// Command sent to a feed with no live connection
    #[error("{0} feed is not connected")]
    FeedNotConnected(FeedKind),

    /// Feed connect, handshake or write failed
    #[error("{kind} feed error: {message}")]
    Feed { kind: FeedKind, message: String },

    /// Connection timeout
    #[error("Connection timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NordnetError {
    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        match self {
            NordnetError::Authentication { .. } | NordnetError::NotAuthenticated => true,
            NordnetError::Api { status, .. } => *status == StatusCode::UNAUTHORIZED.as_u16(),
            _ => false,
        }
    }

    /// Check if the failure happened below the API (no structured response)
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            NordnetError::Http(_) | NordnetError::Io(_) | NordnetError::Timeout { .. }
        )
    }

    /// HTTP status of an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            NordnetError::Api { status, .. } => Some(*status),
            NordnetError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Create an API error from status code and the (possibly empty) response body
    pub fn api_error(status: StatusCode, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        NordnetError::Api {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            code: parsed.code,
            message: parsed.message,
        }
    }

    /// Wrap a login failure
    pub fn authentication(source: NordnetError) -> Self {
        NordnetError::Authentication {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn feed(kind: FeedKind, message: impl Into<String>) -> Self {
        NordnetError::Feed {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias for nExt operations
pub type Result<T> = std::result::Result<T, NordnetError>;
