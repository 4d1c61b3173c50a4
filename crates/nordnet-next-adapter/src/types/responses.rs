/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

use super::enums::FeedKind;
use super::models::FeedEndpoint;

/// Feed address as announced in the login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEndpointInfo {
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub encrypted: Option<bool>,
}

impl FeedEndpointInfo {
    pub fn to_endpoint(&self, kind: FeedKind) -> FeedEndpoint {
        FeedEndpoint {
            kind,
            host: self.hostname.clone(),
            port: self.port,
        }
    }
}

/// Response from `POST login`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session_key: String,
    /// Session lifetime in seconds
    pub expires_in: u64,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub public_feed: FeedEndpointInfo,
    pub private_feed: FeedEndpointInfo,
}

impl LoginResponse {
    pub fn feed_endpoint(&self, kind: FeedKind) -> FeedEndpoint {
        match kind {
            FeedKind::Public => self.public_feed.to_endpoint(kind),
            FeedKind::Private => self.private_feed.to_endpoint(kind),
        }
    }
}

/// Error body the API returns alongside non-2xx statuses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
