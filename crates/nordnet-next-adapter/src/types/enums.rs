/*
[INPUT]:  nExt API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two push feeds a connection or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Market data (prices, trades, depth)
    Public,
    /// Account events (orders, trades, positions)
    Private,
}

impl FeedKind {
    pub const ALL: [FeedKind; 2] = [FeedKind::Public, FeedKind::Private];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Public => "public",
            FeedKind::Private => "private",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API environment selecting the REST base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Live,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Test => "https://api.test.nordnet.se/next/2/",
            Environment::Live => "https://api.nordnet.se/next/2/",
        }
    }
}

/// How feed sockets are established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedTransport {
    /// TLS over TCP, verified against the webpki root store
    #[default]
    Tls,
    /// Unencrypted TCP, for local gateways
    Plain,
}
