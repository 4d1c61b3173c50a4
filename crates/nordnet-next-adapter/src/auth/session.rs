/*
[INPUT]:  Login responses and session keys
[OUTPUT]: Session retrieval, derived Authorization header, expiry status
[POS]:    Auth layer - session lifecycle storage
[UPDATE]: When changing session fields or storage strategy
*/

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};

use crate::types::{FeedEndpoint, FeedKind, LoginResponse};

/// Stored session with everything derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_key: String,
    /// `Basic base64(key:key)`, always derived from `session_key`
    pub authorization: String,
    /// Absent for sessions seeded from configuration
    pub expires_at: Option<DateTime<Utc>>,
    pub renewal_margin: Duration,
    pub public_feed: Option<FeedEndpoint>,
    pub private_feed: Option<FeedEndpoint>,
}

impl Session {
    pub fn from_login(response: &LoginResponse, renewal_margin: Duration) -> Self {
        // Lifetimes beyond chrono's range leave the expiry unknown
        let expires_at = i64::try_from(response.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        Self {
            session_key: response.session_key.clone(),
            authorization: basic_authorization(&response.session_key),
            expires_at,
            renewal_margin,
            public_feed: Some(response.feed_endpoint(FeedKind::Public)),
            private_feed: Some(response.feed_endpoint(FeedKind::Private)),
        }
    }

    /// Session known only by its key, e.g. handed over from another process
    pub fn from_session_key(session_key: impl Into<String>) -> Self {
        let session_key = session_key.into();
        Self {
            authorization: basic_authorization(&session_key),
            session_key,
            expires_at: None,
            renewal_margin: Duration::ZERO,
            public_feed: None,
            private_feed: None,
        }
    }

    pub fn feed_endpoint(&self, kind: FeedKind) -> Option<&FeedEndpoint> {
        match kind {
            FeedKind::Public => self.public_feed.as_ref(),
            FeedKind::Private => self.private_feed.as_ref(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() > expires_at)
    }
}

/// HTTP basic credentials using the session key as both username and password
pub fn basic_authorization(session_key: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{session_key}:{session_key}"))
    )
}

/// Delay before re-authenticating: the session lifetime minus the renewal margin, never negative.
pub fn renewal_delay(expires_in_secs: u64, shorten_expires: Duration) -> Duration {
    Duration::from_secs(expires_in_secs).saturating_sub(shorten_expires)
}

#[derive(Debug, Default)]
struct SessionSlot {
    session: Option<Session>,
    epoch: u64,
}

/// Thread-safe session store.
///
/// The session is replaced as one value, so the key and its Authorization header never diverge.
/// Every replacement or clear advances the epoch.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    data: Arc<RwLock<SessionSlot>>,
}

impl SessionStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new session, returning its epoch
    pub fn replace(&self, session: Session) -> u64 {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.epoch += 1;
        guard.session = Some(session);
        guard.epoch
    }

    /// Get a snapshot of the current session
    pub fn get(&self) -> Option<Session> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.clone()
    }

    pub fn session_key(&self) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.as_ref().map(|session| session.session_key.clone())
    }

    pub fn authorization(&self) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .session
            .as_ref()
            .map(|session| session.authorization.clone())
    }

    pub fn epoch(&self) -> u64 {
        self.data.read().unwrap_or_else(PoisonError::into_inner).epoch
    }

    pub fn is_authenticated(&self) -> bool {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.is_some()
    }

    /// Check if the session is missing or past its expiry
    pub fn is_expired(&self) -> bool {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.session.as_ref().is_none_or(Session::is_expired)
    }

    /// Clear the stored session
    pub fn clear(&self) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.epoch += 1;
        guard.session = None;
    }
}
