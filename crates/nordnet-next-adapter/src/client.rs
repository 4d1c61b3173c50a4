/*
[INPUT]:  NordnetConfig and user credentials
[OUTPUT]: One handle for login, REST calls and feed subscriptions
[POS]:    Crate root - client facade over auth, http and feed layers
[UPDATE]: When exposing new client operations
*/

use reqwest::Method;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Session, SessionManager};
use crate::config::NordnetConfig;
use crate::feed::{FeedCommand, FeedEvent, FeedHub};
use crate::http::{CallGateway, RestClient, Result};
use crate::types::{Credentials, FeedKind};

/// nExt API client.
///
/// ```no_run
/// use nordnet_next_adapter::{Credentials, Nordnet, NordnetConfig, PublicKeySource};
///
/// # async fn run() -> nordnet_next_adapter::Result<()> {
/// let config = NordnetConfig::new(PublicKeySource::Path("NEXTAPI_TEST_public.pem".into()));
/// let client = Nordnet::new(config)?;
/// client.authenticate(&Credentials::new("user", "pass")).await?;
/// let accounts = client.get("accounts", None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Nordnet {
    sessions: SessionManager,
    gateway: CallGateway,
}

impl Nordnet {
    /// Build the client; fails when the public key cannot be loaded or parsed
    pub fn new(config: NordnetConfig) -> Result<Self> {
        let encryptor = config.public_key.load()?;
        let rest = RestClient::new(&config.http, config.base_url())?;
        let feeds = FeedHub::new(config.feed.clone())?;

        let sessions = SessionManager::new(rest.clone(), encryptor, feeds, config.shorten_expires());
        if let Some(session_key) = &config.session_key {
            sessions.seed(session_key.clone());
        }
        let gateway = CallGateway::new(rest, sessions.store().clone());

        info!(
            base_url = %config.base_url(),
            transport = ?config.feed.transport,
            "nExt client created"
        );
        Ok(Self { sessions, gateway })
    }

    /// Log in, start both feeds and schedule renewal
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        self.sessions.authenticate(credentials).await
    }

    pub async fn call(&self, method: Method, endpoint: &str, data: Option<&Value>) -> Result<Value> {
        self.gateway.call(method, endpoint, data).await
    }

    pub async fn get(&self, endpoint: &str, params: Option<&Value>) -> Result<Value> {
        self.gateway.get(endpoint, params).await
    }

    pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.gateway.post(endpoint, body).await
    }

    pub async fn put(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.gateway.put(endpoint, body).await
    }

    pub async fn delete(&self, endpoint: &str, params: Option<&Value>) -> Result<Value> {
        self.gateway.delete(endpoint, params).await
    }

    /// Subscribe on the public feed, e.g. `subscribe("price", json!({"i": "101", "m": 11}))`
    pub async fn subscribe(&self, event_type: &str, args: Value) -> Result<()> {
        self.sessions.feeds().subscribe(event_type, args).await
    }

    pub async fn unsubscribe(&self, event_type: &str, args: Value) -> Result<()> {
        self.sessions.feeds().unsubscribe(event_type, args).await
    }

    /// Send a raw command on either feed
    pub async fn send_command(&self, kind: FeedKind, command: &FeedCommand) -> Result<()> {
        self.sessions.feeds().send(kind, command).await
    }

    pub fn events(&self, kind: FeedKind) -> broadcast::Receiver<FeedEvent> {
        self.sessions.feeds().events(kind)
    }

    pub async fn is_feed_connected(&self, kind: FeedKind) -> bool {
        self.sessions.feeds().is_connected(kind).await
    }

    /// Changes whenever the feed is re-authenticated
    pub async fn feed_connection_id(&self, kind: FeedKind) -> Option<Uuid> {
        self.sessions.feeds().connection_id(kind).await
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.session()
    }

    pub fn session_key(&self) -> Option<String> {
        self.sessions.session_key()
    }

    /// Wait until an in-flight authentication and its feed setup are done
    pub async fn feeds_settled(&self) {
        self.sessions.feeds_settled().await;
    }

    pub fn cancel_renewal(&self) {
        self.sessions.cancel_renewal();
    }

    /// Stop renewal and close both feeds
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
