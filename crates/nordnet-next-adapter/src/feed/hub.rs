/*
[INPUT]:  Feed endpoints from the session and feed commands from callers
[OUTPUT]: At most one live connection per feed kind, replaced on re-authentication
[POS]:    Feed layer - public/private feed slots
[UPDATE]: When changing feed replacement or command routing
*/

use futures_util::future::join;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::FeedConfig;
use crate::feed::{FeedCommand, FeedConnection, FeedConnector, FeedEvent, FeedEventBus};
use crate::http::{NordnetError, Result};
use crate::types::{FeedEndpoint, FeedKind};

/// Owns the public and private feed connections and the event bus they publish to
#[derive(Debug)]
pub struct FeedHub {
    connector: FeedConnector,
    config: FeedConfig,
    bus: FeedEventBus,
    public: Mutex<Option<FeedConnection>>,
    private: Mutex<Option<FeedConnection>>,
}

impl FeedHub {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let connector = FeedConnector::new(config.transport)?;
        Ok(Self::with_connector(connector, config))
    }

    pub fn with_connector(connector: FeedConnector, config: FeedConfig) -> Self {
        Self {
            connector,
            bus: FeedEventBus::new(config.event_capacity),
            config,
            public: Mutex::new(None),
            private: Mutex::new(None),
        }
    }

    pub fn bus(&self) -> &FeedEventBus {
        &self.bus
    }

    /// Listen to events from one feed; survives connection replacement
    pub fn events(&self, kind: FeedKind) -> broadcast::Receiver<FeedEvent> {
        self.bus.subscribe(kind)
    }

    fn slot(&self, kind: FeedKind) -> &Mutex<Option<FeedConnection>> {
        match kind {
            FeedKind::Public => &self.public,
            FeedKind::Private => &self.private,
        }
    }

    /// Open a logged-in connection to `endpoint` and install it, closing any previous one.
    ///
    /// On failure the previous connection is left in place.
    pub async fn authenticate_feed(&self, endpoint: FeedEndpoint, session_key: &str) -> Result<()> {
        let kind = endpoint.kind;
        let connection = FeedConnection::open(
            &self.connector,
            endpoint,
            session_key,
            &self.config,
            self.bus.clone(),
        )
        .await?;
        let connection_id = connection.connection_id();

        let previous = self.slot(kind).lock().await.replace(connection);
        if let Some(previous) = previous {
            info!(
                %kind,
                old_connection_id = %previous.connection_id(),
                new_connection_id = %connection_id,
                "feed connection replaced"
            );
            previous.close().await;
        }
        Ok(())
    }

    /// Authenticate both feeds concurrently; a failure on one does not affect the other.
    pub async fn authenticate_feeds(
        &self,
        public: Option<FeedEndpoint>,
        private: Option<FeedEndpoint>,
        session_key: &str,
    ) -> (Result<()>, Result<()>) {
        join(
            self.authenticate_optional(FeedKind::Public, public, session_key),
            self.authenticate_optional(FeedKind::Private, private, session_key),
        )
        .await
    }

    async fn authenticate_optional(
        &self,
        kind: FeedKind,
        endpoint: Option<FeedEndpoint>,
        session_key: &str,
    ) -> Result<()> {
        let endpoint = endpoint.ok_or_else(|| {
            NordnetError::feed(kind, "session carries no endpoint for this feed")
        })?;
        let result = self.authenticate_feed(endpoint, session_key).await;
        if let Err(e) = &result {
            error!(%kind, error = %e, "feed authentication failed");
        }
        result
    }

    /// Send a raw command on either feed
    pub async fn send(&self, kind: FeedKind, command: &FeedCommand) -> Result<()> {
        // The slot is released before writing so a stalled peer cannot hold up replacement
        let writer = self
            .slot(kind)
            .lock()
            .await
            .as_ref()
            .map(FeedConnection::writer)
            .ok_or(NordnetError::FeedNotConnected(kind))?;
        writer.send(command).await
    }

    /// Subscribe on the public feed to events of `event_type`
    pub async fn subscribe(&self, event_type: &str, args: Value) -> Result<()> {
        let command = FeedCommand::subscribe(event_type, args)?;
        self.send(FeedKind::Public, &command).await
    }

    pub async fn unsubscribe(&self, event_type: &str, args: Value) -> Result<()> {
        let command = FeedCommand::unsubscribe(event_type, args)?;
        self.send(FeedKind::Public, &command).await
    }

    pub async fn is_connected(&self, kind: FeedKind) -> bool {
        self.slot(kind)
            .lock()
            .await
            .as_ref()
            .is_some_and(FeedConnection::is_alive)
    }

    /// Id of the installed connection, alive or not
    pub async fn connection_id(&self, kind: FeedKind) -> Option<Uuid> {
        self.slot(kind)
            .lock()
            .await
            .as_ref()
            .map(FeedConnection::connection_id)
    }

    pub async fn close(&self, kind: FeedKind) {
        let connection = self.slot(kind).lock().await.take();
        if let Some(connection) = connection {
            connection.close().await;
        }
    }

    pub async fn close_all(&self) {
        join(self.close(FeedKind::Public), self.close(FeedKind::Private)).await;
    }
}
