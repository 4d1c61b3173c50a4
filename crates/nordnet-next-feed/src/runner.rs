/*
[INPUT]:  Runner configuration, credentials and a shutdown token
[OUTPUT]: Authenticated client streaming feed events into the log
[POS]:    Runtime layer - feed session lifecycle
[UPDATE]: When changing subscription handling or event logging
*/

use std::time::Duration;

use anyhow::{Context, Result};
use nordnet_next_adapter::{Credentials, FeedEvent, FeedEventBody, FeedKind, Nordnet};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;

const USERNAME_ENV: &str = "NORDNET_USERNAME";
const PASSWORD_ENV: &str = "NORDNET_PASSWORD";
const RESUBSCRIBE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Event counters reported when the runner stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages: u64,
    pub malformed: u64,
    pub disconnects: u64,
    pub lagged: u64,
}

/// Read credentials from `NORDNET_USERNAME` / `NORDNET_PASSWORD`
pub fn credentials_from_env() -> Result<Credentials> {
    let username = std::env::var(USERNAME_ENV).with_context(|| format!("{USERNAME_ENV} is not set"))?;
    let password = std::env::var(PASSWORD_ENV).with_context(|| format!("{PASSWORD_ENV} is not set"))?;
    Ok(Credentials::new(username, password))
}

/// Keeps one client logged in, subscribed and draining both feeds
#[derive(Debug)]
pub struct FeedRunner {
    client: Nordnet,
    config: RunnerConfig,
}

impl FeedRunner {
    /// Build the client; fails fast on an unusable public key or base URL
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let client = Nordnet::new(config.client.clone()).context("create nExt client")?;
        Ok(Self { client, config })
    }

    pub fn client(&self) -> &Nordnet {
        &self.client
    }

    /// Authenticate, subscribe and log events until `shutdown` is cancelled.
    ///
    /// Subscriptions are re-sent whenever the public feed connection is replaced,
    /// which happens on every session renewal.
    pub async fn run(&self, credentials: &Credentials, shutdown: CancellationToken) -> Result<RunSummary> {
        let mut public = self.client.events(FeedKind::Public);
        let mut private = self.client.events(FeedKind::Private);

        let session = self
            .client
            .authenticate(credentials)
            .await
            .context("authenticate")?;
        info!(expires_at = ?session.expires_at, "authenticated");

        self.client.feeds_settled().await;
        let mut subscribed_on: Option<Uuid> = None;
        self.resubscribe_if_replaced(&mut subscribed_on).await;

        let mut summary = RunSummary::default();
        let mut check = tokio::time::interval(RESUBSCRIBE_CHECK_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                _ = check.tick() => {
                    self.resubscribe_if_replaced(&mut subscribed_on).await;
                }
                received = public.recv() => {
                    if !record(received, &mut summary) {
                        break;
                    }
                }
                received = private.recv() => {
                    if !record(received, &mut summary) {
                        break;
                    }
                }
            }
        }

        self.client.shutdown().await;
        info!(
            messages = summary.messages,
            malformed = summary.malformed,
            disconnects = summary.disconnects,
            lagged = summary.lagged,
            "feed runner stopped"
        );
        Ok(summary)
    }

    async fn resubscribe_if_replaced(&self, subscribed_on: &mut Option<Uuid>) {
        if !self.client.is_feed_connected(FeedKind::Public).await {
            return;
        }
        let current = self.client.feed_connection_id(FeedKind::Public).await;
        if current.is_none() || current == *subscribed_on {
            return;
        }

        for subscription in &self.config.subscriptions {
            match self
                .client
                .subscribe(&subscription.event_type, subscription.args.clone())
                .await
            {
                Ok(()) => info!(
                    event_type = %subscription.event_type,
                    args = %subscription.args,
                    "subscribed"
                ),
                Err(e) => {
                    error!(event_type = %subscription.event_type, error = %e, "subscribe failed");
                    return;
                }
            }
        }
        *subscribed_on = current;
    }
}

/// Log one received event; returns false once the bus is gone
fn record(received: Result<FeedEvent, RecvError>, summary: &mut RunSummary) -> bool {
    match received {
        Ok(event) => {
            match &event.body {
                FeedEventBody::Message(message) => {
                    summary.messages += 1;
                    info!(
                        kind = %event.kind,
                        event_type = event.message_type().unwrap_or("unknown"),
                        "feed event"
                    );
                    debug!(kind = %event.kind, %message, "feed event payload");
                }
                FeedEventBody::MalformedFrame { error, .. } => {
                    summary.malformed += 1;
                    warn!(kind = %event.kind, %error, "malformed feed frame");
                }
                FeedEventBody::Disconnected { reason } => {
                    summary.disconnects += 1;
                    warn!(kind = %event.kind, reason = ?reason, "feed disconnected");
                }
            }
            true
        }
        Err(RecvError::Lagged(skipped)) => {
            summary.lagged += skipped;
            warn!(skipped, "event listener lagged");
            true
        }
        Err(RecvError::Closed) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_record_counts_by_body() {
        let mut summary = RunSummary::default();
        let id = Uuid::new_v4();

        assert!(record(
            Ok(FeedEvent::new(FeedKind::Public, id, FeedEventBody::Message(json!({"type": "price"})))),
            &mut summary
        ));
        assert!(record(
            Ok(FeedEvent::new(
                FeedKind::Public,
                id,
                FeedEventBody::MalformedFrame { raw: "x".into(), error: "bad".into() }
            )),
            &mut summary
        ));
        assert!(record(
            Ok(FeedEvent::new(FeedKind::Private, id, FeedEventBody::Disconnected { reason: None })),
            &mut summary
        ));
        assert!(record(Err(RecvError::Lagged(4)), &mut summary));
        assert!(!record(Err(RecvError::Closed), &mut summary));

        assert_eq!(
            summary,
            RunSummary { messages: 1, malformed: 1, disconnects: 1, lagged: 4 }
        );
    }
}
