/*
[INPUT]:  NORDNET_USERNAME, NORDNET_PASSWORD and NORDNET_PUBLIC_KEY (PEM path)
[OUTPUT]: Price events from the public feed
[POS]:    Examples - feed subscriptions
[UPDATE]: When feed commands or event delivery changes
*/

use nordnet_next_adapter::*;
use serde_json::json;
use tokio::time::{Duration, timeout};

/// Example: subscribe to prices of one instrument on the public feed
///
/// Ericsson B on the Stockholm market: identifier "101", market 11.
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== nExt Market Data Example ===\n");

    let (Ok(username), Ok(password), Ok(key_path)) = (
        std::env::var("NORDNET_USERNAME"),
        std::env::var("NORDNET_PASSWORD"),
        std::env::var("NORDNET_PUBLIC_KEY"),
    ) else {
        println!("Set NORDNET_USERNAME, NORDNET_PASSWORD and NORDNET_PUBLIC_KEY to run this example");
        return Ok(());
    };

    let client = Nordnet::new(NordnetConfig::new(PublicKeySource::Path(key_path.into())))?;
    let mut events = client.events(FeedKind::Public);

    client.authenticate(&Credentials::new(username, password)).await?;
    client.feeds_settled().await;
    println!("✓ Feeds authenticated");

    client.subscribe("price", json!({"i": "101", "m": 11})).await?;
    println!("✓ Subscribed to price for 101@11\n");

    for _ in 0..10 {
        match timeout(Duration::from_secs(30), events.recv()).await {
            Ok(Ok(event)) => match &event.body {
                FeedEventBody::Message(message) => println!("{} {}", event.received_at, message),
                FeedEventBody::MalformedFrame { error, .. } => println!("malformed frame: {error}"),
                FeedEventBody::Disconnected { reason } => {
                    println!("feed disconnected: {reason:?}");
                    break;
                }
            },
            Ok(Err(e)) => println!("listener lagged: {e}"),
            Err(_) => {
                println!("no price within 30 s");
                break;
            }
        }
    }

    client.unsubscribe("price", json!({"i": "101", "m": 11})).await?;
    client.shutdown().await;
    println!("\n✓ Market data example complete");
    Ok(())
}
