/*
[INPUT]:  NORDNET_USERNAME, NORDNET_PASSWORD and NORDNET_PUBLIC_KEY (PEM path)
[OUTPUT]: Session details and account list
[POS]:    Examples - authentication and REST calls
[UPDATE]: When the auth flow or client API changes
*/

use nordnet_next_adapter::*;

/// Example: log in to the nExt test environment and list accounts
///
/// Login encrypts the credentials with the API's RSA public key; the session
/// key is then used as HTTP basic credentials for every REST call.
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== nExt Authentication Example ===\n");

    let (Ok(username), Ok(password), Ok(key_path)) = (
        std::env::var("NORDNET_USERNAME"),
        std::env::var("NORDNET_PASSWORD"),
        std::env::var("NORDNET_PUBLIC_KEY"),
    ) else {
        println!("Set NORDNET_USERNAME, NORDNET_PASSWORD and NORDNET_PUBLIC_KEY to run this example");
        return Ok(());
    };

    let config = NordnetConfig::new(PublicKeySource::Path(key_path.into()));
    println!("✓ Using {}", config.base_url());

    let client = Nordnet::new(config)?;
    let session = client.authenticate(&Credentials::new(username, password)).await?;
    println!("✓ Authenticated, session expires at {:?}", session.expires_at);
    if let Some(feed) = session.feed_endpoint(FeedKind::Public) {
        println!("  Public feed: {feed}");
    }

    let accounts = client.get("accounts", None).await?;
    println!("\nAccounts:\n{}", serde_json::to_string_pretty(&accounts)?);

    client.shutdown().await;
    println!("\n✓ Authentication example complete");
    Ok(())
}
