/*
[INPUT]:  CLI arguments, YAML configuration file, environment credentials, OS shutdown signals
[OUTPUT]: Logged-in feed session logging events until shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nordnet_next_feed::{FeedRunner, RunnerConfig, credentials_from_env};

#[derive(Parser, Debug)]
#[command(name = "nordnet-next-feed", version, about = "nExt API feed runner")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting nordnet-next-feed"
    );

    let config = load_config(&args.config_path)?;
    info!(
        base_url = config.client.base_url(),
        subscription_count = config.subscriptions.len(),
        "configuration loaded"
    );

    let runner = FeedRunner::new(config)?;

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let credentials = credentials_from_env()?;
    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let summary = runner
        .run(&credentials, shutdown)
        .await
        .context("run feed session")?;
    info!(messages = summary.messages, "shutdown complete");

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &Path) -> Result<RunnerConfig> {
    RunnerConfig::from_file(path).context("load config")
}

/// Cancel `shutdown` on the first SIGINT or SIGTERM
fn cancel_on_signal(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let signal = tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            result = terminate() => result.map(|()| "SIGTERM"),
        };
        match signal {
            Ok(name) => {
                info!(signal = name, "stopping feed runner");
                shutdown.cancel();
            }
            Err(err) => warn!(error = %err, "failed to install signal handler"),
        }
    });
}

#[cfg(unix)]
async fn terminate() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> std::io::Result<()> {
    std::future::pending().await
}
