//! Discord sandbox relay binary.
//!
//! Composition root: reads configuration, wires the Discord gateway and
//! REST client to the router and execution provider, and runs until the
//! gateway reports an unrecoverable failure.

mod config;

use std::sync::Arc;

use anyhow::Context as _;
use sandbox_relay_discord::{DiscordApi, GatewayClient};
use sandbox_relay_provider::{ProviderConfig, SandboxProvider};
use sandbox_relay_session::{Router, SessionStore, spawn_expiry_sweep};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Upper bound on concurrently handled messages.
const MAX_IN_FLIGHT: usize = 16;

/// Inbound event buffer between the gateway and the dispatcher.
const EVENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env().context("configuration")?;
    info!(channel_id = %config.channel_id, "starting sandbox relay");

    let gateway = Arc::new(DiscordApi::new(config.discord_token.as_str()));
    let provider = Arc::new(SandboxProvider::new(ProviderConfig {
        api_url: config.api_url.clone(),
        token: config.sandbox_token.clone(),
        project_id: config.project_id.clone(),
        team_id: config.team_id.clone(),
        timeout_ms: config.timeout_ms,
        max_memory_mb: config.max_memory_mb,
        max_cpus: config.max_cpus,
    }));
    let store = Arc::new(SessionStore::new());
    let router = Arc::new(Router::new(
        config.channel_id.as_str(),
        gateway,
        provider,
        Arc::clone(&store),
    ));

    spawn_expiry_sweep(store);

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);

    // Bounded task-per-message dispatch: slow executions overlap without
    // stalling intake, and a failing handler never takes down the loop.
    let limiter = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let dispatcher = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
                break;
            };
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                if let Err(error) = router.dispatch(message).await {
                    error!(error = %error, "message handling failed");
                }
                drop(permit);
            });
        }
    });

    let mut gateway_client = GatewayClient::new(config.discord_token.as_str());
    let outcome = gateway_client.run(tx).await.context("discord gateway");

    dispatcher.abort();
    outcome
}
