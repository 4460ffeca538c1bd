// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use cleanroom::{
    api::router,
    blockchain::ContractRegistry,
    channel::{DeploymentChannel, DeploymentStatus},
    config::{ClientConfig, ServiceConfig, DEV_MODE_ENV, LOG_FORMAT_ENV},
    controller::CleanRoom,
    state::AppState,
    wallet::{LocalWallet, WalletProvider},
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(name = "cleanroom")]
#[command(version)]
#[command(about = "Data clean room client for the enclave registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the demo enclave HTTP service
    Serve,

    /// Request an enclave, wait for its result and follow the deployment
    Run {
        /// Seconds to wait for the deployment to complete
        #[arg(long, default_value = "600")]
        wait_secs: u64,
    },

    /// List the wallet's enclave requests
    List,

    /// Check the enclave service health endpoint
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing();

    match cli.command {
        Commands::Serve => serve().await,
        Commands::Run { wait_secs } => run(Duration::from_secs(wait_secs)).await,
        Commands::List => list().await,
        Commands::Health => health().await,
    }
}

fn init_tracing() {
    let dev_mode = env::var(DEV_MODE_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_filter = if dev_mode {
        "debug,tower_http=debug"
    } else {
        "info,tower_http=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = env::var(LOG_FORMAT_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn serve() -> Result<()> {
    let config = ServiceConfig::from_env()?;
    let addr = config.bind_addr;
    let app = router(AppState::new(config)?);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Enclave service listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")
}

type Client = CleanRoom<LocalWallet, ContractRegistry, DeploymentChannel>;

async fn client(config: &ClientConfig) -> Result<Client> {
    let wallet = LocalWallet::from_config(config.wallet_private_key.as_deref())?;
    let registry = ContractRegistry::connect(
        config.network.clone(),
        config.contract_address,
        wallet.wallet(),
        config.request_fee,
    );
    registry.verify_network().await?;
    info!(
        network = %config.network.name,
        chain_id = config.network.chain_id,
        contract = %registry.address(),
        "Registry client ready"
    );

    Ok(CleanRoom::new(
        wallet,
        registry,
        DeploymentChannel::new(),
        config.public_key_encoding,
    ))
}

async fn run(wait: Duration) -> Result<()> {
    let config = ClientConfig::from_env()?;
    let mut room = client(&config).await?;

    let address = room.connect_wallet().await?;
    println!("Connected wallet: {address}");

    room.generate_key_pair().await?;
    let request_id = room.request_enclave_creation().await?;
    println!("Requested enclave: {request_id}");

    let payload = room.view_details(request_id).await?;
    println!("{}", serde_json::to_string_pretty(&payload)?);

    if payload.deployment_metadata().is_some() {
        let mut updates = room.deployment_updates();
        let mut failures = room.deployment_failures();
        tokio::select! {
            completed = tokio::time::timeout(wait, updates.wait_for(DeploymentStatus::is_completed)) => {
                match completed {
                    Ok(Ok(status)) => {
                        let status = status.clone();
                        println!("{}", serde_json::to_string_pretty(&status)?);
                    }
                    Ok(Err(_)) => warn!("Deployment channel went away"),
                    Err(_) => warn!(wait_secs = wait.as_secs(), "Deployment did not complete in time"),
                }
            }
            _ = failures.wait_for(Option::is_some) => {}
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
        if let Err(e) = room.check_deployment() {
            room.teardown();
            return Err(e.into());
        }
    }

    room.teardown();
    Ok(())
}

async fn list() -> Result<()> {
    let config = ClientConfig::from_env()?;
    let mut room = client(&config).await?;
    room.connect_wallet().await?;

    let requests = room.requests().to_vec();
    if requests.is_empty() {
        println!("No enclave requests");
    }
    for request_id in requests {
        match room.client().request_details(request_id).await {
            Ok(request) => println!("{request_id}  created {}", request.created_at.to_rfc3339()),
            Err(e) => println!("{request_id}  ({e})"),
        }
    }
    Ok(())
}

async fn health() -> Result<()> {
    let config = ClientConfig::from_env()?;
    let url = health_url(&config.api_base_url)?;

    let response = reqwest::get(url.clone())
        .await
        .with_context(|| format!("Failed to reach {url}"))?;
    let status = response.status();
    let body = response.text().await?;
    println!("{status} {body}");

    if status.is_success() {
        Ok(())
    } else {
        Err(anyhow!("Enclave service is unhealthy"))
    }
}

/// `{API_BASE_URL}/health`, keeping any path the base URL already has.
fn health_url(base: &Url) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("API_BASE_URL cannot carry a path: {base}"))?
        .pop_if_empty()
        .push("health");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_url_appends_to_base_path() {
        let url = |base: &str| health_url(&Url::parse(base).unwrap()).unwrap().to_string();
        assert_eq!(url("http://h/api"), "http://h/api/health");
        assert_eq!(url("http://h/api/"), "http://h/api/health");
        assert_eq!(url("http://localhost:3000"), "http://localhost:3000/health");
    }
}
