//! Faucet service binary

use anyhow::Context;
use clap::Parser;
use evm_faucet::{api, FaucetConfig, FaucetService};
use faucet_common::utils::config::load_layered;
use faucet_common::utils::logging::init_logging;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Configurable testnet faucet for EVM chains
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path (TOML, YAML or JSON)
    #[arg(short, long, env = "FAUCET_CONFIG")]
    config: Option<PathBuf>,

    /// URL of the network's RPC endpoint
    #[arg(long, env = "FAUCET_RPC")]
    rpc: Option<String>,

    /// Private key of the faucet's wallet
    #[arg(long, env = "FAUCET_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Amount that can be claimed, in display units (e.g. 0.01)
    #[arg(long, env = "FAUCET_AMOUNT")]
    amount: Option<String>,

    /// Port the service listens on
    #[arg(long, env = "FAUCET_PORT")]
    port: Option<u16>,

    /// Seconds an address or ip must wait before claiming again
    #[arg(long, env = "FAUCET_DELAY")]
    delay: Option<u64>,

    /// Chain id; fetched from the RPC endpoint when omitted
    #[arg(long, env = "FAUCET_CHAIN")]
    chain: Option<u64>,

    /// Allowed CORS origin
    #[arg(long, env = "FAUCET_CORS")]
    cors: Option<String>,

    /// Number of trusted reverse proxies in front of the faucet
    #[arg(long, env = "FAUCET_PROXIES")]
    proxies: Option<usize>,

    /// Only serve claims approved by upstream middleware
    #[arg(long, env = "FAUCET_REQUIRE_APPROVAL")]
    require_approval: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(self, config: &mut FaucetConfig) {
        if let Some(rpc) = self.rpc {
            config.rpc_url = rpc;
        }
        if let Some(key) = self.key {
            config.private_key = key;
        }
        if let Some(amount) = self.amount {
            config.amount = amount;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(delay) = self.delay {
            config.delay_secs = delay;
        }
        if let Some(chain) = self.chain {
            config.chain_id = Some(chain);
        }
        if let Some(cors) = self.cors {
            config.cors_origin = cors;
        }
        if let Some(proxies) = self.proxies {
            config.proxy_hops = proxies;
        }
        if self.require_approval {
            config.require_approval = true;
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // File, then FAUCET_* variables, then flags
    let mut config: FaucetConfig = load_layered(args.config.as_deref(), Some("FAUCET"))?;
    args.apply(&mut config);

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let settings = config.resolve().context("invalid configuration")?;
    let listen_addr = settings.listen_addr;
    let cleanup_interval = settings.cleanup_interval;
    let query_key = settings.address_query_key.clone();

    info!("Connecting to {}", settings.rpc_url);
    let service = Arc::new(FaucetService::connect(settings).await?);
    let sweeper = service.limiter().spawn_sweeper(cleanup_interval);

    let app = api::router(service.clone());

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("Faucet running at http://{}", listen_addr);
    info!("Routes:");
    for (route, description) in [
        ("/address".to_string(), "address of the faucet's wallet"),
        ("/amount".to_string(), "amount dispensed per claim"),
        (format!("/claim?{query_key}=<address>"), "send the claim amount to the address"),
        ("/health".to_string(), "returns 200 while the service is running"),
        ("/metrics".to_string(), "prometheus metrics"),
    ] {
        info!(" - [GET] {:<28} > {}", route, description);
    }
    info!(
        "Periodically ensure {} is topped up to keep the service running",
        service.address()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
