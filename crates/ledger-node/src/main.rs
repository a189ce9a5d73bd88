mod constants;
mod fetcher;
mod routes;

use clap::Parser;
use ledger_core::{
    constants::{DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_FETCHES},
    generate_node_id, Node, ResolverConfig,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::constants::DEFAULT_LISTEN;
use crate::fetcher::HttpChainFetcher;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Identifier credited with mining rewards (random if omitted)
    #[arg(long)]
    node_id: Option<String>,

    /// Peer to register at startup, e.g. http://127.0.0.1:5001 (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Per-peer timeout when fetching chains during consensus
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_MS)]
    fetch_timeout_ms: u64,

    /// Maximum peers queried at once during consensus
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES)]
    max_concurrent_fetches: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let fetch_timeout = Duration::from_millis(args.fetch_timeout_ms);
    let fetcher = HttpChainFetcher::new(fetch_timeout)?;
    let config = ResolverConfig {
        fetch_timeout,
        max_concurrent_fetches: args.max_concurrent_fetches,
    };
    let node_id = args.node_id.unwrap_or_else(generate_node_id);
    let node = Arc::new(Node::new(node_id, fetcher, config));
    info!(node_id = node.node_id(), "node initialised with genesis block");

    for peer in &args.peers {
        if let Err(e) = node.register_peer(peer).await {
            warn!(error = %e, "ignoring startup peer");
        }
    }

    let app = routes::router(node);
    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
