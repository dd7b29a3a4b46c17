use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crawl_relay::{HeaderPolicy, ProxyServer, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "crawl-relay", about = "Sidecar forwarding proxy for web crawlers")]
struct Args {
    /// YAML config file with the listen address and header rules
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Base URL to listen on, e.g. http://127.0.0.1:8080/
    #[arg(long, env = "RELAY_SERVER_URL")]
    server_url: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RelayConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RelayConfig {
            server_url: args.server_url,
            host: args.host,
            port: args.port,
            headers: None,
        },
    };

    let addr = config.listen_addr()?;
    let mut server = match config.headers {
        Some(_) => {
            let mut server = ProxyServer::new(addr);
            server.extract_header_rules(config.header_rules()?);
            server
        }
        None => ProxyServer::with_policy(addr, HeaderPolicy::with_defaults()),
    };

    server.start();
    info!(
        "Relay started on http://{}:{}",
        server.addr().host,
        server.addr().port
    );

    tokio::signal::ctrl_c().await?;
    server.stop().await?;
    Ok(())
}
