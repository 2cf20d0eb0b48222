use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

mod config;
mod proxy;
mod router;

use config::RelayConfig;
use proxy::Relay;

#[derive(Parser)]
#[command(name = "snipeek-relay")]
#[command(version)]
#[command(about = "Route TLS connections by SNI without terminating them", long_about = None)]
struct Cli {
    /// Path to the relay configuration file
    #[arg(short, long, default_value = "snipeek.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "snipeek=debug,snipeek_relay=debug"
    } else {
        "snipeek=info,snipeek_relay=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RelayConfig::load(&cli.config)?;
    let listen = config.listen;
    let relay = Arc::new(Relay::new(config));

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!("SNI relay listening on {}", listen);

    loop {
        match listener.accept().await {
            Ok((inbound, from)) => {
                let relay = relay.clone();
                tokio::spawn(
                    async move {
                        if let Err(e) = relay.handle(inbound).await {
                            warn!("connection error: {e:#}");
                        }
                    }
                    .instrument(info_span!("conn", %from)),
                );
            }
            Err(e) => {
                error!("failed to accept connection: {e:?}");
            }
        }
    }
}
