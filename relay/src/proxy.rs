//! SNI passthrough
//!
//! Reads the server name off each accepted connection, picks a backend and
//! pumps the untouched byte stream both ways.

use anyhow::{Context, Result};
use snipeek::{Extractor, PeekStream};
use tokio::io::copy_bidirectional;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::router::HostRouter;

pub struct Relay {
    config: RelayConfig,
    router: HostRouter,
    extractor: Extractor,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            router: HostRouter::from_config(&config),
            extractor: Extractor::new(config.extract.clone()),
            config,
        }
    }

    pub async fn handle(&self, inbound: TcpStream) -> Result<()> {
        let extracted = timeout(
            self.config.handshake_timeout(),
            self.extractor.extract(PeekStream::new(inbound)),
        )
        .await
        .context("timed out waiting for ClientHello")?;

        let (backend, mut replay) = match extracted {
            Ok((name, replay)) => {
                let backend = self
                    .router
                    .resolve(&name)
                    .with_context(|| format!("no route for {name}"))?;
                info!(%name, %backend, "routing");
                (backend, replay)
            }
            Err(rejected) if rejected.error.is_transport() => {
                return Err(
                    anyhow::Error::new(rejected.error).context("failed to read ClientHello")
                );
            }
            Err(rejected) => {
                let backend = self
                    .router
                    .default_backend()
                    .with_context(|| format!("no usable server name: {}", rejected.error))?;
                info!(
                    %backend,
                    "no usable server name ({}), using default backend",
                    rejected.error
                );
                (backend, rejected.stream.finalize())
            }
        };

        let mut outbound = timeout(self.config.connect_timeout(), TcpStream::connect(backend))
            .await
            .with_context(|| format!("connecting timeout to {backend}"))?
            .with_context(|| format!("failed to connect to {backend}"))?;

        let (sent, received) = copy_bidirectional(&mut replay, &mut outbound)
            .await
            .context("failed to copy between inbound and outbound")?;
        debug!(sent, received, "connection closed");
        Ok(())
    }
}
