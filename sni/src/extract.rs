//! Server name extraction from a live connection
//!
//! Peeks one TLS record off a [`PeekStream`], parses it, and on success
//! hands back the host name with a [`Replay`] handle that still yields every
//! byte the client sent.

use std::fmt;

use tokio::io::AsyncRead;
use tracing::debug;

use crate::client_hello::{parse_server_name_with, RecordHeader, RECORD_HEADER_LEN};
use crate::config::ExtractConfig;
use crate::error::{Error, Result};
use crate::peek::{PeekStream, Replay};

/// A failed extraction, with the stream returned unconsumed.
pub struct Rejected<S> {
    pub error: Error,
    pub stream: PeekStream<S>,
}

impl<S> fmt::Debug for Rejected<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("buffered", &self.stream.buffered().len())
            .finish()
    }
}

impl<S> fmt::Display for Rejected<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<S> std::error::Error for Rejected<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Reads the SNI host name off incoming connections.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Peek the first record and return its server name.
    ///
    /// Nothing is consumed whatever the outcome, so the caller may retry
    /// with other logic or finalize the stream itself.
    pub async fn server_name<S>(&self, stream: &mut PeekStream<S>) -> Result<String>
    where
        S: AsyncRead + Unpin,
    {
        let header = RecordHeader::parse(stream.peek(RECORD_HEADER_LEN).await?)?;
        let record_len = header.record_len();
        if header.length as usize > self.config.max_record_len {
            return Err(Error::RecordTooLarge {
                len: header.length as usize,
                max: self.config.max_record_len,
            });
        }
        debug!("peeking {} byte record", record_len);

        let record = stream.peek(record_len).await?;
        let name = parse_server_name_with(record, self.config.bounds)?;
        Ok(name.to_owned())
    }

    /// Extract the server name and finalize the stream.
    ///
    /// On failure the stream comes back untouched inside [`Rejected`].
    pub async fn extract<S>(
        &self,
        mut stream: PeekStream<S>,
    ) -> std::result::Result<(String, Replay<S>), Rejected<S>>
    where
        S: AsyncRead + Unpin,
    {
        match self.server_name(&mut stream).await {
            Ok(name) => Ok((name, stream.finalize())),
            Err(error) => {
                debug!("sni extraction failed: {error}");
                Err(Rejected { error, stream })
            }
        }
    }
}

/// Extract the server name from a fresh stream with default settings.
pub async fn server_name_from_stream<S>(
    stream: S,
) -> std::result::Result<(String, Replay<S>), Rejected<S>>
where
    S: AsyncRead + Unpin,
{
    Extractor::default().extract(PeekStream::new(stream)).await
}
