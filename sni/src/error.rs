//! Error types for SNI extraction.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Not a TLS handshake record (content type {0:#04x})")]
    NotTls(u8),

    #[error("Not a ClientHello (handshake type {0:#04x})")]
    NotClientHello(u8),

    #[error("ClientHello has no extensions")]
    NoExtensions,

    #[error("Server name is not a host_name (name type {0})")]
    NotHostname(u8),

    #[error("No server_name extension found")]
    NoHostname,

    #[error("ClientHello truncated")]
    Truncated,

    #[error("Host name is not valid UTF-8")]
    InvalidHostname(#[source] std::str::Utf8Error),

    #[error("Record length {len} exceeds limit {max}")]
    RecordTooLarge { len: usize, max: usize },
}

impl Error {
    /// True when the failure came from the underlying stream rather than
    /// from the bytes it delivered.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
