//! snipeek
//!
//! Reads the TLS SNI host name off an accepted connection without consuming
//! it, so the raw byte stream can be routed by name and forwarded untouched.

pub mod client_hello;
pub mod config;
pub mod error;
pub mod extract;
pub mod peek;

pub use client_hello::{parse_server_name, parse_server_name_with, RecordHeader};
pub use config::{Bounds, ExtractConfig};
pub use error::{Error, Result};
pub use extract::{server_name_from_stream, Extractor, Rejected};
pub use peek::{PeekStream, Replay};
