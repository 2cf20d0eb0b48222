//! Extraction settings.

use serde::{Deserialize, Serialize};

/// Largest record length a TLS record header can declare.
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

/// How the parser treats the length prefixes it walks past.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bounds {
    /// Only the end of the input bounds the walk. The extensions-block and
    /// server-name-list lengths are read and skipped.
    #[default]
    Lenient,
    /// Record, extensions-block, extension and server-name-list lengths are
    /// all hard bounds.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Parsing mode for the ClientHello
    #[serde(default)]
    pub bounds: Bounds,

    /// Upper limit on the declared record length; larger records are
    /// rejected before their body is peeked
    #[serde(default = "default_max_record_len")]
    pub max_record_len: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::default(),
            max_record_len: MAX_RECORD_LEN,
        }
    }
}

fn default_max_record_len() -> usize {
    MAX_RECORD_LEN
}
