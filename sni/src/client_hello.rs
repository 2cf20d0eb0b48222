//! TLS ClientHello parsing
//!
//! Walks the record header and the ClientHello just far enough to reach the
//! server_name extension. Nothing after the host name is inspected, and the
//! parser works on whatever bytes it is handed without any I/O.

use tracing::{debug, trace};

use crate::config::Bounds;
use crate::error::{Error, Result};

/// content_type(1) + version(2) + length(2)
pub const RECORD_HEADER_LEN: usize = 5;

pub const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
pub const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;
pub const EXTENSION_TYPE_SERVER_NAME: u16 = 0x0000;
pub const NAME_TYPE_HOST_NAME: u8 = 0x00;

/// handshake length(3) + client version(2) + random(32)
const FIXED_HELLO_FIELDS_LEN: usize = 3 + 2 + 32;

/// TLS record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: u8,
    pub version: (u8, u8),
    pub length: u16,
}

impl RecordHeader {
    /// Parse the first five bytes of `data` as a Handshake record header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = data.get(..RECORD_HEADER_LEN).ok_or(Error::Truncated)?;
        let content_type = header[0];
        if content_type != CONTENT_TYPE_HANDSHAKE {
            return Err(Error::NotTls(content_type));
        }
        Ok(Self {
            content_type,
            version: (header[1], header[2]),
            length: u16::from_be_bytes([header[3], header[4]]),
        })
    }

    /// Header plus body
    pub fn record_len(&self) -> usize {
        RECORD_HEADER_LEN + self.length as usize
    }
}

/// Extract the SNI host name from a TLS record holding a ClientHello.
///
/// Uses [`Bounds::Lenient`]: only the end of `data` limits the walk, so a
/// caller should hand in exactly one record.
pub fn parse_server_name(data: &[u8]) -> Result<&str> {
    parse_server_name_with(data, Bounds::Lenient)
}

/// Extract the SNI host name, treating length prefixes according to `bounds`.
pub fn parse_server_name_with(data: &[u8], bounds: Bounds) -> Result<&str> {
    let header = RecordHeader::parse(data)?;
    trace!("record length {}", header.length);

    let body = match bounds {
        Bounds::Lenient => &data[RECORD_HEADER_LEN..],
        Bounds::Strict => data
            .get(RECORD_HEADER_LEN..header.record_len())
            .ok_or(Error::Truncated)?,
    };

    let mut r = Cursor::new(body);
    let handshake_type = r.u8().ok_or(Error::Truncated)?;
    if handshake_type != HANDSHAKE_TYPE_CLIENT_HELLO {
        return Err(Error::NotClientHello(handshake_type));
    }
    r.skip(FIXED_HELLO_FIELDS_LEN);

    let session_id_len = r.u8().ok_or(Error::NoExtensions)?;
    r.skip(session_id_len as usize);
    let cipher_suites_len = r.u16().ok_or(Error::NoExtensions)?;
    r.skip(cipher_suites_len as usize);
    let compression_len = r.u8().ok_or(Error::NoExtensions)?;
    r.skip(compression_len as usize);
    trace!(
        session_id_len,
        cipher_suites_len,
        compression_len,
        "skipped fixed fields"
    );

    let extensions_len = r.u16().ok_or(Error::NoExtensions)?;
    trace!("extensions length {}", extensions_len);
    let extensions = match bounds {
        Bounds::Lenient => r.rest(),
        Bounds::Strict => r.take(extensions_len as usize).ok_or(Error::Truncated)?,
    };

    let name = find_server_name(extensions, bounds)?;
    debug!("sni: {name}");
    Ok(name)
}

fn find_server_name(extensions: &[u8], bounds: Bounds) -> Result<&str> {
    let mut r = Cursor::new(extensions);
    while r.remaining() > 0 {
        let (Some(ext_type), Some(ext_len)) = (r.u16(), r.u16()) else {
            break;
        };
        trace!("extension type {:#06x} len {}", ext_type, ext_len);
        let ext_len = ext_len as usize;

        if ext_type != EXTENSION_TYPE_SERVER_NAME {
            r.skip(ext_len);
            continue;
        }

        let data = match bounds {
            Bounds::Lenient => r.rest(),
            Bounds::Strict => r.take(ext_len).ok_or(Error::Truncated)?,
        };
        if let Some(name) = host_name(data, bounds)? {
            return Ok(name);
        }
        if bounds == Bounds::Lenient {
            r.skip(ext_len);
        }
    }
    Err(Error::NoHostname)
}

/// Reads the first ServerNameList entry. An empty name yields `None` so the
/// search moves on to the next extension.
fn host_name(data: &[u8], bounds: Bounds) -> Result<Option<&str>> {
    let mut r = Cursor::new(data);
    let list_len = r.u16().ok_or(Error::Truncated)?;
    trace!("server name list length {}", list_len);
    let mut list = match bounds {
        Bounds::Lenient => r,
        Bounds::Strict => Cursor::new(r.take(list_len as usize).ok_or(Error::Truncated)?),
    };

    let name_type = list.u8().ok_or(Error::Truncated)?;
    if name_type != NAME_TYPE_HOST_NAME {
        return Err(Error::NotHostname(name_type));
    }
    let name_len = list.u16().ok_or(Error::Truncated)?;
    let name = list.take(name_len as usize).ok_or(Error::Truncated)?;
    if name.is_empty() {
        return Ok(None);
    }
    std::str::from_utf8(name)
        .map(Some)
        .map_err(Error::InvalidHostname)
}

/// Big-endian reader over a byte slice. `skip` may run past the end; the
/// next read then fails.
#[derive(Clone, Copy)]
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n);
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn rest(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }
}
