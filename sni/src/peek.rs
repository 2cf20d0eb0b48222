//! Non-destructive lookahead over a byte stream
//!
//! [`PeekStream`] buffers bytes read ahead by [`PeekStream::peek`] and hands
//! them out again to ordinary reads. Once the caller is done looking,
//! [`PeekStream::finalize`] turns it into a [`Replay`] that yields the
//! leftover lookahead followed by the untouched rest of the stream.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tracing::trace;

/// A stream wrapper that can look at upcoming bytes without consuming them.
#[derive(Debug)]
pub struct PeekStream<S> {
    inner: S,
    buf: Vec<u8>,
    pos: usize,
}

impl<S> PeekStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Bytes read from the stream but not yet consumed
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Reading from the inner stream directly skips any buffered bytes.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Split into the raw stream and the unconsumed lookahead.
    pub fn into_parts(self) -> (S, Vec<u8>) {
        let mut buf = self.buf;
        buf.drain(..self.pos);
        (self.inner, buf)
    }

    /// Stop peeking and hand the stream off for downstream consumption.
    pub fn finalize(self) -> Replay<S> {
        let (inner, prefix) = self.into_parts();
        trace!("finalized with {} buffered bytes", prefix.len());
        Replay {
            inner,
            prefix,
            pos: 0,
        }
    }
}

impl<S: AsyncRead + Unpin> PeekStream<S> {
    /// Wait until `n` bytes are available and return them without consuming.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if the stream ends first.
    /// Already buffered bytes survive a failed or cancelled call.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.buf.len() - self.pos < n {
            self.buf.reserve(n - (self.buf.len() - self.pos));
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "stream ended after {} of {} peeked bytes",
                        self.buf.len() - self.pos,
                        n
                    ),
                ));
            }
            trace!("buffered {} more bytes", read);
        }
        Ok(&self.buf[self.pos..self.pos + n])
    }
}

/// The finalized stream: leftover lookahead first, then the raw stream.
#[derive(Debug)]
pub struct Replay<S> {
    inner: S,
    prefix: Vec<u8>,
    pos: usize,
}

impl<S> Replay<S> {
    /// Lookahead bytes not yet read back
    pub fn pending(&self) -> &[u8] {
        &self.prefix[self.pos..]
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Split into the raw stream and the lookahead bytes not yet read back.
    pub fn into_parts(self) -> (S, Vec<u8>) {
        let mut prefix = self.prefix;
        prefix.drain(..self.pos);
        (self.inner, prefix)
    }
}

/// Copy buffered bytes into `out`. Returns false when nothing was buffered.
fn drain_buffered(buf: &mut Vec<u8>, pos: &mut usize, out: &mut ReadBuf<'_>) -> bool {
    if *pos >= buf.len() {
        return false;
    }
    let n = out.remaining().min(buf.len() - *pos);
    out.put_slice(&buf[*pos..*pos + n]);
    *pos += n;
    if *pos == buf.len() {
        buf.clear();
        *pos = 0;
    }
    true
}

impl<S: AsyncRead + Unpin> AsyncRead for PeekStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if drain_buffered(&mut this.buf, &mut this.pos, buf) {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Replay<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if drain_buffered(&mut this.prefix, &mut this.pos, buf) {
            if this.prefix.is_empty() {
                this.prefix.shrink_to_fit();
            }
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

macro_rules! forward_write {
    ($ty:ident) => {
        impl<S: AsyncWrite + Unpin> AsyncWrite for $ty<S> {
            fn poll_write(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &[u8],
            ) -> Poll<io::Result<usize>> {
                Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
            }

            fn poll_write_vectored(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                bufs: &[io::IoSlice<'_>],
            ) -> Poll<io::Result<usize>> {
                Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
            }

            fn is_write_vectored(&self) -> bool {
                self.inner.is_write_vectored()
            }

            fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Pin::new(&mut self.get_mut().inner).poll_flush(cx)
            }

            fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
            }
        }
    };
}

forward_write!(PeekStream);
forward_write!(Replay);

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_peek_is_idempotent() {
        let mut stream = PeekStream::new(&b"hello world"[..]);
        assert_eq!(stream.peek(5).await.unwrap(), b"hello");
        assert_eq!(stream.peek(5).await.unwrap(), b"hello");
        assert_eq!(stream.peek(3).await.unwrap(), b"hel");
        assert_eq!(stream.peek(0).await.unwrap(), b"");

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn test_peek_waits_for_chunks() {
        let (mut client, server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            client.write_all(b"he").await.unwrap();
            tokio::task::yield_now().await;
            client.write_all(b"llo").await.unwrap();
            client.write_all(b", rest").await.unwrap();
        });

        let mut stream = PeekStream::new(server);
        assert_eq!(stream.peek(5).await.unwrap(), b"hello");
        writer.await.unwrap();

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello, rest");
    }

    #[tokio::test]
    async fn test_peek_past_end() {
        let mut stream = PeekStream::new(&b"abc"[..]);
        let err = stream.peek(4).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        // nothing lost
        assert_eq!(stream.buffered(), b"abc");
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abc");
    }

    #[tokio::test]
    async fn test_read_then_peek() {
        let mut stream = PeekStream::new(&b"0123456789"[..]);
        stream.peek(4).await.unwrap();

        let mut head = [0u8; 2];
        stream.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"01");
        assert_eq!(stream.peek(4).await.unwrap(), b"2345");
    }

    #[tokio::test]
    async fn test_finalize_replays_everything() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut stream = PeekStream::new(&data[..]);
        stream.peek(300).await.unwrap();

        let mut head = [0u8; 7];
        stream.read_exact(&mut head).await.unwrap();

        let mut replay = stream.finalize();
        assert!(replay.pending().len() >= 293);
        let mut out = head.to_vec();
        replay.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
        assert!(replay.pending().is_empty());
    }

    #[tokio::test]
    async fn test_into_parts() {
        let mut stream = PeekStream::new(&b"abcdef"[..]);
        stream.peek(2).await.unwrap();
        let mut one = [0u8; 1];
        stream.read_exact(&mut one).await.unwrap();

        let (_, leftover) = stream.into_parts();
        assert_eq!(leftover[0], b'b');
    }

    #[tokio::test]
    async fn test_replay_into_parts_after_partial_read() {
        let data = b"lookahead|raw";
        let mut stream = PeekStream::new(&data[..]);
        stream.peek(10).await.unwrap();
        assert_eq!(stream.buffered().len() + stream.get_ref().len(), data.len());

        let mut replay = stream.finalize();
        let mut head = [0u8; 4];
        replay.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"look");
        let untouched = replay.get_ref().len();

        let (inner, prefix) = replay.into_parts();
        assert_eq!(inner.len(), untouched);
        assert!(prefix.starts_with(b"ahead|"));
        assert_eq!([prefix, inner.to_vec()].concat(), b"ahead|raw");
    }

    #[tokio::test]
    async fn test_get_mut_bypasses_buffer() {
        let mut stream = PeekStream::new(&b"abcdef"[..]);
        stream.peek(2).await.unwrap();
        let buffered = stream.buffered().to_vec();
        assert!(buffered.starts_with(b"ab"));

        let mut raw = Vec::new();
        stream.get_mut().read_to_end(&mut raw).await.unwrap();
        assert_eq!([buffered.clone(), raw].concat(), b"abcdef");
        assert_eq!(stream.buffered(), &buffered[..]);

        let mut replay = stream.finalize();
        let mut rest = Vec::new();
        replay.get_mut().read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        assert_eq!(replay.pending(), &buffered[..]);
    }

    #[tokio::test]
    async fn test_writes_pass_through() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"ping").await.unwrap();

        let mut stream = PeekStream::new(server);
        assert_eq!(stream.peek(4).await.unwrap(), b"ping");
        stream.write_all(b"pong").await.unwrap();

        let mut replay = stream.finalize();
        replay.write_all(b"!").await.unwrap();
        replay.shutdown().await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"pong!");
    }
}
