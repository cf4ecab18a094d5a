//! Fixed-length request body stream

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};

use crate::{Error, Result};

/// Output stream for a request body whose length was declared up front.
///
/// Writes beyond the declared length fail immediately, and [`RequestStream::finish`]
/// fails if fewer bytes were written.
pub struct RequestStream {
    inner: DuplexStream,
    content_length: u64,
    written: u64,
}

impl RequestStream {
    pub(crate) fn new(inner: DuplexStream, content_length: u64) -> Self {
        Self {
            inner,
            content_length,
            written: 0,
        }
    }

    /// Bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush and close the stream, checking that the declared length was reached
    pub async fn finish(mut self) -> Result<()> {
        self.inner.flush().await?;
        self.inner.shutdown().await?;

        if self.written != self.content_length {
            return Err(Error::ContentLengthMismatch {
                expected: self.content_length,
                actual: self.written,
            });
        }
        Ok(())
    }
}

impl AsyncWrite for RequestStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let remaining = self.content_length - self.written;
        if buf.len() as u64 > remaining {
            let mismatch = Error::ContentLengthMismatch {
                expected: self.content_length,
                actual: self.written + buf.len() as u64,
            };
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::InvalidInput, mismatch)));
        }

        match Pin::new(&mut self.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                self.written += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
