use bytes::{Buf, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::codec::{decode_header, decode_message, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete frames from any `AsyncRead` stream.
///
/// Handles partial reads internally. The header and the payload can be read
/// as two separate steps so each can run under its own timeout; both steps
/// are cancel safe, buffered bytes survive a dropped future.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read and validate the next frame header.
    ///
    /// Returns `Ok(None)` when the peer closed before a complete header
    /// arrived: a probe or an idle disconnect, not an error.
    pub async fn read_header(&mut self) -> Result<Option<usize>> {
        while self.buf.len() < HEADER_SIZE {
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                trace!(buffered = self.buf.len(), "peer closed before frame header");
                self.buf.clear();
                return Ok(None);
            }
        }

        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&self.buf[..HEADER_SIZE]);
        let len = decode_header(header)?;
        self.buf.advance(HEADER_SIZE);
        Ok(Some(len))
    }

    /// Read the `len` payload bytes announced by [`read_header`](Self::read_header).
    pub async fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        if self.buf.capacity() < len {
            self.buf.reserve(len - self.buf.len());
        }
        while self.buf.len() < len {
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Read the next complete frame payload, `None` if the peer closed first.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        match self.read_header().await? {
            Some(len) => self.read_payload(len).await.map(Some),
            None => Ok(None),
        }
    }

    /// Read the next frame and parse its JSON payload.
    pub async fn read_message<M: DeserializeOwned>(&mut self) -> Result<Option<M>> {
        match self.read_frame().await? {
            Some(payload) => decode_message(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
