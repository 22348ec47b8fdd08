//! Buffered postgres message stream.
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    Result,
    common::verbose,
    postgres::{BackendProtocol, FrontendProtocol, ProtocolError, frontend},
};

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// Largest frame accepted from the backend, 1 GiB.
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// Buffered stream of postgres messages.
///
/// Frontend messages are buffered until [`flush`][PgStream::flush] is called.
#[derive(Debug)]
pub struct PgStream<S> {
    io: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl<S> PgStream<S> {
    pub fn new(io: S) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
        }
    }

    /// Buffer a frontend message.
    pub fn send<F: FrontendProtocol>(&mut self, msg: F) {
        frontend::write(msg, &mut self.write_buf);
    }

    /// Buffer the startup message.
    pub fn send_startup(&mut self, msg: frontend::Startup) {
        msg.write(&mut self.write_buf);
    }

    /// Length of buffered frontend messages.
    pub fn pending_len(&self) -> usize {
        self.write_buf.len()
    }

    /// Drop buffered frontend messages without sending them.
    pub fn discard_pending(&mut self) {
        self.write_buf.clear();
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> PgStream<S> {
    /// Write all buffered messages in one batch.
    pub async fn flush(&mut self) -> Result<()> {
        verbose!(len = self.write_buf.len(), "flush");
        self.io.write_all_buf(&mut self.write_buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Receive one backend message.
    ///
    /// The whole frame body is split off before decoding, so whatever a
    /// decoder leaves unread never leaks into the next message.
    pub async fn recv<B: BackendProtocol>(&mut self) -> Result<B> {
        loop {
            if let Some(mut header) = self.read_buf.get(..5) {
                let msgtype = header.get_u8();
                let len = header.get_i32();

                if len < 4 || len as usize > MAX_FRAME_LEN {
                    return Err(ProtocolError::InvalidLength { msgtype, len }.into());
                }

                let len = len as usize;
                if self.read_buf.len() - 1/*msgtype*/ >= len {
                    self.read_buf.advance(5);
                    let body = self.read_buf.split_to(len - 4).freeze();
                    verbose!(msgtype = %(msgtype as char), len, "recv");
                    return Ok(B::decode(msgtype, body)?);
                }

                self.read_buf.reserve(1 + len - self.read_buf.len());
            } else {
                self.read_buf.reserve(DEFAULT_BUF_CAPACITY);
            }

            if self.io.read_buf(&mut self.read_buf).await? == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
        }
    }

    /// Shutdown the write half of the underlying io.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
