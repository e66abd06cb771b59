//! Framed TCP transport.
//!
//! Frames are read straight off any `AsyncRead`: three prefix bytes, then
//! exactly `body_len` body bytes. The [`Acceptor`] trait lets the runtime
//! accept from a real `TcpListener` or from a simulated network.
//!
//! The prefix marker is validated strictly on receive. A wrong marker means
//! the stream is out of sync and the connection cannot recover, unlike a
//! bad field inside a well-framed body.

use std::{future::Future, io, net::SocketAddr};

use bytes::BytesMut;
use crashline_proto::{Frame, FramePrefix};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use crate::error::ServerError;

/// Source of inbound connections.
pub trait Acceptor: Send + Sync + 'static {
    /// Duplex byte stream for one connection.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next connection.
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    /// Address the acceptor is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = TcpListener::accept(self).await?;
        stream.set_nodelay(true)?;
        Ok((stream, peer))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Bind a TCP listener.
pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr =
        address.parse().map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(%addr, "tcp transport bound");
    Ok(listener)
}

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closes the stream between frames.
///
/// # Errors
///
/// - `ServerError::Protocol` on a bad marker
/// - `ServerError::Transport` on I/O failure or EOF inside a frame
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>, ServerError> {
    let mut prefix = [0u8; FramePrefix::SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {},
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let prefix = FramePrefix::from_bytes(&prefix)?;
    let mut body = BytesMut::zeroed(prefix.body_len());
    reader.read_exact(&mut body).await?;

    Ok(Some(Frame::new(body.freeze())?))
}

/// Write one encoded frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}
