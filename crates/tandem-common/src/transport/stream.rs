// Copyright 2025 Tandem Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Byte streams
//!
//! Every transport runs over a [`BoxedStream`], so TCP and local sockets are
//! interchangeable above this module.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::protocol::error::{Result, TransportError, TransportErrorKind};
use crate::protocol::Address;

/// A bidirectional async byte stream.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedStream = Box<dyn Io>;

/// Connect to `address`.
///
/// Host names are resolved and each resolved address is tried in turn; the
/// last failure is returned if none accepts. `connect_timeout` bounds name
/// resolution and each connection attempt separately.
pub async fn connect(address: &Address, connect_timeout: Duration) -> Result<BoxedStream> {
    match address {
        Address::Tcp { port, .. } => {
            let host = address.host().unwrap_or_default();
            let addrs = tokio::time::timeout(connect_timeout, tokio::net::lookup_host((host, *port)))
                .await
                .map_err(|_| timed_out(address))?
                .map_err(|e| {
                    TransportError::from_io(e, &format!("Failed to resolve {}", address))
                })?;

            let mut last_err = None;
            for addr in addrs {
                match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
                    Ok(Ok(stream)) => {
                        stream
                            .set_nodelay(true)
                            .map_err(|e| TransportError::from_io(e, "Failed to set TCP_NODELAY"))?;
                        debug!("Connected to {} ({})", address, addr);
                        return Ok(Box::new(stream));
                    }
                    Ok(Err(e)) => {
                        last_err =
                            Some(TransportError::from_io(e, &format!("Failed to connect to {}", addr)));
                    }
                    Err(_) => last_err = Some(timed_out(address)),
                }
            }

            Err(last_err
                .unwrap_or_else(|| {
                    TransportError::new(
                        TransportErrorKind::NotOpen,
                        format!("No addresses resolved for {}", address),
                    )
                })
                .into())
        }
        Address::Local(path) => connect_local(path, connect_timeout).await,
    }
}

#[cfg(unix)]
async fn connect_local(path: &std::path::Path, connect_timeout: Duration) -> Result<BoxedStream> {
    let stream = tokio::time::timeout(connect_timeout, tokio::net::UnixStream::connect(path))
        .await
        .map_err(|_| {
            TransportError::new(
                TransportErrorKind::TimedOut,
                format!("Timed out connecting to {}", path.display()),
            )
        })?
        .map_err(|e| {
            TransportError::from_io(e, &format!("Failed to connect to {}", path.display()))
        })?;
    debug!("Connected to {}", path.display());
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn connect_local(path: &std::path::Path, _connect_timeout: Duration) -> Result<BoxedStream> {
    Err(TransportError::new(
        TransportErrorKind::NotSupported,
        format!("Local sockets are unavailable on this platform: {}", path.display()),
    )
    .into())
}

fn timed_out(address: &Address) -> TransportError {
    TransportError::new(
        TransportErrorKind::TimedOut,
        format!("Timed out connecting to {}", address),
    )
}

/// A stream that replays bytes already read from it before reading more.
///
/// Used to hand a sniffed connection to a protocol implementation that
/// expects to see the stream from its first byte.
pub struct Rewind<S> {
    prefix: Bytes,
    inner: S,
}

impl<S> Rewind<S> {
    pub fn new(prefix: Bytes, inner: S) -> Self {
        Self { prefix, inner }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Rewind<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.prefix.is_empty() {
            let n = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Rewind<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
