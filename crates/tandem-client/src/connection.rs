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

//! Connection drivers
//!
//! One background task per open client owns the socket. Calls never touch the
//! socket directly:
//!
//! - **Framed** transports hand the driver a complete frame plus a oneshot for
//!   the reply. The driver writes frames in order and routes each response to
//!   its caller by `seq_id`, so several calls may be in flight at once.
//! - **HTTP** calls go through Hyper's `SendRequest`, one exchange at a time;
//!   the driver polls the Hyper connection.
//!
//! Cancelling the driver's token drops the socket.

use std::collections::HashMap;
use std::sync::Arc;

use hyper::client::conn::http1;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use http_body_util::Full;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tandem_common::transport::{
    connect, encode_frame, write_frame, BoxedStream, Codec, FrameReader, Framing, HttpTransport,
};
use tandem_common::{
    Headers, ResponseMessage, Result, SeqId, TandemError, TransportError, TransportErrorKind,
};

use crate::config::ClientConfig;

/// A decoded reply and the headers that came with it.
pub(crate) struct Reply {
    pub codec: Codec,
    pub response: ResponseMessage,
    pub headers: Headers,
}

type ReplySender = oneshot::Sender<std::result::Result<Reply, TransportError>>;
type Pending = Mutex<HashMap<SeqId, ReplySender>>;

struct Outgoing {
    seq_id: SeqId,
    frame: Vec<u8>,
    reply: ReplySender,
}

pub(crate) enum Link {
    Framed {
        outgoing: mpsc::UnboundedSender<Outgoing>,
        framing: Framing,
        max_frame_size: usize,
    },
    Http {
        sender: tokio::sync::Mutex<http1::SendRequest<Full<Bytes>>>,
        path: String,
        host: String,
        max_frame_size: usize,
    },
}

impl Link {
    /// Send one encoded request message and wait for its reply.
    pub(crate) async fn call(&self, seq_id: SeqId, payload: Vec<u8>, headers: &Headers) -> Result<Reply> {
        match self {
            Link::Framed {
                outgoing,
                framing,
                max_frame_size,
            } => {
                let frame = encode_frame(*framing, &payload, headers, *max_frame_size)?;
                let (reply, rx) = oneshot::channel();
                outgoing
                    .send(Outgoing { seq_id, frame, reply })
                    .map_err(|_| TransportError::not_open("Connection is closed"))?;
                let reply = rx.await.map_err(|_| {
                    TransportError::end_of_file("Connection closed before the reply arrived")
                })??;
                Ok(reply)
            }
            Link::Http {
                sender,
                path,
                host,
                max_frame_size,
            } => {
                let request = HttpTransport::build_request(path, host, payload, headers)?;
                let mut sender = sender.lock().await;
                sender.ready().await.map_err(HttpTransport::map_error)?;
                let response = sender
                    .send_request(request)
                    .await
                    .map_err(HttpTransport::map_error)?;

                let status = response.status();
                let headers = HttpTransport::decode_header_block(response.headers())?;
                let body = HttpTransport::collect_body(response.into_body(), *max_frame_size).await?;
                if status != StatusCode::OK {
                    return Err(TransportError::corrupted(format!(
                        "HTTP {}: {}",
                        status,
                        String::from_utf8_lossy(&body)
                    ))
                    .into());
                }

                let (codec, response) = Codec::decode_message::<ResponseMessage>(&body)?;
                Ok(Reply {
                    codec,
                    response,
                    headers,
                })
            }
        }
    }
}

/// An established connection: the call link plus its driver task.
pub(crate) struct Connection {
    link: Arc<Link>,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connect and start the driver.
    ///
    /// Dropping this future before it completes drops whatever socket it had
    /// opened so far.
    pub(crate) async fn establish(config: &ClientConfig) -> Result<Self> {
        let stream = connect(&config.address, config.connect_timeout).await?;
        let cancel = CancellationToken::new();

        let (link, driver) = match config.client_type.framing() {
            Some(framing) => {
                let (outgoing, rx) = mpsc::unbounded_channel();
                let driver = tokio::spawn(drive_framed(
                    stream,
                    framing,
                    config.max_frame_size,
                    rx,
                    cancel.clone(),
                ));
                let link = Link::Framed {
                    outgoing,
                    framing,
                    max_frame_size: config.max_frame_size,
                };
                (link, driver)
            }
            None => {
                let (sender, conn) = http1::handshake(TokioIo::new(stream))
                    .await
                    .map_err(HttpTransport::map_error)?;
                let token = cancel.clone();
                let driver = tokio::spawn(async move {
                    tokio::select! {
                        result = conn => {
                            if let Err(e) = result {
                                debug!("HTTP connection ended: {}", e);
                            }
                        }
                        _ = token.cancelled() => {}
                    }
                });
                let link = Link::Http {
                    sender: tokio::sync::Mutex::new(sender),
                    path: config.http_path.clone(),
                    host: config.http_host(),
                    max_frame_size: config.max_frame_size,
                };
                (link, driver)
            }
        };

        debug!("Client connected to {} ({})", config.address, config.client_type);
        Ok(Self {
            link: Arc::new(link),
            cancel,
            driver: Some(driver),
        })
    }

    pub(crate) fn link(&self) -> Arc<Link> {
        Arc::clone(&self.link)
    }

    /// Signal the driver to drop the socket and wait until it has.
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                warn!("Connection driver failed: {}", e);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive_framed(
    stream: BoxedStream,
    framing: Framing,
    max_frame_size: usize,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    cancel: CancellationToken,
) {
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = FrameReader::new(read_half, max_frame_size);
    let pending: Pending = Mutex::new(HashMap::new());

    let outcome = tokio::select! {
        _ = cancel.cancelled() => TransportError::not_open("Connection closed"),
        err = write_loop(&mut write_half, &mut outgoing, &pending) => err,
        err = read_loop(&mut reader, framing, &pending) => err,
    };
    debug!("Connection driver stopping: {}", outcome);

    outgoing.close();
    while let Ok(call) = outgoing.try_recv() {
        let _ = call.reply.send(Err(outcome.clone()));
    }
    for (_, waiter) in pending.lock().drain() {
        let _ = waiter.send(Err(outcome.clone()));
    }

    let _ = write_half.shutdown().await;
}

async fn write_loop<W: AsyncWrite + Unpin>(
    writer: &mut W,
    outgoing: &mut mpsc::UnboundedReceiver<Outgoing>,
    pending: &Pending,
) -> TransportError {
    while let Some(call) = outgoing.recv().await {
        register(pending, call.seq_id, call.reply);
        if let Err(e) = write_frame(writer, &call.frame).await {
            return into_transport(e);
        }
    }
    TransportError::not_open("Client handle released")
}

/// Track a call awaiting its reply.
///
/// Waiters whose caller has gone away (timed out or dropped) are swept first,
/// so a peer that never answers cannot grow the map without bound.
fn register(pending: &Pending, seq_id: SeqId, reply: ReplySender) {
    let mut pending = pending.lock();
    pending.retain(|_, waiter| !waiter.is_closed());
    pending.insert(seq_id, reply);
}

async fn read_loop<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    framing: Framing,
    pending: &Pending,
) -> TransportError {
    loop {
        match reader.read_message::<ResponseMessage>(framing).await {
            Ok(Some((codec, response, headers))) => {
                let waiter = pending.lock().remove(&response.seq_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(Ok(Reply {
                            codec,
                            response,
                            headers,
                        }));
                    }
                    None => warn!("Dropping reply for unknown seq_id {}", response.seq_id),
                }
            }
            Ok(None) => return TransportError::end_of_file("Server closed the connection"),
            Err(e) => return into_transport(e),
        }
    }
}

fn into_transport(err: TandemError) -> TransportError {
    match err {
        TandemError::Transport(e) => e,
        other => TransportError::new(TransportErrorKind::Unknown, other.to_string()),
    }
}
