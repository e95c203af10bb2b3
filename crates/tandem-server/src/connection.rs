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

//! Per-connection task
//!
//! ```text
//! Accepted -> ReceivingFrame -> Dispatching -> SendingFrame -> ReceivingFrame ...
//!                  |                                 |
//!                  +-----------> Closed <------------+  (transport error / EOF)
//! ```
//!
//! Application errors during dispatch are sent back as exception replies and
//! the loop continues; only transport failures end the connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tandem_common::transport::{encode_frame, write_frame, BoxedStream, FrameReader, Framing, Sniffed};
use tandem_common::{RequestMessage, SocketAddress};

use crate::dispatch::handle_request;
use crate::http;
use crate::server::Shared;

pub(crate) async fn serve_connection(
    stream: BoxedStream,
    peer: Option<SocketAddress>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let peer_name = describe(peer.as_ref());
    let mut reader = FrameReader::new(stream, shared.config.max_frame_size);

    let sniffed = tokio::select! {
        _ = cancel.cancelled() => return,
        sniffed = reader.sniff(shared.config.accept_http) => sniffed,
    };

    match sniffed {
        Ok(Some(Sniffed::Frames(framing))) => {
            debug!("{}: {:?} connection", peer_name, framing);
            serve_frames(reader, framing, peer, &peer_name, &shared, &cancel).await;
        }
        Ok(Some(Sniffed::Http)) => {
            debug!("{}: HTTP connection", peer_name);
            http::serve_http(reader, peer, shared, cancel).await;
        }
        Ok(None) => debug!("{}: closed before sending anything", peer_name),
        Err(e) => warn!("{}: rejecting connection: {}", peer_name, e),
    }
}

async fn serve_frames(
    mut reader: FrameReader<BoxedStream>,
    framing: Framing,
    peer: Option<SocketAddress>,
    peer_name: &str,
    shared: &Shared,
    cancel: &CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("{}: closing for shutdown", peer_name);
                return;
            }
            received = reader.read_message::<RequestMessage>(framing) => received,
        };

        let (codec, request, headers) = match received {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("{}: closed by peer", peer_name);
                return;
            }
            Err(e) => {
                warn!("{}: dropping connection: {}", peer_name, e);
                return;
            }
        };

        let (response, reply_headers) =
            handle_request(shared.processor.as_ref(), codec, request, headers, peer.clone()).await;

        let frame = codec
            .encode_message(&response)
            .and_then(|payload| encode_frame(framing, &payload, &reply_headers, shared.config.max_frame_size));
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{}: failed to encode reply {}: {}", peer_name, response.seq_id, e);
                return;
            }
        };

        if let Err(e) = write_frame(reader.get_mut(), &frame).await {
            warn!("{}: failed to send reply: {}", peer_name, e);
            return;
        }
    }
}

pub(crate) fn describe(peer: Option<&SocketAddress>) -> String {
    match peer {
        Some(addr) => addr.to_string(),
        None => "local peer".to_string(),
    }
}
