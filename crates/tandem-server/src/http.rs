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

//! HTTP endpoint
//!
//! Serves calls tunnelled through HTTP/1.1 on a connection the server has
//! already sniffed as HTTP. Each `POST` body is one encoded request message;
//! the response body is the encoded reply, in the same protocol. RPC headers
//! travel in the reserved header block in both directions.
//!
//! Requests that never reach dispatch (wrong method, unreadable body or
//! header block) are answered with a plain-text HTTP error status.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tandem_common::transport::{BoxedStream, Codec, FrameReader, HttpTransport, HyperRequest, HyperResponse, Rewind};
use tandem_common::{RequestMessage, SocketAddress, TransportErrorKind};

use crate::dispatch::handle_request;
use crate::server::Shared;

pub(crate) async fn serve_http(
    reader: FrameReader<BoxedStream>,
    peer: Option<SocketAddress>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let (stream, sniffed) = reader.into_parts();
    let io = TokioIo::new(Rewind::new(sniffed, stream));

    let service_peer = peer.clone();
    let service = service_fn(move |req| {
        let shared = Arc::clone(&shared);
        let peer = service_peer.clone();
        async move { Ok::<_, Infallible>(handle(req, &shared, peer).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = cancel.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        debug!("HTTP connection from {} ended: {}", crate::connection::describe(peer.as_ref()), e);
    }
}

async fn handle(req: HyperRequest, shared: &Shared, peer: Option<SocketAddress>) -> HyperResponse {
    if req.method() != Method::POST {
        return HttpTransport::error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Only POST requests are supported",
        );
    }

    let headers = match HttpTransport::decode_header_block(req.headers()) {
        Ok(headers) => headers,
        Err(e) => return HttpTransport::error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let body = match HttpTransport::collect_body(req.into_body(), shared.config.max_frame_size).await {
        Ok(body) => body,
        Err(e) => {
            let status = match e.transport_kind() {
                Some(TransportErrorKind::InvalidFrameSize) => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            warn!("Rejected HTTP body: {}", e);
            return HttpTransport::error_response(status, &e.to_string());
        }
    };
    let (codec, request) = match Codec::decode_message::<RequestMessage>(&body) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Undecodable HTTP call: {}", e);
            return HttpTransport::error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let (response, reply_headers) =
        handle_request(shared.processor.as_ref(), codec, request, headers, peer).await;

    match codec
        .encode_message(&response)
        .and_then(|payload| HttpTransport::build_response(payload, &reply_headers))
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to encode HTTP reply: {}", e);
            HttpTransport::error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
