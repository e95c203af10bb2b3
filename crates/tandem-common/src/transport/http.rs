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

//! HTTP Transport Utilities
//!
//! Helpers for tunnelling calls through HTTP/1.1.
//!
//! # Architecture
//!
//! Each call is one `POST` whose body is the encoded request message; the
//! response body is the encoded reply. RPC headers cannot ride inside the
//! payload, so both directions carry them in one reserved HTTP header:
//!
//! ```text
//! X-Tandem-Headers: base64(json({"key": "value", ...}))
//! ```
//!
//! # Components
//!
//! - **[`HttpTransport`]**: request/response builders and header block codec
//! - **[`HyperRequest`]** / **[`HyperResponse`]**: Hyper type aliases

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE, HOST};
use hyper::{Method, Request, Response, StatusCode};

use crate::protocol::error::{Result, TransportError, TransportErrorKind};
use crate::protocol::Headers;

/// Reserved HTTP header carrying the RPC header map
pub const HEADERS_HEADER: &str = "x-tandem-headers";

/// Content type of call bodies
pub const CONTENT_TYPE_TANDEM: &str = "application/x-tandem";

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

/// HTTP transport utility functions
pub struct HttpTransport;

impl HttpTransport {
    /// Build the `POST` carrying one call.
    ///
    /// # Arguments
    ///
    /// * `path` - Request target, e.g. `/`
    /// * `host` - Value of the `Host` header
    /// * `payload` - Encoded request message
    /// * `headers` - RPC headers for the call
    pub fn build_request(
        path: &str,
        host: &str,
        payload: Vec<u8>,
        headers: &Headers,
    ) -> Result<Request<Full<Bytes>>> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(HOST, host)
            .header(CONTENT_TYPE, CONTENT_TYPE_TANDEM);
        if let Some(block) = Self::encode_header_block(headers)? {
            builder = builder.header(HEADERS_HEADER, block);
        }
        builder.body(Full::new(Bytes::from(payload))).map_err(|e| {
            TransportError::new(
                TransportErrorKind::BadArgs,
                format!("Invalid HTTP request: {}", e),
            )
            .into()
        })
    }

    /// Build the `200 OK` response carrying one reply.
    pub fn build_response(payload: Vec<u8>, headers: &Headers) -> Result<HyperResponse> {
        let mut response = Response::new(Full::new(Bytes::from(payload)));
        let map = response.headers_mut();
        map.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TANDEM));
        if let Some(block) = Self::encode_header_block(headers)? {
            map.insert(HEADERS_HEADER, block);
        }
        Ok(response)
    }

    /// Plain-text error response for requests that never reached dispatch.
    pub fn error_response(status: StatusCode, message: &str) -> HyperResponse {
        let mut response = Response::new(Full::new(Bytes::from(message.to_owned())));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response
    }

    /// Encode RPC headers into the reserved header value; `None` if empty.
    pub fn encode_header_block(headers: &Headers) -> Result<Option<HeaderValue>> {
        if headers.is_empty() {
            return Ok(None);
        }
        let json = serde_json::to_vec(headers)
            .map_err(|e| TransportError::corrupted(format!("Header block encode failed: {}", e)))?;
        let value = HeaderValue::from_str(&BASE64.encode(json))
            .map_err(|e| TransportError::corrupted(format!("Header block encode failed: {}", e)))?;
        Ok(Some(value))
    }

    /// Decode the reserved header; an absent header is an empty map.
    pub fn decode_header_block(map: &HeaderMap) -> Result<Headers> {
        let value = match map.get(HEADERS_HEADER) {
            Some(value) => value,
            None => return Ok(Headers::new()),
        };
        let json = BASE64
            .decode(value.as_bytes())
            .map_err(|e| TransportError::corrupted(format!("Header block is not base64: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| TransportError::corrupted(format!("Header block is not a map: {}", e)).into())
    }

    /// Collect a body, failing with `InvalidFrameSize` above `max_size`.
    ///
    /// A `Content-Length` over the limit fails before any of the body is read;
    /// otherwise reading stops as soon as the limit is passed.
    pub async fn collect_body(body: Incoming, max_size: usize) -> Result<Bytes> {
        let announced = body.size_hint().lower();
        if announced > max_size as u64 {
            return Err(Self::body_too_large(announced, max_size).into());
        }

        let collected = Limited::new(body, max_size).collect().await.map_err(|e| {
            if e.is::<LengthLimitError>() {
                return Self::body_too_large(max_size as u64 + 1, max_size);
            }
            match e.downcast::<hyper::Error>() {
                Ok(err) => Self::map_error(*err),
                Err(other) => TransportError::new(TransportErrorKind::Unknown, other.to_string()),
            }
        })?;
        Ok(collected.to_bytes())
    }

    fn body_too_large(len: u64, max_size: usize) -> TransportError {
        TransportError::new(
            TransportErrorKind::InvalidFrameSize,
            format!("Body too large: at least {} bytes (max: {})", len, max_size),
        )
    }

    /// Map a Hyper failure onto a transport kind.
    pub fn map_error(err: hyper::Error) -> TransportError {
        let kind = if err.is_parse() {
            TransportErrorKind::CorruptedData
        } else if err.is_timeout() {
            TransportErrorKind::TimedOut
        } else if err.is_user() {
            TransportErrorKind::BadArgs
        } else {
            TransportErrorKind::EndOfFile
        };
        TransportError::new(kind, format!("HTTP failure: {}", err))
    }
}
