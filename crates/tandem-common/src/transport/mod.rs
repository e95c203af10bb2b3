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

//! Tandem Transport Layer
//!
//! Codecs, stream framing and the HTTP tunnel used by both clients and
//! servers.
//!
//! # Architecture
//!
//! A message travels through three layers:
//! - **Codec**: serializes the message (binary or compact) behind a two byte
//!   `[protocol id, version]` prefix
//! - **Framing**: delimits messages on the stream (unframed, length-prefixed,
//!   or length-prefixed header envelope), or one HTTP exchange per call
//! - **Stream**: a TCP or local socket
//!
//! # Components
//!
//! - **[`Codec`]** / **[`Protocol`]**: payload serialization
//! - **[`FrameReader`]** / **[`encode_frame`]** / **[`write_frame`]**: framing
//! - **[`HttpTransport`]**: HTTP request/response helpers
//! - **[`connect`]** / **[`BoxedStream`]** / **[`Rewind`]**: streams
//!
//! # Message Size Limits
//!
//! Frames default to a maximum of 100 MB to prevent memory exhaustion.
//!
//! # Example
//!
//! ```
//! use tandem_common::protocol::{Headers, RequestMessage};
//! use tandem_common::transport::{encode_frame, Codec, Framing, Protocol, MAX_MESSAGE_SIZE};
//!
//! let codec = Codec::new(Protocol::Compact);
//! let request = RequestMessage::new(1, "get_name", codec.encode(&()).unwrap());
//! let payload = codec.encode_message(&request).unwrap();
//! let frame = encode_frame(Framing::Framed, &payload, &Headers::new(), MAX_MESSAGE_SIZE).unwrap();
//! assert_eq!(&frame[..4], &(payload.len() as u32).to_be_bytes());
//! ```

pub mod codec;
pub mod framing;
pub mod http;
pub mod stream;

pub use codec::{BinaryCodec, Codec, CompactCodec, Prefix, Protocol};
pub use framing::{encode_frame, write_frame, ClientType, FrameReader, Framing, Sniffed};
pub use http::{HttpTransport, HyperRequest, HyperResponse};
pub use stream::{connect, BoxedStream, Io, Rewind};

/// Default maximum frame size (100 MB)
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;
