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

//! Tandem Common Types and Transport
//!
//! This crate provides the wire protocol, error taxonomy and frame transports
//! shared by tandem clients and servers.
//!
//! # Overview
//!
//! Tandem is an async RPC stack: a typed service contract is invoked across a
//! TCP or local socket, with selectable framing, selectable serialization and
//! per-call headers travelling in both directions. This crate contains the
//! pieces both ends agree on:
//!
//! - **Protocol Layer**: request/reply messages, addresses, errors
//! - **Transport Layer**: codecs, framing, HTTP tunnelling, stream setup
//!
//! # Components
//!
//! - [`protocol`] - Wire messages, [`Address`], [`TandemError`]
//! - [`transport`] - [`Codec`](transport::Codec), [`FrameReader`](transport::FrameReader) and friends
//!
//! # Example
//!
//! ```
//! use tandem_common::{RequestMessage, ResponseMessage};
//!
//! let request = RequestMessage::new(7, "invert", vec![0x00]);
//! let response = ResponseMessage::success(request.seq_id, vec![0x01]);
//! assert!(response.is_success());
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
