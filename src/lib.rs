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

//! # Tandem
//!
//! Async RPC with pluggable framing, pluggable codecs and per-call headers.
//!
//! This crate re-exports the workspace members:
//!
//! - [`common`]: wire messages, errors, codecs and frame transports
//! - [`client`]: the client handle, its configuration and per-call options
//! - [`server`]: the server, the [`Dispatch`](server::Dispatch) seam and the
//!   request context
//! - [`services`]: the `TestingService` and `StackService` contracts
//!
//! ## Example
//!
//! ```no_run
//! use tandem::client::{get_client, ClientConfig};
//! use tandem::common::Address;
//! use tandem::services::TestingServiceClient;
//!
//! # async fn example() -> tandem::common::Result<()> {
//! let client: TestingServiceClient =
//!     get_client(ClientConfig::new(Address::tcp("localhost", 9090)));
//! assert!(!client.invert(true).await?);
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub use tandem_client as client;
pub use tandem_common as common;
pub use tandem_server as server;
pub use tandem_services as services;

pub use tandem_client::{get_client, Client, ClientConfig, RpcOptions};
pub use tandem_common::{Address, TandemError};
pub use tandem_server::{get_context, Server, ServerConfig};
