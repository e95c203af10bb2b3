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

//! Tandem Client
//!
//! A [`Client`] is bound to one address, one [`ClientType`] and one
//! [`Protocol`] for its whole life. Construction does no I/O; the connection
//! is made by [`Client::open`] or by the first call, and is torn down exactly
//! once by [`Client::close`] or by dropping the handle.
//!
//! Typed stubs implement [`ServiceClient`] and are built with [`get_client`].
//!
//! # Example
//!
//! ```no_run
//! use tandem_client::{Client, ClientConfig, RpcOptions};
//! use tandem_common::Address;
//!
//! # async fn run() -> tandem_common::Result<()> {
//! let client = Client::new(ClientConfig::new(Address::tcp("127.0.0.1", 9090)));
//! let mut options = RpcOptions::new();
//! options.set_header("trace-id", "abc");
//!
//! let inverted: bool = client.invoke("invert", &(true,), &mut options).await?;
//! assert!(!inverted);
//! println!("server said: {:?}", options.read_headers());
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! [`ClientType`]: tandem_common::transport::ClientType
//! [`Protocol`]: tandem_common::transport::Protocol

pub mod client;
pub mod config;
mod connection;
pub mod options;

pub use client::{get_client, Client, ConnectionState, ServiceClient};
pub use config::ClientConfig;
pub use options::RpcOptions;
