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

//! Tandem Server
//!
//! This crate serves a tandem service processor over TCP or a local socket.
//!
//! - [`Server`]: listener, accept loop, per-connection tasks, shutdown
//! - [`Dispatch`] / [`Call`]: the seam between the transport and a service's
//!   handler implementation
//! - [`RequestContext`] / [`get_context`]: per-call headers, available to
//!   handlers explicitly or as the ambient context of the dispatching task

mod connection;
pub mod context;
pub mod dispatch;
mod http;
pub mod server;

pub use context::{get_context, RequestContext};
pub use dispatch::{Call, Dispatch};
pub use server::{Server, ServerConfig, ServerState};
