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

//! Tandem Service Contracts
//!
//! Each contract module holds what an interface compiler would emit for one
//! service:
//!
//! - the contract's data types
//! - a handler trait with one async method per operation
//! - a processor that implements [`Dispatch`](tandem_server::Dispatch) for
//!   any handler
//! - a typed client stub implementing
//!   [`ServiceClient`](tandem_client::ServiceClient)
//!
//! Arguments travel as one positional tuple in declaration order and the wire
//! method name is the Rust method name.

#[macro_use]
mod macros;

pub mod stack;
pub mod testing;

pub use stack::{Simple, StackService, StackServiceClient, StackServiceProcessor};
pub use testing::{Color, Easy, TestingService, TestingServiceClient, TestingServiceProcessor};
