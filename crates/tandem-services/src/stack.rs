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

//! `StackService` contract
//!
//! Calls taking and returning structs and opaque byte buffers. Buffers are
//! [`Bytes`]: the handler owns what it receives and hands ownership of what it
//! returns to the codec.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tandem_client::Client;
use tandem_common::ApplicationError;
use tandem_server::{Call, Dispatch};

pub const SERVICE_NAME: &str = "StackService";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simple {
    pub val: i32,
}

#[async_trait]
pub trait StackService: Send + Sync + 'static {
    async fn add_to(&self, lst: Vec<i32>, value: i32) -> anyhow::Result<Vec<i32>>;

    async fn get_simple(&self) -> anyhow::Result<Simple>;

    async fn take_simple(&self, smpl: Simple) -> anyhow::Result<()>;

    async fn get_iobuf(&self) -> anyhow::Result<Bytes>;

    async fn take_iobuf(&self, iobuf: Bytes) -> anyhow::Result<()>;

    async fn take_iobuf_ptr(&self, iobuf_ptr: Bytes) -> anyhow::Result<()>;
}

/// Serves a [`StackService`] handler.
pub struct StackServiceProcessor<H> {
    handler: H,
}

impl<H: StackService> StackServiceProcessor<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<H: StackService> Dispatch for StackServiceProcessor<H> {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn dispatch(&self, call: Call) -> Result<Vec<u8>, ApplicationError> {
        let h = &self.handler;
        let failed = |e| call.handler_error(e);
        match call.method() {
            "add_to" => {
                let (lst, value): (Vec<i32>, i32) = call.args()?;
                call.reply(&h.add_to(lst, value).await.map_err(failed)?)
            }
            "get_simple" => {
                let () = call.args()?;
                call.reply(&h.get_simple().await.map_err(failed)?)
            }
            "take_simple" => {
                let (smpl,): (Simple,) = call.args()?;
                call.reply(&h.take_simple(smpl).await.map_err(failed)?)
            }
            "get_iobuf" => {
                let () = call.args()?;
                call.reply(&h.get_iobuf().await.map_err(failed)?)
            }
            "take_iobuf" => {
                let (iobuf,): (Bytes,) = call.args()?;
                call.reply(&h.take_iobuf(iobuf).await.map_err(failed)?)
            }
            "take_iobuf_ptr" => {
                let (iobuf_ptr,): (Bytes,) = call.args()?;
                call.reply(&h.take_iobuf_ptr(iobuf_ptr).await.map_err(failed)?)
            }
            _ => Err(call.unknown_method()),
        }
    }
}

/// Client stub for `StackService`.
pub struct StackServiceClient {
    client: Client,
}

service_client!(StackServiceClient, SERVICE_NAME);

impl StackServiceClient {
    client_methods! {
        add_to / add_to_with (lst: Vec<i32>, value: i32) -> Vec<i32>;
        get_simple / get_simple_with () -> Simple;
        take_simple / take_simple_with (smpl: Simple) -> ();
        get_iobuf / get_iobuf_with () -> Bytes;
        take_iobuf / take_iobuf_with (iobuf: Bytes) -> ();
        take_iobuf_ptr / take_iobuf_ptr_with (iobuf_ptr: Bytes) -> ();
    }
}
