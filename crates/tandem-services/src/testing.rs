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

//! `TestingService` contract
//!
//! A small service exercising plain, context-aware, multi-argument and
//! structured calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tandem_client::Client;
use tandem_common::ApplicationError;
use tandem_server::{Call, Dispatch, RequestContext};

pub const SERVICE_NAME: &str = "TestingService";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Blue,
    Green,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Easy {
    pub val: i32,
    pub val_list: Vec<i32>,
    pub name: Option<String>,
}

/// Handler interface for `TestingService`.
///
/// `invert` receives its request context explicitly; every other method can
/// reach it through [`get_context`](tandem_server::get_context).
#[async_trait]
pub trait TestingService: Send + Sync + 'static {
    async fn get_name(&self) -> anyhow::Result<String>;

    async fn invert(&self, ctx: &RequestContext, value: bool) -> anyhow::Result<bool>;

    async fn shutdown(&self) -> anyhow::Result<()>;

    async fn complex_action(
        &self,
        first: String,
        second: String,
        third: i64,
        fourth: String,
    ) -> anyhow::Result<i64>;

    async fn takes_a_list(&self, ints: Vec<i32>) -> anyhow::Result<()>;

    async fn take_it_easy(&self, how: i32, what: Easy) -> anyhow::Result<()>;

    async fn pick_a_color(&self, color: Color) -> anyhow::Result<()>;

    async fn int_sizes(&self, one: i8, two: i16, three: i32, four: i64) -> anyhow::Result<()>;
}

/// Serves a [`TestingService`] handler.
pub struct TestingServiceProcessor<H> {
    handler: H,
}

impl<H: TestingService> TestingServiceProcessor<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: TestingService> Dispatch for TestingServiceProcessor<H> {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn dispatch(&self, call: Call) -> Result<Vec<u8>, ApplicationError> {
        let h = &self.handler;
        let failed = |e| call.handler_error(e);
        match call.method() {
            "get_name" => {
                let () = call.args()?;
                call.reply(&h.get_name().await.map_err(failed)?)
            }
            "invert" => {
                let (value,): (bool,) = call.args()?;
                call.reply(&h.invert(call.context(), value).await.map_err(failed)?)
            }
            "shutdown" => {
                let () = call.args()?;
                call.reply(&h.shutdown().await.map_err(failed)?)
            }
            "complex_action" => {
                let (first, second, third, fourth): (String, String, i64, String) = call.args()?;
                let result = h
                    .complex_action(first, second, third, fourth)
                    .await
                    .map_err(failed)?;
                call.reply(&result)
            }
            "takes_a_list" => {
                let (ints,): (Vec<i32>,) = call.args()?;
                call.reply(&h.takes_a_list(ints).await.map_err(failed)?)
            }
            "take_it_easy" => {
                let (how, what): (i32, Easy) = call.args()?;
                call.reply(&h.take_it_easy(how, what).await.map_err(failed)?)
            }
            "pick_a_color" => {
                let (color,): (Color,) = call.args()?;
                call.reply(&h.pick_a_color(color).await.map_err(failed)?)
            }
            "int_sizes" => {
                let (one, two, three, four): (i8, i16, i32, i64) = call.args()?;
                call.reply(&h.int_sizes(one, two, three, four).await.map_err(failed)?)
            }
            _ => Err(call.unknown_method()),
        }
    }
}

/// Client stub for `TestingService`.
pub struct TestingServiceClient {
    client: Client,
}

service_client!(TestingServiceClient, SERVICE_NAME);

impl TestingServiceClient {
    client_methods! {
        get_name / get_name_with () -> String;
        invert / invert_with (value: bool) -> bool;
        shutdown / shutdown_with () -> ();
        complex_action / complex_action_with (first: String, second: String, third: i64, fourth: String) -> i64;
        takes_a_list / takes_a_list_with (ints: Vec<i32>) -> ();
        take_it_easy / take_it_easy_with (how: i32, what: Easy) -> ();
        pick_a_color / pick_a_color_with (color: Color) -> ();
        int_sizes / int_sizes_with (one: i8, two: i16, three: i32, four: i64) -> ();
    }
}
