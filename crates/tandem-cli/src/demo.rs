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

//! Demo `TestingService` implementation served by `tandem serve`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info};

use tandem_server::{get_context, RequestContext};
use tandem_services::{Color, Easy, TestingService};

/// Handler for `tandem serve`.
///
/// `invert` echoes every request header back with an `echo-` prefix, which
/// makes header round trips visible from `tandem call -H`. `shutdown`
/// signals [`shutdown_requested`](Self::shutdown_requested).
#[derive(Debug, Clone)]
pub struct DemoHandler {
    name: String,
    shutdown: Arc<Notify>,
}

impl DemoHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Resolves once a client has called `shutdown`.
    ///
    /// A `shutdown` that arrives before anyone waits is not lost.
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await
    }
}

impl Default for DemoHandler {
    fn default() -> Self {
        Self::new("tandem")
    }
}

#[async_trait]
impl TestingService for DemoHandler {
    async fn get_name(&self) -> anyhow::Result<String> {
        Ok(self.name.clone())
    }

    async fn invert(&self, ctx: &RequestContext, value: bool) -> anyhow::Result<bool> {
        for (key, header) in ctx.read_headers() {
            ctx.set_header(format!("echo-{}", key), header.clone());
        }
        debug!(
            "invert({}) from {}",
            value,
            ctx.peer_address()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown peer".to_string())
        );
        Ok(!value)
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        info!("Shutdown requested by client");
        self.shutdown.notify_one();
        Ok(())
    }

    async fn complex_action(
        &self,
        first: String,
        second: String,
        third: i64,
        fourth: String,
    ) -> anyhow::Result<i64> {
        debug!("complex_action({}, {}, {}, {})", first, second, third, fourth);
        Ok(third)
    }

    async fn takes_a_list(&self, ints: Vec<i32>) -> anyhow::Result<()> {
        debug!("takes_a_list: {} items", ints.len());
        Ok(())
    }

    async fn take_it_easy(&self, how: i32, what: Easy) -> anyhow::Result<()> {
        anyhow::ensure!(
            how == what.val,
            "take_it_easy: how ({}) does not match val ({})",
            how,
            what.val
        );
        Ok(())
    }

    async fn pick_a_color(&self, color: Color) -> anyhow::Result<()> {
        let ctx = get_context()?;
        ctx.set_header("color", format!("{:?}", color));
        Ok(())
    }

    async fn int_sizes(&self, one: i8, two: i16, three: i32, four: i64) -> anyhow::Result<()> {
        debug!("int_sizes({}, {}, {}, {})", one, two, three, four);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_common::Headers;

    #[tokio::test]
    async fn test_invert_echoes_headers() {
        let handler = DemoHandler::default();
        let mut headers = Headers::new();
        headers.insert("trace".to_string(), "abc".to_string());
        let ctx = RequestContext::new("invert", headers, None);

        assert!(handler.invert(&ctx, false).await.unwrap());
        assert_eq!(
            ctx.write_headers().get("echo-trace").map(String::as_str),
            Some("abc")
        );
    }

    #[tokio::test]
    async fn test_pick_a_color_needs_a_request_scope() {
        let handler = DemoHandler::default();
        assert!(handler.pick_a_color(Color::Red).await.is_err());

        let ctx = RequestContext::new("pick_a_color", Headers::new(), None);
        ctx.clone()
            .scope(async { handler.pick_a_color(Color::Red).await })
            .await
            .unwrap();
        assert_eq!(ctx.write_headers().get("color").map(String::as_str), Some("Red"));
    }

    #[tokio::test]
    async fn test_shutdown_before_waiting_is_remembered() {
        let handler = DemoHandler::default();
        handler.shutdown().await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), handler.shutdown_requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_take_it_easy_checks_values() {
        let handler = DemoHandler::default();
        let easy = Easy {
            val: 3,
            ..Default::default()
        };
        assert!(handler.take_it_easy(3, easy.clone()).await.is_ok());
        assert!(handler.take_it_easy(4, easy).await.is_err());
    }
}
