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

//! Request Context
//!
//! Every dispatched call gets a fresh [`RequestContext`] holding the headers
//! the caller sent and collecting the headers the handler wants to send back.
//!
//! While a call is being dispatched its context is also bound as the
//! *ambient* context of the handling task, reachable from anywhere inside the
//! handler through [`get_context`]. The binding is a tokio task-local scoped to
//! that one call, so concurrent calls never see each other's headers and code
//! running outside a dispatch gets [`LookupError::NoActiveContext`].
//!
//! # Example
//!
//! ```
//! use tandem_server::context::{get_context, RequestContext};
//! use tandem_common::{Headers, LookupError};
//!
//! let mut headers = Headers::new();
//! headers.insert("tenant".to_string(), "acme".to_string());
//! let ctx = RequestContext::new("get_name", headers, None);
//!
//! assert_eq!(ctx.header("tenant"), Some("acme"));
//! ctx.set_header("served-by", "node-1");
//! assert_eq!(ctx.write_headers().get("served-by").map(String::as_str), Some("node-1"));
//!
//! // not inside a dispatched call
//! assert_eq!(get_context().unwrap_err(), LookupError::NoActiveContext);
//! ```

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tandem_common::{Headers, LookupError, SocketAddress};

tokio::task_local! {
    static CURRENT_CONTEXT: RequestContext;
}

/// Per-call header state.
///
/// Cheap to clone; clones share the same outgoing header map.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    method: String,
    peer: Option<SocketAddress>,
    read_headers: Headers,
    write_headers: Mutex<Headers>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, read_headers: Headers, peer: Option<SocketAddress>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                method: method.into(),
                peer,
                read_headers,
                write_headers: Mutex::new(Headers::new()),
            }),
        }
    }

    /// Name of the method being served
    pub fn method_name(&self) -> &str {
        &self.inner.method
    }

    /// Address of the calling peer, when the transport reports one
    pub fn peer_address(&self) -> Option<&SocketAddress> {
        self.inner.peer.as_ref()
    }

    /// Headers sent by the caller
    pub fn read_headers(&self) -> &Headers {
        &self.inner.read_headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.inner.read_headers.get(key).map(String::as_str)
    }

    /// Like [`header`](Self::header), but a missing key is an error.
    pub fn require_header(&self, key: &str) -> Result<&str, LookupError> {
        self.header(key)
            .ok_or_else(|| LookupError::MissingHeader(key.to_string()))
    }

    /// Add a header to the reply, replacing any previous value for `key`.
    pub fn set_header(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.write_headers.lock().insert(key.into(), value.into());
    }

    /// Snapshot of the headers set so far for the reply
    pub fn write_headers(&self) -> Headers {
        self.inner.write_headers.lock().clone()
    }

    /// Run `fut` with this context as the ambient context.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT_CONTEXT.scope(self, fut).await
    }
}

/// The context of the call currently being dispatched on this task.
///
/// # Errors
///
/// [`LookupError::NoActiveContext`] outside a dispatched call, every time.
pub fn get_context() -> Result<RequestContext, LookupError> {
    CURRENT_CONTEXT
        .try_with(RequestContext::clone)
        .map_err(|_| LookupError::NoActiveContext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(pairs: &[(&str, &str)]) -> RequestContext {
        let headers = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RequestContext::new("invert", headers, None)
    }

    #[test]
    fn test_lookup_outside_dispatch_fails_every_time() {
        for _ in 0..3 {
            assert_eq!(get_context().unwrap_err(), LookupError::NoActiveContext);
        }
    }

    #[tokio::test]
    async fn test_scope_binds_and_unbinds() {
        let ctx = context_with(&[("k", "v")]);

        let seen = ctx
            .clone()
            .scope(async {
                tokio::task::yield_now().await;
                let ambient = get_context().unwrap();
                ambient.set_header("reply", "yes");
                ambient.header("k").map(str::to_owned)
            })
            .await;

        assert_eq!(seen.as_deref(), Some("v"));
        assert_eq!(ctx.write_headers().get("reply").map(String::as_str), Some("yes"));
        assert!(get_context().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let a = context_with(&[("who", "a")]);
        let b = context_with(&[("who", "b")]);

        let read = || async {
            tokio::task::yield_now().await;
            get_context().unwrap().header("who").map(str::to_owned)
        };
        let (ra, rb) = tokio::join!(a.scope(read()), b.scope(read()));

        assert_eq!(ra.as_deref(), Some("a"));
        assert_eq!(rb.as_deref(), Some("b"));
    }

    #[test]
    fn test_require_header() {
        let ctx = context_with(&[("present", "1")]);
        assert_eq!(ctx.require_header("present").unwrap(), "1");
        assert_eq!(
            ctx.require_header("absent").unwrap_err(),
            LookupError::MissingHeader("absent".to_string())
        );
        assert_eq!(ctx.method_name(), "invert");
        assert!(ctx.peer_address().is_none());
    }
}
