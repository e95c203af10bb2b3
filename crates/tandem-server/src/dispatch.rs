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

//! Service Dispatcher
//!
//! A service processor implements [`Dispatch`]: it receives one decoded
//! [`Call`], matches on the method name, decodes the positional arguments,
//! awaits the handler and encodes its return value.
//!
//! # Error Classification
//!
//! Nothing a handler does can fail the connection. Every outcome becomes
//! either reply bytes or an [`ApplicationError`] sent back in the reply:
//!
//! | Outcome | Kind |
//! |---|---|
//! | method name not recognized | `UnknownMethod` |
//! | arguments do not decode | `ProtocolError` |
//! | handler returned `Err` | `Unknown` |
//! | handler panicked | `InternalError` |

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use tandem_common::transport::Codec;
use tandem_common::{
    ApplicationError, ApplicationErrorKind, Headers, RequestMessage, ResponseMessage, SocketAddress,
};

use crate::context::RequestContext;

/// A service processor: routes calls to handler methods.
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// Name of the service contract this processor serves
    fn service_name(&self) -> &'static str;

    /// Serve one call, returning the encoded return value.
    async fn dispatch(&self, call: Call) -> Result<Vec<u8>, ApplicationError>;
}

/// One decoded call.
pub struct Call {
    method: String,
    args: Vec<u8>,
    codec: Codec,
    context: RequestContext,
}

impl Call {
    pub fn new(method: impl Into<String>, args: Vec<u8>, codec: Codec, context: RequestContext) -> Self {
        Self {
            method: method.into(),
            args,
            codec,
            context,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The codec the call arrived in; replies use the same one.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Decode the positional arguments, normally as a tuple.
    pub fn args<A: DeserializeOwned>(&self) -> Result<A, ApplicationError> {
        self.codec.decode(&self.args).map_err(|e| {
            ApplicationError::new(
                ApplicationErrorKind::ProtocolError,
                format!("Bad arguments for {}: {}", self.method, e),
            )
        })
    }

    /// Encode a handler's return value.
    pub fn reply<R: Serialize + ?Sized>(&self, value: &R) -> Result<Vec<u8>, ApplicationError> {
        self.codec.encode(value).map_err(|e| {
            ApplicationError::new(
                ApplicationErrorKind::InternalError,
                format!("Failed to encode result of {}: {}", self.method, e),
            )
        })
    }

    /// Error for a method this processor does not serve.
    pub fn unknown_method(&self) -> ApplicationError {
        ApplicationError::unknown_method(&self.method)
    }

    /// Wrap a handler's error, keeping its full cause chain.
    pub fn handler_error(&self, err: anyhow::Error) -> ApplicationError {
        ApplicationError::new(ApplicationErrorKind::Unknown, format!("{:#}", err))
    }
}

/// Run one request through `processor` with its context bound as the
/// ambient context, producing the reply and the reply headers.
pub(crate) async fn handle_request(
    processor: &dyn Dispatch,
    codec: Codec,
    request: RequestMessage,
    headers: Headers,
    peer: Option<SocketAddress>,
) -> (ResponseMessage, Headers) {
    let RequestMessage {
        seq_id,
        method,
        args,
    } = request;
    let context = RequestContext::new(method.clone(), headers, peer);
    let call = Call::new(method.clone(), args, codec, context.clone());

    let outcome = AssertUnwindSafe(context.clone().scope(processor.dispatch(call)))
        .catch_unwind()
        .await;

    let response = match outcome {
        Ok(Ok(result)) => ResponseMessage::success(seq_id, result),
        Ok(Err(e)) => {
            warn!("{}.{} failed: {}", processor.service_name(), method, e.message);
            ResponseMessage::exception(seq_id, e)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("{}.{} panicked: {}", processor.service_name(), method, message);
            ResponseMessage::exception(
                seq_id,
                ApplicationError::new(
                    ApplicationErrorKind::InternalError,
                    format!("Handler for {} panicked: {}", method, message),
                ),
            )
        }
    };
    (response, context.write_headers())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
