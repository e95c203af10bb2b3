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

use std::time::Duration;

use tandem_common::Headers;

/// Per-call options.
///
/// Headers added with [`set_header`](Self::set_header) are sent with the
/// call; once the call resolves, [`read_headers`](Self::read_headers) holds
/// the headers the server sent back. Use one instance per call.
///
/// Transports without a header channel (unframed and legacy framed) drop
/// outgoing headers and always leave `read_headers` empty.
#[derive(Debug, Clone, Default)]
pub struct RpcOptions {
    write_headers: Headers,
    read_headers: Headers,
    timeout: Option<Duration>,
}

impl RpcOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one outgoing header, replacing any previous value for `key`.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.write_headers.insert(key.into(), value.into());
        self
    }

    pub fn write_headers(&self) -> &Headers {
        &self.write_headers
    }

    /// Headers received with the reply; empty until the call resolves.
    pub fn read_headers(&self) -> &Headers {
        &self.read_headers
    }

    pub fn read_header(&self, key: &str) -> Option<&str> {
        self.read_headers.get(key).map(String::as_str)
    }

    /// Fail the call with `TimedOut` if no reply arrives within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn set_read_headers(&mut self, headers: Headers) {
        self.read_headers = headers;
    }
}
