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

use tandem_common::transport::{ClientType, Protocol, MAX_MESSAGE_SIZE};
use tandem_common::Address;

/// Default time allowed for name resolution and for each connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client configuration.
///
/// Everything a [`Client`](crate::Client) needs to reach its server. Fixed for
/// the lifetime of the client.
///
/// # Default Configuration
///
/// - `client_type`: [`ClientType::FramedCompact`]
/// - `protocol`: the client type's default
/// - `connect_timeout`: 5 seconds
/// - `http_path`: `/`
/// - `max_frame_size`: 100 MB
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tandem_client::ClientConfig;
/// use tandem_common::transport::{ClientType, Protocol};
/// use tandem_common::Address;
///
/// let config = ClientConfig::new(Address::tcp("localhost", 9090))
///     .with_client_type(ClientType::FramedLegacy)
///     .with_protocol(Protocol::Compact)
///     .with_connect_timeout(Duration::from_secs(1));
/// assert_eq!(config.protocol(), Protocol::Compact);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: Address,
    pub client_type: ClientType,
    /// Explicit protocol; `None` uses the client type's default
    pub protocol: Option<Protocol>,
    pub connect_timeout: Duration,
    /// Request target for HTTP clients
    pub http_path: String,
    /// `Host` header for HTTP clients; defaults to the address
    pub http_host: Option<String>,
    pub max_frame_size: usize,
}

impl ClientConfig {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            client_type: ClientType::default(),
            protocol: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            http_path: "/".to_string(),
            http_host: None,
            max_frame_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_http_path(mut self, path: impl Into<String>) -> Self {
        self.http_path = path.into();
        self
    }

    pub fn with_http_host(mut self, host: impl Into<String>) -> Self {
        self.http_host = Some(host.into());
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// The protocol in effect: explicit if set, else the client type's default.
    pub fn protocol(&self) -> Protocol {
        self.protocol
            .unwrap_or_else(|| self.client_type.default_protocol())
    }

    pub(crate) fn http_host(&self) -> String {
        match (&self.http_host, &self.address) {
            (Some(host), _) => host.clone(),
            (None, Address::Tcp { .. }) => self.address.to_string(),
            (None, Address::Local(_)) => "localhost".to_string(),
        }
    }
}
