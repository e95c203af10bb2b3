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

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use tandem_common::transport::{ClientType, Codec, Protocol};
use tandem_common::{
    ApplicationError, ApplicationErrorKind, ReplyBody, RequestMessage, Result, TransportError,
    TransportErrorKind,
};

use crate::config::ClientConfig;
use crate::connection::{Connection, Link};
use crate::options::RpcOptions;

/// Lifecycle of a client's single connection.
///
/// Moves forward only. `Connecting` falls back to `Unconnected` if the
/// connect attempt fails or is abandoned; nothing leaves `Closing` except
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

struct State {
    phase: ConnectionState,
    connection: Option<Connection>,
}

/// Tandem RPC client
///
/// Owns at most one connection. Calls may be issued concurrently through a
/// shared reference; on framed transports they are pipelined and each reply
/// is matched to its call by sequence id, so replies complete in the order
/// the server sends them. HTTP calls are sent one at a time.
///
/// The connection is released exactly once, by [`close`](Self::close) or by
/// dropping the client, whichever comes first. Both paths detach and signal
/// the connection before doing anything that could be interrupted.
pub struct Client {
    config: ClientConfig,
    protocol: Protocol,
    state: Mutex<State>,
    connect_lock: tokio::sync::Mutex<()>,
    next_seq_id: AtomicU32,
}

impl Client {
    /// Create a client. Performs no I/O.
    pub fn new(config: ClientConfig) -> Self {
        let protocol = config.protocol();
        Self {
            config,
            protocol,
            state: Mutex::new(State {
                phase: ConnectionState::Unconnected,
                connection: None,
            }),
            connect_lock: tokio::sync::Mutex::new(()),
            next_seq_id: AtomicU32::new(1),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client_type(&self) -> ClientType {
        self.config.client_type
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().phase
    }

    /// Establish the connection.
    ///
    /// Returns immediately if already connected. If this future is dropped
    /// before it completes, any partially opened socket is closed and the
    /// client returns to `Unconnected`.
    ///
    /// # Errors
    ///
    /// - `NotOpen` if the client has been closed
    /// - `ConnectionRefused`, `TimedOut` or another transport kind if the
    ///   connection cannot be made
    pub async fn open(&self) -> Result<()> {
        let _serialized = self.connect_lock.lock().await;
        {
            let mut state = self.state.lock();
            match state.phase {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Closing | ConnectionState::Closed => {
                    return Err(TransportError::not_open("Client is closed").into())
                }
                ConnectionState::Unconnected | ConnectionState::Connecting => {
                    state.phase = ConnectionState::Connecting;
                }
            }
        }

        let abandoned = scopeguard::guard((), |_| {
            let mut state = self.state.lock();
            if state.phase == ConnectionState::Connecting {
                state.phase = ConnectionState::Unconnected;
            }
        });
        let established = Connection::establish(&self.config).await;
        scopeguard::ScopeGuard::into_inner(abandoned);

        let mut state = self.state.lock();
        match established {
            Ok(connection) if state.phase == ConnectionState::Connecting => {
                state.phase = ConnectionState::Connected;
                state.connection = Some(connection);
                Ok(())
            }
            Ok(connection) => {
                // closed while connecting
                drop(state);
                drop(connection);
                Err(TransportError::not_open("Client was closed while connecting").into())
            }
            Err(e) => {
                if state.phase == ConnectionState::Connecting {
                    state.phase = ConnectionState::Unconnected;
                }
                Err(e)
            }
        }
    }

    /// Close the connection. Idempotent.
    ///
    /// The connection is detached and told to shut down before the first
    /// suspension point, so abandoning this future still closes the socket.
    pub async fn close(&self) {
        let connection = {
            let mut state = self.state.lock();
            if state.phase == ConnectionState::Closed {
                return;
            }
            state.phase = ConnectionState::Closing;
            state.connection.take()
        };

        if let Some(connection) = connection {
            debug!("Closing connection to {}", self.config.address);
            connection.shutdown().await;
        }

        self.state.lock().phase = ConnectionState::Closed;
    }

    /// Call `method` with positional `args` and decode its return value.
    ///
    /// Connects first if the client has not been opened. `args` is encoded as
    /// one value, normally a tuple: `&(a, b)`, `&(a,)` or `&()`.
    ///
    /// Outgoing headers are taken from `options`; on return (success or
    /// application error) `options.read_headers()` holds the reply headers.
    ///
    /// # Errors
    ///
    /// - [`TandemError::Application`](tandem_common::TandemError::Application)
    ///   if the server ran the call and reported a fault
    /// - [`TandemError::Transport`](tandem_common::TandemError::Transport) for
    ///   connection, framing and decoding failures, including `NotOpen` after
    ///   [`close`](Self::close) and `TimedOut` when the options' timeout passes
    pub async fn invoke<A, R>(&self, method: &str, args: &A, options: &mut RpcOptions) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let link = self.link().await?;
        let codec = Codec::new(self.protocol);
        let seq_id = self.next_seq_id.fetch_add(1, Ordering::Relaxed);
        let request = RequestMessage::new(seq_id, method, codec.encode(args)?);
        let payload = codec.encode_message(&request)?;

        let call = link.call(seq_id, payload, options.write_headers());
        let reply = match options.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                TransportError::new(
                    TransportErrorKind::TimedOut,
                    format!("Call to {} timed out after {:?}", method, timeout),
                )
            })??,
            None => call.await?,
        };

        if reply.response.seq_id != seq_id {
            return Err(ApplicationError::new(
                ApplicationErrorKind::BadSequenceId,
                format!(
                    "Reply to {} has seq_id {} (expected {})",
                    method, reply.response.seq_id, seq_id
                ),
            )
            .into());
        }
        options.set_read_headers(reply.headers);

        match reply.response.body {
            ReplyBody::Success(result) => reply.codec.decode(&result),
            ReplyBody::Exception(error) => Err(error.into()),
        }
    }

    async fn link(&self) -> Result<Arc<Link>> {
        if let Some(link) = self.current_link()? {
            return Ok(link);
        }
        self.open().await?;
        self.current_link()?
            .ok_or_else(|| TransportError::not_open("Connection closed while opening").into())
    }

    fn current_link(&self) -> Result<Option<Arc<Link>>> {
        let state = self.state.lock();
        match state.phase {
            ConnectionState::Closing | ConnectionState::Closed => {
                Err(TransportError::not_open("Client is closed").into())
            }
            _ => Ok(state.connection.as_ref().map(Connection::link)),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.phase = ConnectionState::Closed;
        // dropping the connection cancels its driver, which drops the socket
        state.connection.take();
    }
}

/// A typed client stub for one service contract.
pub trait ServiceClient: Sized {
    /// Name of the service this stub calls
    const SERVICE_NAME: &'static str;

    fn from_client(client: Client) -> Self;

    fn client(&self) -> &Client;
}

/// Build a typed stub. Performs no I/O.
///
/// # Example
///
/// ```no_run
/// use tandem_client::{get_client, Client, ClientConfig, ServiceClient};
/// use tandem_common::Address;
///
/// struct EchoClient(Client);
///
/// impl ServiceClient for EchoClient {
///     const SERVICE_NAME: &'static str = "Echo";
///     fn from_client(client: Client) -> Self { EchoClient(client) }
///     fn client(&self) -> &Client { &self.0 }
/// }
///
/// let echo: EchoClient = get_client(ClientConfig::new(Address::tcp("localhost", 9090)));
/// ```
pub fn get_client<S: ServiceClient>(config: ClientConfig) -> S {
    S::from_client(Client::new(config))
}
