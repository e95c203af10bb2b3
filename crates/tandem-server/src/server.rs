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
//! Binds one listening endpoint and serves one service processor on it.
//!
//! # Architecture
//!
//! - [`Server::serve`] binds, then runs the accept loop until [`Server::stop`]
//! - Each accepted connection runs in its own tracked task, observing a child
//!   of the server's cancellation token
//! - The first bytes of each connection pick its framing (unframed, framed,
//!   header envelope) or, when [`ServerConfig::accept_http`] is set, HTTP
//! - A connection that fails to parse is closed on its own; the accept loop
//!   and other connections carry on
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem_server::{Call, Dispatch, Server};
//! use tandem_common::{Address, ApplicationError};
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl Dispatch for Hello {
//!     fn service_name(&self) -> &'static str { "Hello" }
//!
//!     async fn dispatch(&self, call: Call) -> Result<Vec<u8>, ApplicationError> {
//!         match call.method() {
//!             "hello" => call.reply("world"),
//!             _ => Err(call.unknown_method()),
//!         }
//!     }
//! }
//!
//! # async fn run() -> tandem_common::Result<()> {
//! let server = Arc::new(Server::new(Hello, Address::tcp("127.0.0.1", 0)));
//! let serving = tokio::spawn({
//!     let server = Arc::clone(&server);
//!     async move { server.serve().await }
//! });
//!
//! println!("listening on {}", server.get_address().await?);
//! server.stop().await;
//! serving.await.ok();
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use tandem_common::transport::{BoxedStream, MAX_MESSAGE_SIZE};
use tandem_common::{Address, Result, SocketAddress, TransportError, TransportErrorKind};

use crate::connection::{describe, serve_connection};
use crate::dispatch::Dispatch;

/// Default time [`Server::stop`] waits for open connections to finish
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Server configuration.
///
/// # Default Configuration
///
/// - `max_frame_size`: 100 MB
/// - `accept_http`: false
/// - `shutdown_timeout`: 5 seconds
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_frame_size: usize,
    /// Serve HTTP clients on the same endpoint. When false, an HTTP request
    /// is treated like any other unparseable stream and the connection closed.
    pub accept_http: bool,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_MESSAGE_SIZE,
            accept_http: false,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_http(mut self, accept_http: bool) -> Self {
        self.accept_http = accept_http;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Lifecycle of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Serving,
    Stopping,
    Stopped,
}

/// State shared with connection tasks.
pub(crate) struct Shared {
    pub(crate) processor: Arc<dyn Dispatch>,
    pub(crate) config: ServerConfig,
}

pub struct Server {
    shared: Arc<Shared>,
    address: Address,
    state: watch::Sender<ServerState>,
    bound: Mutex<Option<SocketAddress>>,
    started: AtomicBool,
    cancel: CancellationToken,
    tracker: TaskTracker,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Create a server for `processor` on `address`. Performs no I/O.
    ///
    /// A TCP address with port 0 binds any free port; see
    /// [`get_address`](Self::get_address).
    pub fn new(processor: impl Dispatch, address: impl Into<Address>) -> Self {
        Self::with_config(processor, address, ServerConfig::default())
    }

    pub fn with_config(processor: impl Dispatch, address: impl Into<Address>, config: ServerConfig) -> Self {
        let (state, _) = watch::channel(ServerState::Idle);
        Self {
            shared: Arc::new(Shared {
                processor: Arc::new(processor),
                config,
            }),
            address: address.into(),
            state,
            bound: Mutex::new(None),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    /// The configured address (port 0 stays 0; see [`get_address`](Self::get_address))
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn service_name(&self) -> &'static str {
        self.shared.processor.service_name()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Number of connection tasks currently running.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Bind and serve until [`stop`](Self::stop) is called.
    ///
    /// May be called once. Returns after the listener is closed and open
    /// connections have finished or `shutdown_timeout` has passed.
    ///
    /// # Errors
    ///
    /// - `AlreadyOpen` if `serve` has already been called
    /// - `NotOpen` if the server was stopped before it started
    /// - `CouldNotBind` if the endpoint cannot be bound, including when a
    ///   file already exists at a local socket path
    pub async fn serve(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            if self.cancel.is_cancelled() {
                return Err(TransportError::not_open("Server has been stopped").into());
            }
            return Err(TransportError::new(
                TransportErrorKind::AlreadyOpen,
                "Server is already serving",
            )
            .into());
        }

        // reached on every exit path, including this future being dropped
        let _stopped = scopeguard::guard(&self.state, |state| {
            state.send_replace(ServerState::Stopped);
        });

        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let listener = Listener::bind(&self.address).await?;
        let local = listener.local_address()?;
        *self.bound.lock() = Some(local.clone());
        self.state.send_replace(ServerState::Serving);
        info!("{} server listening on {}", self.service_name(), local);

        self.accept_loop(&listener).await;

        self.state.send_replace(ServerState::Stopping);
        drop(listener);
        self.tracker.close();
        let open = self.active_connections();
        if open > 0 {
            info!("Waiting for {} connections to finish", open);
        }
        if tokio::time::timeout(self.shared.config.shutdown_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "{} connections still open after {:?}; abandoning them",
                self.active_connections(),
                self.shared.config.shutdown_timeout
            );
        }

        info!("Server on {} stopped", local);
        Ok(())
    }

    async fn accept_loop(&self, listener: &Listener) {
        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => return,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", describe(peer.as_ref()));
                    let shared = Arc::clone(&self.shared);
                    let cancel = self.cancel.child_token();
                    let active = ActiveConnection::new(&self.active);
                    self.tracker.spawn(async move {
                        let _active = active;
                        serve_connection(stream, peer, shared, cancel).await;
                    });
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Stop serving and wait until the server is `Stopped`.
    ///
    /// Safe to call before, during or after [`serve`](Self::serve), and more
    /// than once. A server stopped before it started never binds.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if !self.started.swap(true, Ordering::SeqCst) {
            self.state.send_replace(ServerState::Stopped);
            return;
        }
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
    }

    /// The address actually bound, with the real port if 0 was requested.
    ///
    /// Waits until [`serve`](Self::serve) has bound the listener.
    ///
    /// # Errors
    ///
    /// `NotOpen` if the server stopped without binding.
    pub async fn get_address(&self) -> Result<SocketAddress> {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s != ServerState::Idle).await;
        self.bound
            .lock()
            .clone()
            .ok_or_else(|| TransportError::not_open("Server is not listening").into())
    }
}

/// Counts a connection task for as long as it lives.
struct ActiveConnection(Arc<AtomicUsize>);

impl ActiveConnection {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Local {
        listener: tokio::net::UnixListener,
        path: std::path::PathBuf,
    },
}

impl Listener {
    async fn bind(address: &Address) -> Result<Self> {
        match address {
            Address::Tcp { port, .. } => {
                let host = address.host().unwrap_or_default();
                let listener = TcpListener::bind((host, *port))
                    .await
                    .map_err(|e| could_not_bind(address, e))?;
                Ok(Listener::Tcp(listener))
            }
            #[cfg(unix)]
            Address::Local(path) => {
                if path.exists() {
                    return Err(TransportError::new(
                        TransportErrorKind::CouldNotBind,
                        format!("Failed to bind {}: path already exists", address),
                    )
                    .into());
                }
                let listener =
                    tokio::net::UnixListener::bind(path).map_err(|e| could_not_bind(address, e))?;
                Ok(Listener::Local {
                    listener,
                    path: path.clone(),
                })
            }
            #[cfg(not(unix))]
            Address::Local(_) => Err(TransportError::new(
                TransportErrorKind::NotSupported,
                format!("Local sockets are unavailable on this platform: {}", address),
            )
            .into()),
        }
    }

    fn local_address(&self) -> Result<SocketAddress> {
        match self {
            Listener::Tcp(listener) => {
                let addr = listener
                    .local_addr()
                    .map_err(|e| TransportError::from_io(e, "Failed to get local address"))?;
                Ok(SocketAddress::Ip(addr))
            }
            #[cfg(unix)]
            Listener::Local { path, .. } => Ok(SocketAddress::Path(path.clone())),
        }
    }

    async fn accept(&self) -> io::Result<(BoxedStream, Option<SocketAddress>)> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                stream.set_nodelay(true)?;
                Ok((Box::new(stream), Some(SocketAddress::Ip(peer))))
            }
            #[cfg(unix)]
            Listener::Local { listener, .. } => {
                let (stream, peer) = listener.accept().await?;
                let peer = peer
                    .as_pathname()
                    .map(|path| SocketAddress::Path(path.to_path_buf()));
                Ok((Box::new(stream), peer))
            }
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Local { path, .. } = self {
            if let Err(e) = std::fs::remove_file(&*path) {
                warn!("Failed to remove socket file {}: {}", path.display(), e);
            }
        }
    }
}

fn could_not_bind(address: &Address, err: io::Error) -> TransportError {
    TransportError::new(
        TransportErrorKind::CouldNotBind,
        format!("Failed to bind {}: {}", address, err),
    )
}
