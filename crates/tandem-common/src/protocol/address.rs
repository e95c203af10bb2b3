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

//! Endpoint addressing
//!
//! An [`Address`] names where to connect or bind: a host/port pair resolved
//! through standard name lookup, or a filesystem path for a local socket.
//! A [`SocketAddress`] is what a server actually bound, with the concrete
//! port filled in when port 0 was requested.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::{TransportError, TransportErrorKind};

/// Prefix selecting a local socket path in the string form of an address.
pub const LOCAL_SCHEME: &str = "unix:";

/// Where to connect (client) or bind (server).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Host name or IP literal plus port. Port 0 asks a server for any free port.
    Tcp { host: String, port: u16 },
    /// Filesystem-domain socket
    Local(PathBuf),
}

impl Address {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Address::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Address::Local(path.into())
    }

    /// Host component with IPv6 brackets removed, if this is a TCP address.
    pub fn host(&self) -> Option<&str> {
        match self {
            Address::Tcp { host, .. } => Some(host.trim_start_matches('[').trim_end_matches(']')),
            Address::Local(_) => None,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            Address::Tcp { port, .. } => Some(*port),
            Address::Local(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Address::Tcp { .. } => None,
            Address::Local(path) => Some(path),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::Tcp {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl From<SocketAddress> for Address {
    fn from(addr: SocketAddress) -> Self {
        match addr {
            SocketAddress::Ip(addr) => addr.into(),
            SocketAddress::Path(path) => Address::Local(path),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } if host.contains(':') && !host.starts_with('[') => {
                write!(f, "[{}]:{}", host, port)
            }
            Address::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Address::Local(path) => write!(f, "{}{}", LOCAL_SCHEME, path.display()),
        }
    }
}

impl FromStr for Address {
    type Err = TransportError;

    /// Parses `host:port`, `[v6]:port` or `unix:/path/to/socket`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix(LOCAL_SCHEME) {
            if path.is_empty() {
                return Err(TransportError::new(
                    TransportErrorKind::BadArgs,
                    "Local address has an empty path",
                ));
            }
            return Ok(Address::Local(PathBuf::from(path)));
        }

        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::BadArgs,
                format!("Invalid address '{}': expected host:port or unix:/path", s),
            )
        })?;
        let port = port.parse::<u16>().map_err(|e| {
            TransportError::new(
                TransportErrorKind::BadArgs,
                format!("Invalid port in '{}': {}", s, e),
            )
        })?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(TransportError::new(
                TransportErrorKind::BadArgs,
                format!("Invalid address '{}': missing host", s),
            ));
        }
        Ok(Address::tcp(host, port))
    }
}

/// The address a server is actually listening on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SocketAddress {
    Ip(SocketAddr),
    Path(PathBuf),
}

impl SocketAddress {
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            SocketAddress::Ip(addr) => Some(addr.ip()),
            SocketAddress::Path(_) => None,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            SocketAddress::Ip(addr) => Some(addr.port()),
            SocketAddress::Path(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SocketAddress::Ip(_) => None,
            SocketAddress::Path(path) => Some(path),
        }
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketAddress::Ip(addr) => write!(f, "{}", addr),
            SocketAddress::Path(path) => write!(f, "{}{}", LOCAL_SCHEME, path.display()),
        }
    }
}
