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

//! Tandem Error Taxonomy
//!
//! Three families of failure are kept apart so callers can tell them apart:
//!
//! - [`TransportError`]: the call never completed a round trip (refused
//!   connection, timeout, malformed or truncated frame, peer closed early).
//! - [`ApplicationError`]: the remote service ran and reported a fault. This
//!   one travels over the wire inside the reply envelope.
//! - [`LookupError`]: local misuse, such as asking for the ambient call
//!   context outside of a dispatched call. Never sent over the wire.
//!
//! Numeric codes returned by [`TransportErrorKind::code`] and
//! [`ApplicationErrorKind::code`] are stable and may be compared across
//! processes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Discriminant of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Unknown,
    NotOpen,
    AlreadyOpen,
    TimedOut,
    EndOfFile,
    Interrupted,
    BadArgs,
    CorruptedData,
    InternalError,
    NotSupported,
    InvalidState,
    InvalidFrameSize,
    CouldNotBind,
    ConnectionRefused,
}

impl TransportErrorKind {
    /// Stable numeric code for this kind.
    pub fn code(self) -> i32 {
        match self {
            TransportErrorKind::Unknown => 0,
            TransportErrorKind::NotOpen => 1,
            TransportErrorKind::AlreadyOpen => 2,
            TransportErrorKind::TimedOut => 3,
            TransportErrorKind::EndOfFile => 4,
            TransportErrorKind::Interrupted => 5,
            TransportErrorKind::BadArgs => 6,
            TransportErrorKind::CorruptedData => 7,
            TransportErrorKind::InternalError => 8,
            TransportErrorKind::NotSupported => 9,
            TransportErrorKind::InvalidState => 10,
            TransportErrorKind::InvalidFrameSize => 11,
            TransportErrorKind::CouldNotBind => 13,
            TransportErrorKind::ConnectionRefused => 14,
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Unknown => "unknown",
            TransportErrorKind::NotOpen => "not open",
            TransportErrorKind::AlreadyOpen => "already open",
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::EndOfFile => "end of file",
            TransportErrorKind::Interrupted => "interrupted",
            TransportErrorKind::BadArgs => "bad arguments",
            TransportErrorKind::CorruptedData => "corrupted data",
            TransportErrorKind::InternalError => "internal error",
            TransportErrorKind::NotSupported => "not supported",
            TransportErrorKind::InvalidState => "invalid state",
            TransportErrorKind::InvalidFrameSize => "invalid frame size",
            TransportErrorKind::CouldNotBind => "could not bind",
            TransportErrorKind::ConnectionRefused => "connection refused",
        };
        f.write_str(name)
    }
}

/// Connection-level failure. Surfaced to the caller, never retried here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport error ({kind}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn end_of_file(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::EndOfFile, message)
    }

    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::CorruptedData, message)
    }

    pub fn not_open(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotOpen, message)
    }

    /// Maps an I/O error onto a transport kind, prefixing `context`.
    ///
    /// - EOF, reset, aborted, broken pipe -> `EndOfFile`
    /// - refused -> `ConnectionRefused`
    /// - timed out / would block -> `TimedOut`
    /// - anything else -> `Unknown`
    pub fn from_io(err: io::Error, context: &str) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => TransportErrorKind::EndOfFile,
            io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::TimedOut,
            io::ErrorKind::Interrupted => TransportErrorKind::Interrupted,
            _ => TransportErrorKind::Unknown,
        };
        Self::new(kind, format!("{}: {}", context, err))
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err, "I/O failure")
    }
}

/// Discriminant of an [`ApplicationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationErrorKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
}

impl ApplicationErrorKind {
    /// Stable numeric code for this kind.
    pub fn code(self) -> i32 {
        match self {
            ApplicationErrorKind::Unknown => 0,
            ApplicationErrorKind::UnknownMethod => 1,
            ApplicationErrorKind::InvalidMessageType => 2,
            ApplicationErrorKind::WrongMethodName => 3,
            ApplicationErrorKind::BadSequenceId => 4,
            ApplicationErrorKind::MissingResult => 5,
            ApplicationErrorKind::InternalError => 6,
            ApplicationErrorKind::ProtocolError => 7,
        }
    }
}

/// Fault reported by the remote service.
///
/// Produced by the server's dispatcher when a handler fails, and decoded by
/// the client from the reply envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Application error ({kind:?}): {message}")]
pub struct ApplicationError {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationError {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ApplicationErrorKind::UnknownMethod,
            format!("Unknown method: {}", method),
        )
    }
}

/// Local lookup failure; never crosses the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("No request context is active: not inside a dispatched call")]
    NoActiveContext,

    #[error("Header not present: {0}")]
    MissingHeader(String),
}

#[derive(Error, Debug)]
pub enum TandemError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl TandemError {
    /// The transport kind, if this is a transport failure.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            TandemError::Transport(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, TandemError::Transport(_))
    }

    pub fn is_application(&self) -> bool {
        matches!(self, TandemError::Application(_))
    }
}

impl From<io::Error> for TandemError {
    fn from(err: io::Error) -> Self {
        TandemError::Transport(err.into())
    }
}

pub type Result<T> = std::result::Result<T, TandemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_file_code_is_stable() {
        assert_eq!(TransportErrorKind::EndOfFile.code(), 4);
        assert_eq!(TransportErrorKind::CorruptedData.code(), 7);
        assert_eq!(TransportErrorKind::InvalidFrameSize.code(), 11);
    }

    #[test]
    fn test_io_error_mapping() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(
            TransportError::from_io(eof, "reading").kind,
            TransportErrorKind::EndOfFile
        );

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "nope");
        assert_eq!(
            TransportError::from(refused).kind,
            TransportErrorKind::ConnectionRefused
        );

        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(
            TransportError::from(timeout).kind,
            TransportErrorKind::TimedOut
        );
    }

    #[test]
    fn test_tandem_error_classification() {
        let transport: TandemError = TransportError::end_of_file("closed").into();
        assert!(transport.is_transport());
        assert_eq!(transport.transport_kind(), Some(TransportErrorKind::EndOfFile));

        let app: TandemError = ApplicationError::unknown_method("nope").into();
        assert!(app.is_application());
        assert_eq!(app.transport_kind(), None);
    }

    #[test]
    fn test_transport_error_display_mentions_kind() {
        let err = TransportError::corrupted("bad magic");
        assert_eq!(err.to_string(), "Transport error (corrupted data): bad magic");
    }
}
