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

//! Frame Transport
//!
//! Turns a raw byte stream into discrete messages under one of three framing
//! disciplines:
//!
//! | Framing | Layout | Headers |
//! |---|---|---|
//! | [`Framing::Unframed`] | `[payload]` | none |
//! | [`Framing::Framed`] | `[u32 BE length][payload]` | none |
//! | [`Framing::Header`] | `[u32 BE length][0x0FFF][flags][count][key/value ...][payload]` | yes |
//!
//! In the header envelope, `flags` and `count` are `u16` big-endian and each
//! key and value is a `u16` big-endian length followed by UTF-8 bytes.
//!
//! Unframed messages have no length; their end is found by decoding the
//! self-delimiting codec stream incrementally. A failed attempt reports how
//! many bytes the message needs at least, and decoding is not retried before
//! they have arrived.
//!
//! [`FrameReader`] keeps partially received bytes in its own buffer, so a
//! `read_message` future that is dropped part way loses nothing: the next call
//! continues from the same place.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::{Result, TransportError, TransportErrorKind};
use crate::protocol::Headers;
use crate::transport::codec::{Codec, Prefix, Protocol};

/// Magic number opening a header envelope
pub const HEADER_MAGIC: u16 = 0x0FFF;

const LENGTH_PREFIX_LEN: usize = 4;
const ENVELOPE_FIXED_LEN: usize = 6;
const SNIFF_LEN: usize = LENGTH_PREFIX_LEN + 2;
const READ_CHUNK: usize = 8 * 1024;

/// Request line prefixes that identify an HTTP/1.x client.
const HTTP_METHOD_TOKENS: [&[u8; 4]; 7] = [
    b"POST", b"GET ", b"PUT ", b"HEAD", b"DELE", b"OPTI", b"PATC",
];

/// Transport and framing selection for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientType {
    /// Raw payloads, no length prefix, no headers
    UnframedLegacy,
    /// Length-prefixed payloads, no headers
    FramedLegacy,
    /// Length-prefixed header envelope
    #[default]
    FramedCompact,
    /// HTTP/1.1 POST per call
    Http,
}

impl ClientType {
    /// Protocol used when none is configured explicitly.
    pub fn default_protocol(self) -> Protocol {
        match self {
            ClientType::UnframedLegacy | ClientType::FramedLegacy => Protocol::Binary,
            ClientType::FramedCompact | ClientType::Http => Protocol::Compact,
        }
    }

    /// Stream framing for this client type; `None` for HTTP.
    pub fn framing(self) -> Option<Framing> {
        match self {
            ClientType::UnframedLegacy => Some(Framing::Unframed),
            ClientType::FramedLegacy => Some(Framing::Framed),
            ClientType::FramedCompact => Some(Framing::Header),
            ClientType::Http => None,
        }
    }

    pub fn supports_headers(self) -> bool {
        self.framing().map_or(true, Framing::supports_headers)
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientType::UnframedLegacy => "unframed",
            ClientType::FramedLegacy => "framed",
            ClientType::FramedCompact => "framed-compact",
            ClientType::Http => "http",
        };
        f.write_str(name)
    }
}

impl FromStr for ClientType {
    type Err = TransportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unframed" => Ok(ClientType::UnframedLegacy),
            "framed" => Ok(ClientType::FramedLegacy),
            "framed-compact" => Ok(ClientType::FramedCompact),
            "http" => Ok(ClientType::Http),
            other => Err(TransportError::new(
                TransportErrorKind::BadArgs,
                format!(
                    "Unknown client type '{}': expected unframed, framed, framed-compact or http",
                    other
                ),
            )),
        }
    }
}

/// Stream framing discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framing {
    Unframed,
    Framed,
    Header,
}

impl Framing {
    pub fn supports_headers(self) -> bool {
        matches!(self, Framing::Header)
    }
}

/// What the first bytes of an accepted connection look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    Frames(Framing),
    Http,
}

/// Build one complete frame around an already encoded message payload.
///
/// Headers are dropped for framings that cannot carry them.
///
/// # Errors
///
/// `InvalidFrameSize` if the bytes after the length prefix would exceed
/// `max_frame_size` (the limit [`FrameReader`] enforces), `BadArgs`
/// if a header key or value does not fit its `u16` length field.
pub fn encode_frame(
    framing: Framing,
    payload: &[u8],
    headers: &Headers,
    max_frame_size: usize,
) -> Result<Vec<u8>> {
    let frame = match framing {
        Framing::Unframed => {
            frame_len(payload.len(), max_frame_size)?;
            payload.to_vec()
        }
        Framing::Framed => {
            let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
            frame.put_u32(frame_len(payload.len(), max_frame_size)?);
            frame.put_slice(payload);
            frame
        }
        Framing::Header => {
            let envelope = encode_envelope(payload, headers)?;
            let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + envelope.len());
            frame.put_u32(frame_len(envelope.len(), max_frame_size)?);
            frame.put_slice(&envelope);
            frame
        }
    };
    Ok(frame)
}

/// Write one complete frame and flush it.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer
        .write_all(frame)
        .await
        .map_err(|e| TransportError::from_io(e, "Failed to write frame"))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::from_io(e, "Failed to flush frame"))?;
    Ok(())
}

fn frame_len(len: usize, max_frame_size: usize) -> Result<u32> {
    if len > max_frame_size {
        return Err(oversized(len, max_frame_size).into());
    }
    u32::try_from(len).map_err(|_| oversized(len, max_frame_size).into())
}

fn oversized(len: usize, max_frame_size: usize) -> TransportError {
    TransportError::new(
        TransportErrorKind::InvalidFrameSize,
        format!("Frame too large: {} bytes (max: {})", len, max_frame_size),
    )
}

fn encode_envelope(payload: &[u8], headers: &Headers) -> Result<Vec<u8>> {
    let count = u16::try_from(headers.len()).map_err(|_| {
        TransportError::new(
            TransportErrorKind::BadArgs,
            format!("Too many headers: {}", headers.len()),
        )
    })?;

    let mut envelope = Vec::with_capacity(ENVELOPE_FIXED_LEN + payload.len());
    envelope.put_u16(HEADER_MAGIC);
    envelope.put_u16(0);
    envelope.put_u16(count);
    for (key, value) in headers {
        put_string(&mut envelope, key)?;
        put_string(&mut envelope, value)?;
    }
    envelope.put_slice(payload);
    Ok(envelope)
}

fn put_string(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        TransportError::new(
            TransportErrorKind::BadArgs,
            format!("Header entry too long: {} bytes", s.len()),
        )
    })?;
    out.put_u16(len);
    out.put_slice(s.as_bytes());
    Ok(())
}

fn decode_envelope(mut envelope: &[u8]) -> Result<(Headers, &[u8])> {
    let magic = take_u16(&mut envelope)?;
    if magic != HEADER_MAGIC {
        return Err(TransportError::corrupted(format!(
            "Bad header envelope magic 0x{:04x}",
            magic
        ))
        .into());
    }
    let _flags = take_u16(&mut envelope)?;
    let count = take_u16(&mut envelope)?;

    let mut headers = Headers::with_capacity(count as usize);
    for _ in 0..count {
        let key = take_string(&mut envelope)?;
        let value = take_string(&mut envelope)?;
        headers.insert(key, value);
    }
    Ok((headers, envelope))
}

fn take_u16(buf: &mut &[u8]) -> Result<u16> {
    if buf.remaining() < 2 {
        return Err(TransportError::corrupted("Header envelope truncated").into());
    }
    Ok(buf.get_u16())
}

fn take_string(buf: &mut &[u8]) -> Result<String> {
    let len = take_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(TransportError::corrupted("Header entry truncated").into());
    }
    let (bytes, rest) = buf.split_at(len);
    *buf = rest;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| TransportError::corrupted(format!("Header entry is not UTF-8: {}", e)).into())
}

/// Buffered, cancel-safe reader of framed messages.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_size: usize,
    /// Bytes an unframed message needs before decoding is worth retrying
    unframed_needed: usize,
}

impl<R> FrameReader<R> {
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            max_frame_size,
            unframed_needed: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Returns the stream and any bytes read from it but not yet consumed.
    pub fn into_parts(self) -> (R, Bytes) {
        (self.inner, self.buf.freeze())
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next message.
    ///
    /// Returns the codec the message was encoded with, the decoded message and
    /// the headers that travelled with it (always empty unless `framing` is
    /// [`Framing::Header`]). `Ok(None)` means the peer closed the stream
    /// cleanly between messages.
    ///
    /// # Errors
    ///
    /// - `EndOfFile` if the stream ends part way through a frame
    /// - `InvalidFrameSize` if a frame announces more than the size limit
    /// - `CorruptedData` if the frame or payload cannot be decoded
    pub async fn read_message<M: DeserializeOwned>(
        &mut self,
        framing: Framing,
    ) -> Result<Option<(Codec, M, Headers)>> {
        loop {
            if let Some(message) = self.parse_message(framing)? {
                return Ok(Some(message));
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Inspect the first bytes of a connection without consuming them.
    ///
    /// `Ok(None)` means the peer closed before sending anything.
    ///
    /// # Errors
    ///
    /// `CorruptedData` for an unrecognized stream, including an HTTP request
    /// when `accept_http` is false.
    pub async fn sniff(&mut self, accept_http: bool) -> Result<Option<Sniffed>> {
        loop {
            if let Some(sniffed) = self.classify(accept_http)? {
                return Ok(Some(sniffed));
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Read more bytes; `false` on a clean EOF with nothing buffered.
    async fn fill(&mut self) -> Result<bool> {
        self.buf.reserve(READ_CHUNK);
        let n = self
            .inner
            .read_buf(&mut self.buf)
            .await
            .map_err(|e| TransportError::from_io(e, "Failed to read frame"))?;
        if n > 0 {
            return Ok(true);
        }
        if self.buf.is_empty() {
            Ok(false)
        } else {
            Err(TransportError::end_of_file(format!(
                "Connection closed with {} bytes of an incomplete frame",
                self.buf.len()
            ))
            .into())
        }
    }

    fn parse_message<M: DeserializeOwned>(
        &mut self,
        framing: Framing,
    ) -> Result<Option<(Codec, M, Headers)>> {
        if framing == Framing::Unframed {
            if self.buf.is_empty() || self.buf.len() < self.unframed_needed {
                return Ok(None);
            }
            return match Codec::decode_message_prefix::<M>(&self.buf)? {
                Prefix::Complete((codec, message), used) => {
                    self.buf.advance(used);
                    self.unframed_needed = 0;
                    Ok(Some((codec, message, Headers::new())))
                }
                Prefix::Incomplete { needed } if needed > self.max_frame_size => {
                    Err(oversized(needed, self.max_frame_size).into())
                }
                Prefix::Incomplete { needed } => {
                    self.unframed_needed = needed;
                    Ok(None)
                }
            };
        }

        if self.buf.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }
        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > self.max_frame_size {
            return Err(oversized(len, self.max_frame_size).into());
        }
        if self.buf.len() < LENGTH_PREFIX_LEN + len {
            return Ok(None);
        }

        let mut frame = self.buf.split_to(LENGTH_PREFIX_LEN + len);
        frame.advance(LENGTH_PREFIX_LEN);

        let (headers, payload) = match framing {
            Framing::Header => decode_envelope(&frame)?,
            _ => (Headers::new(), &frame[..]),
        };
        if payload.len() < 2 {
            return Err(TransportError::corrupted(format!(
                "Frame payload too short: {} bytes",
                payload.len()
            ))
            .into());
        }
        let (codec, message) = Codec::decode_message(payload)?;
        Ok(Some((codec, message, headers)))
    }

    fn classify(&self, accept_http: bool) -> Result<Option<Sniffed>> {
        let buf = &self.buf[..];
        if buf.is_empty() {
            return Ok(None);
        }
        if Protocol::from_id(buf[0]).is_some() {
            return Ok(Some(Sniffed::Frames(Framing::Unframed)));
        }
        if buf.len() < SNIFF_LEN {
            return Ok(None);
        }

        if HTTP_METHOD_TOKENS.iter().any(|token| buf.starts_with(&token[..])) {
            if accept_http {
                return Ok(Some(Sniffed::Http));
            }
            return Err(TransportError::corrupted("HTTP request sent to a framed endpoint").into());
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > self.max_frame_size {
            return Err(oversized(len, self.max_frame_size).into());
        }
        if u16::from_be_bytes([buf[4], buf[5]]) == HEADER_MAGIC {
            return Ok(Some(Sniffed::Frames(Framing::Header)));
        }
        if Protocol::from_id(buf[4]).is_some() {
            return Ok(Some(Sniffed::Frames(Framing::Framed)));
        }
        Err(TransportError::corrupted(format!(
            "Unrecognized stream prefix {:02x?}",
            &buf[..SNIFF_LEN]
        ))
        .into())
    }
}
