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

//! Serialization protocols
//!
//! Two interchangeable codecs sit behind one [`Codec`] type:
//!
//! - **Binary** ([`BinaryCodec`]): `bincode`, fixed-width big-endian integers
//! - **Compact** ([`CompactCodec`]): `postcard`, varint integers
//!
//! Every message payload begins with a two byte prefix
//! `[protocol id, version]` so a receiver can pick the right codec without
//! being told in advance:
//!
//! ```text
//! [0x80 | 0x82] [0x01] [codec body ...]
//! ```
//!
//! Values nested inside a message (call arguments, return values) are
//! encoded with the same codec but carry no prefix.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::protocol::error::{Result, TransportError, TransportErrorKind};
use crate::transport::MAX_MESSAGE_SIZE;

/// First payload byte of a binary-encoded message
pub const BINARY_PROTOCOL_ID: u8 = 0x80;
/// First payload byte of a compact-encoded message
pub const COMPACT_PROTOCOL_ID: u8 = 0x82;
/// Second payload byte of every message
pub const PROTOCOL_VERSION: u8 = 0x01;

const MESSAGE_PREFIX_LEN: usize = 2;

/// Outcome of decoding from the front of a buffer that may still be growing.
#[derive(Debug, PartialEq, Eq)]
pub enum Prefix<T> {
    /// A whole value and the number of bytes it took
    Complete(T, usize),
    /// The buffer ran out; no attempt can get further until it holds at least
    /// `needed` bytes
    Incomplete { needed: usize },
}

impl<T> Prefix<T> {
    fn offset(self, by: usize) -> Self {
        match self {
            Prefix::Complete(value, used) => Prefix::Complete(value, used + by),
            Prefix::Incomplete { needed } => Prefix::Incomplete { needed: needed + by },
        }
    }
}

/// Serialization protocol selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Binary,
    Compact,
}

impl Protocol {
    pub fn id(self) -> u8 {
        match self {
            Protocol::Binary => BINARY_PROTOCOL_ID,
            Protocol::Compact => COMPACT_PROTOCOL_ID,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            BINARY_PROTOCOL_ID => Some(Protocol::Binary),
            COMPACT_PROTOCOL_ID => Some(Protocol::Compact),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Binary => f.write_str("binary"),
            Protocol::Compact => f.write_str("compact"),
        }
    }
}

impl FromStr for Protocol {
    type Err = TransportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Protocol::Binary),
            "compact" => Ok(Protocol::Compact),
            other => Err(TransportError::new(
                TransportErrorKind::BadArgs,
                format!("Unknown protocol '{}': expected binary or compact", other),
            )),
        }
    }
}

/// Codec for encoding/decoding call payloads.
///
/// # Example
///
/// ```
/// use tandem_common::transport::{Codec, Protocol};
///
/// let codec = Codec::new(Protocol::Compact);
/// let bytes = codec.encode(&(true, 7u32)).unwrap();
/// let (flag, n): (bool, u32) = codec.decode(&bytes).unwrap();
/// assert!(flag);
/// assert_eq!(n, 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Binary(BinaryCodec),
    Compact(CompactCodec),
}

impl Codec {
    pub fn new(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Binary => Codec::Binary(BinaryCodec),
            Protocol::Compact => Codec::Compact(CompactCodec),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Codec::Binary(_) => Protocol::Binary,
            Codec::Compact(_) => Protocol::Compact,
        }
    }

    /// Encode a bare value (no protocol prefix)
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Binary(_) => BinaryCodec::encode(value),
            Codec::Compact(_) => CompactCodec::encode(value),
        }
    }

    /// Decode a bare value (no protocol prefix)
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            Codec::Binary(_) => BinaryCodec::decode(data),
            Codec::Compact(_) => CompactCodec::decode(data),
        }
    }

    /// Encode a message, prefixed with this codec's protocol id and version
    pub fn encode_message<T: Serialize>(&self, message: &T) -> Result<Vec<u8>> {
        let body = self.encode(message)?;
        let mut payload = Vec::with_capacity(MESSAGE_PREFIX_LEN + body.len());
        payload.push(self.protocol().id());
        payload.push(PROTOCOL_VERSION);
        payload.extend_from_slice(&body);
        Ok(payload)
    }

    /// Decode a complete message payload, detecting the codec from its prefix.
    ///
    /// Returns the codec that was used so replies can be encoded the same way.
    pub fn decode_message<T: DeserializeOwned>(payload: &[u8]) -> Result<(Codec, T)> {
        let codec = Self::detect(payload)?.ok_or_else(|| {
            TransportError::end_of_file("Payload shorter than its protocol prefix")
        })?;
        let message = codec.decode(&payload[MESSAGE_PREFIX_LEN..])?;
        Ok((codec, message))
    }

    /// Decode one message from the front of a byte stream.
    ///
    /// Used by unframed transports, where only the codec knows where a message
    /// ends. An incomplete message reports how many bytes the next attempt
    /// needs, so a reader can keep filling without decoding again.
    pub fn decode_message_prefix<T: DeserializeOwned>(
        data: &[u8],
    ) -> Result<Prefix<(Codec, T)>> {
        let codec = match Self::detect(data)? {
            Some(codec) => codec,
            None => {
                return Ok(Prefix::Incomplete {
                    needed: MESSAGE_PREFIX_LEN,
                })
            }
        };
        let body = &data[MESSAGE_PREFIX_LEN..];
        let decoded = match codec {
            Codec::Binary(_) => BinaryCodec::decode_prefix(body)?,
            Codec::Compact(_) => CompactCodec::decode_prefix(body)?,
        };
        Ok(match decoded.offset(MESSAGE_PREFIX_LEN) {
            Prefix::Complete(message, used) => Prefix::Complete((codec, message), used),
            Prefix::Incomplete { needed } => Prefix::Incomplete { needed },
        })
    }

    /// Identify the codec from a payload prefix; `None` if fewer than two bytes.
    fn detect(data: &[u8]) -> Result<Option<Codec>> {
        if data.len() < MESSAGE_PREFIX_LEN {
            return Ok(None);
        }
        let protocol = Protocol::from_id(data[0]).ok_or_else(|| {
            TransportError::corrupted(format!("Unknown protocol id 0x{:02x}", data[0]))
        })?;
        if data[1] != PROTOCOL_VERSION {
            return Err(TransportError::corrupted(format!(
                "Unsupported {} protocol version {}",
                protocol, data[1]
            ))
            .into());
        }
        Ok(Some(Codec::new(protocol)))
    }
}

impl From<Protocol> for Codec {
    fn from(protocol: Protocol) -> Self {
        Codec::new(protocol)
    }
}

/// Binary codec backed by `bincode`.
///
/// Integers are fixed width and big-endian; allocations while decoding are
/// capped at [`MAX_MESSAGE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_big_endian()
            .with_limit(MAX_MESSAGE_SIZE as u64)
    }

    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Self::options()
            .serialize(value)
            .map_err(|e| TransportError::corrupted(format!("Binary encode failed: {}", e)).into())
    }

    pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
        Self::options()
            .deserialize(data)
            .map_err(|e| TransportError::corrupted(format!("Binary decode failed: {}", e)).into())
    }

    /// Decode from the front of `data`.
    pub fn decode_prefix<T: DeserializeOwned>(data: &[u8]) -> Result<Prefix<T>> {
        let mut reader = Tracked::new(data);
        match Self::options().deserialize_from(&mut reader) {
            Ok(value) => Ok(Prefix::Complete(value, reader.pos)),
            Err(e) => match *e {
                bincode::ErrorKind::Io(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    Ok(Prefix::Incomplete {
                        needed: reader.needed(),
                    })
                }
                other => Err(TransportError::corrupted(format!(
                    "Binary decode failed: {}",
                    other
                ))
                .into()),
            },
        }
    }
}

/// Compact codec backed by `postcard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactCodec;

impl CompactCodec {
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        postcard::to_allocvec(value)
            .map_err(|e| TransportError::corrupted(format!("Compact encode failed: {}", e)).into())
    }

    pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
        postcard::from_bytes(data)
            .map_err(|e| TransportError::corrupted(format!("Compact decode failed: {}", e)).into())
    }

    /// Decode from the front of `data`.
    pub fn decode_prefix<T: DeserializeOwned>(data: &[u8]) -> Result<Prefix<T>> {
        let mut deserializer = postcard::Deserializer::from_flavor(Tracked::new(data));
        match <T as serde::Deserialize>::deserialize(&mut deserializer) {
            Ok(value) => {
                let used = deserializer.finalize().map_err(|e| {
                    TransportError::corrupted(format!("Compact decode failed: {}", e))
                })?;
                Ok(Prefix::Complete(value, used))
            }
            Err(postcard::Error::DeserializeUnexpectedEnd) => {
                let needed = deserializer
                    .finalize()
                    .map_err(|e| TransportError::corrupted(format!("Compact decode failed: {}", e)))?;
                Ok(Prefix::Incomplete { needed })
            }
            Err(e) => Err(TransportError::corrupted(format!("Compact decode failed: {}", e)).into()),
        }
    }
}

/// Slice source that remembers the furthest byte a decoder asked for.
///
/// When input runs out, that is the least the buffer must hold before the
/// decoder can get any further.
struct Tracked<'a> {
    data: &'a [u8],
    pos: usize,
    wanted: usize,
}

impl<'a> Tracked<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            wanted: 0,
        }
    }

    fn want(&mut self, len: usize) -> usize {
        let end = self.pos.saturating_add(len);
        self.wanted = self.wanted.max(end);
        end
    }

    fn needed(&self) -> usize {
        self.wanted.max(self.data.len() + 1)
    }
}

impl Read for Tracked<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.want(buf.len());
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl<'de> postcard::de_flavors::Flavor<'de> for Tracked<'de> {
    /// Bytes consumed, or on a short buffer the bytes needed
    type Remainder = usize;
    type Source = &'de [u8];

    fn pop(&mut self) -> postcard::Result<u8> {
        let end = self.want(1);
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(postcard::Error::DeserializeUnexpectedEnd)?;
        self.pos = end;
        Ok(byte)
    }

    fn try_take_n(&mut self, ct: usize) -> postcard::Result<&'de [u8]> {
        let end = self.want(ct);
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(postcard::Error::DeserializeUnexpectedEnd)?;
        self.pos = end;
        Ok(bytes)
    }

    fn finalize(self) -> postcard::Result<usize> {
        if self.wanted > self.data.len() {
            Ok(self.needed())
        } else {
            Ok(self.pos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RequestMessage, ResponseMessage};

    #[test]
    fn test_codecs_produce_different_encodings() {
        let value = (300u32, true);
        let binary = Codec::new(Protocol::Binary).encode(&value).unwrap();
        let compact = Codec::new(Protocol::Compact).encode(&value).unwrap();

        // fixed width u32 + bool vs varint u32 + bool
        assert_eq!(binary, vec![0, 0, 1, 44, 1]);
        assert_eq!(compact.len(), 3);
    }

    #[test]
    fn test_message_prefix_selects_codec() {
        for protocol in [Protocol::Binary, Protocol::Compact] {
            let codec = Codec::new(protocol);
            let request = RequestMessage::new(5, "invert", codec.encode(&(false,)).unwrap());
            let payload = codec.encode_message(&request).unwrap();

            assert_eq!(payload[0], protocol.id());
            assert_eq!(payload[1], PROTOCOL_VERSION);

            let (detected, decoded): (Codec, RequestMessage) =
                Codec::decode_message(&payload).unwrap();
            assert_eq!(detected.protocol(), protocol);
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_unknown_protocol_id_is_corrupted_data() {
        let err = Codec::decode_message::<ResponseMessage>(&[0x42, 0x01, 0x00]).unwrap_err();
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::CorruptedData));
    }

    #[test]
    fn test_decode_failure_is_an_error_not_a_default() {
        let codec = Codec::new(Protocol::Compact);
        let err = codec.decode::<(String,)>(&[0x05, b'a']).unwrap_err();
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::CorruptedData));
    }

    #[test]
    fn test_decode_prefix_waits_for_complete_message() {
        for protocol in [Protocol::Binary, Protocol::Compact] {
            let codec = Codec::new(protocol);
            let response = ResponseMessage::success(11, vec![1, 2, 3, 4]);
            let mut stream = codec.encode_message(&response).unwrap();
            let message_len = stream.len();
            stream.extend_from_slice(&codec.encode_message(&response).unwrap());

            for cut in 0..message_len {
                match Codec::decode_message_prefix::<ResponseMessage>(&stream[..cut]).unwrap() {
                    Prefix::Incomplete { needed } => {
                        assert!(needed > cut, "{} at {} bytes needs {}", protocol, cut, needed);
                        assert!(needed <= message_len, "{} at {} bytes needs {}", protocol, cut, needed);
                    }
                    Prefix::Complete(..) => panic!("{} decoded from {} bytes", protocol, cut),
                }
            }

            match Codec::decode_message_prefix::<ResponseMessage>(&stream).unwrap() {
                Prefix::Complete((_, decoded), used) => {
                    assert_eq!(decoded, response);
                    assert_eq!(used, message_len);
                }
                Prefix::Incomplete { needed } => panic!("{} still needs {}", protocol, needed),
            }
        }
    }

    #[test]
    fn test_decode_prefix_needs_whole_payload_once_its_length_is_known() {
        let args = vec![7u8; 64 * 1024];
        for protocol in [Protocol::Binary, Protocol::Compact] {
            let codec = Codec::new(protocol);
            let request = RequestMessage::new(5, "takes_a_list", args.clone());
            let stream = codec.encode_message(&request).unwrap();

            // Past the length of `args`, a single attempt spans the whole message.
            let cut = stream.len() - args.len() + 10;
            assert_eq!(
                Codec::decode_message_prefix::<RequestMessage>(&stream[..cut]).unwrap(),
                Prefix::Incomplete {
                    needed: stream.len()
                },
                "{}",
                protocol
            );
        }
    }

    #[test]
    fn test_byte_fields_keep_sequence_layout() {
        // Byte payloads are written as one string; the bytes on the wire match
        // a plain sequence of u8.
        let response = ResponseMessage::success(1, vec![1, 2, 3]);
        let as_seq = (1u32, 0u32, vec![1u8, 2, 3]);
        assert_eq!(
            BinaryCodec::encode(&response).unwrap(),
            BinaryCodec::encode(&as_seq).unwrap()
        );

        let request = RequestMessage::new(2, "m", vec![9; 300]);
        let as_seq = (2u32, "m".to_string(), vec![9u8; 300]);
        assert_eq!(
            CompactCodec::encode(&request).unwrap(),
            CompactCodec::encode(&as_seq).unwrap()
        );
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("binary".parse::<Protocol>().unwrap(), Protocol::Binary);
        assert_eq!("COMPACT".parse::<Protocol>().unwrap(), Protocol::Compact);
        assert!("json".parse::<Protocol>().is_err());
    }
}
