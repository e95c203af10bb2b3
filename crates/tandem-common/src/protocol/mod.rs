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

pub mod address;
pub mod error;
pub mod requests;
pub mod responses;


pub use address::{Address, SocketAddress};
pub use error::{
    ApplicationError, ApplicationErrorKind, LookupError, Result, TandemError, TransportError,
    TransportErrorKind,
};
pub use requests::{Headers, RequestMessage, SeqId};
pub use responses::{ReplyBody, ResponseMessage};

/// Serde adapter for encoded payload fields.
///
/// Writes `Vec<u8>` as one byte string (same bytes on the wire as a sequence
/// of `u8` for both codecs) so decoders read it in a single step.
pub(crate) mod payload_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Bytes::deserialize(deserializer).map(Vec::from)
    }
}
