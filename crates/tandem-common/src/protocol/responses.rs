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

//! Tandem Response Types
//!
//! A reply either carries the encoded return value or an
//! [`ApplicationError`] describing why the handler did not produce one.
//! Transport failures never appear here: they close the connection instead.

use serde::{Deserialize, Serialize};

use super::error::ApplicationError;
use super::SeqId;

/// Outcome of a dispatched call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReplyBody {
    /// Encoded return value
    Success(#[serde(with = "super::payload_bytes")] Vec<u8>),
    /// The handler faulted
    Exception(ApplicationError),
}

/// A reply as it travels on the wire.
///
/// # Example
///
/// ```
/// use tandem_common::protocol::{ApplicationError, ResponseMessage};
///
/// let ok = ResponseMessage::success(7, vec![1]);
/// assert!(ok.is_success());
///
/// let failed = ResponseMessage::exception(7, ApplicationError::unknown_method("nope"));
/// assert!(!failed.is_success());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseMessage {
    /// Sequence id of the request this answers
    pub seq_id: SeqId,
    pub body: ReplyBody,
}

impl ResponseMessage {
    pub fn success(seq_id: SeqId, result: Vec<u8>) -> Self {
        ResponseMessage {
            seq_id,
            body: ReplyBody::Success(result),
        }
    }

    pub fn exception(seq_id: SeqId, error: ApplicationError) -> Self {
        ResponseMessage {
            seq_id,
            body: ReplyBody::Exception(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.body, ReplyBody::Success(_))
    }
}
