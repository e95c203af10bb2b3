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

//! Tandem Request Types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-call sequence number; correlates a reply with its request.
pub type SeqId = u32;

/// Out-of-band key/value metadata carried alongside a call.
pub type Headers = HashMap<String, String>;

/// A call as it travels on the wire.
///
/// `args` holds the positional argument tuple, already encoded by the
/// connection's codec. The server decodes it once it knows which operation
/// (and therefore which argument types) `method` names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMessage {
    pub seq_id: SeqId,
    pub method: String,
    #[serde(with = "super::payload_bytes")]
    pub args: Vec<u8>,
}

impl RequestMessage {
    pub fn new(seq_id: SeqId, method: impl Into<String>, args: Vec<u8>) -> Self {
        RequestMessage {
            seq_id,
            method: method.into(),
            args,
        }
    }
}
