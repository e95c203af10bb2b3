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

//! # Tandem CLI
//!
//! Library half of the `tandem` binary. The binary serves [`DemoHandler`]
//! behind a `TestingService` processor and can call any `TestingService`
//! endpoint from the command line.
//!
//! ## Key Commands
//!
//! - `tandem serve`: serve the demo service on a TCP port or local socket
//! - `tandem call`: call `invert` or `get_name` and print the result along
//!   with any headers the server sent back

pub mod demo;

pub use demo::DemoHandler;

/// Parse a `key=value` header argument.
///
/// The value may itself contain `=`; only the first one splits.
pub fn parse_header(arg: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid header '{}': expected key=value", arg))?;
    if key.is_empty() {
        anyhow::bail!("Invalid header '{}': empty key", arg);
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("trace=abc").unwrap(),
            ("trace".to_string(), "abc".to_string())
        );
        assert_eq!(
            parse_header("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_header("empty=").unwrap().1, "");
    }

    #[test]
    fn test_parse_header_rejects_malformed() {
        assert!(parse_header("novalue").is_err());
        assert!(parse_header("=value").is_err());
    }
}
