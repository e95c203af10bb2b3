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

// Processor tests for tandem-services
//
// Calls are fed straight into the processors, without a network, to check
// argument decoding and method routing for each contract.

use async_trait::async_trait;
use bytes::Bytes;
use tandem_common::transport::{Codec, Protocol};
use tandem_common::{ApplicationErrorKind, Headers};
use tandem_server::{Call, Dispatch, RequestContext};
use tandem_services::{
    Color, Easy, Simple, StackService, StackServiceProcessor, TestingService,
    TestingServiceProcessor,
};

// ============================================================================
// Test Handlers
// ============================================================================

struct Testing;

#[async_trait]
impl TestingService for Testing {
    async fn get_name(&self) -> anyhow::Result<String> {
        Ok("Testing".to_string())
    }

    async fn invert(&self, ctx: &RequestContext, value: bool) -> anyhow::Result<bool> {
        ctx.set_header("seen", ctx.method_name());
        Ok(!value)
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn complex_action(
        &self,
        _first: String,
        _second: String,
        third: i64,
        _fourth: String,
    ) -> anyhow::Result<i64> {
        Ok(third)
    }

    async fn takes_a_list(&self, _ints: Vec<i32>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn take_it_easy(&self, how: i32, what: Easy) -> anyhow::Result<()> {
        anyhow::ensure!(how == what.val, "how {} != val {}", how, what.val);
        Ok(())
    }

    async fn pick_a_color(&self, color: Color) -> anyhow::Result<()> {
        anyhow::ensure!(color != Color::Green, "no green");
        Ok(())
    }

    async fn int_sizes(&self, one: i8, two: i16, three: i32, four: i64) -> anyhow::Result<()> {
        anyhow::ensure!(one == i8::MIN && two == i16::MAX && three == -1 && four == i64::MAX);
        Ok(())
    }
}

struct Stack;

#[async_trait]
impl StackService for Stack {
    async fn add_to(&self, lst: Vec<i32>, value: i32) -> anyhow::Result<Vec<i32>> {
        Ok(lst.into_iter().map(|x| x + value).collect())
    }

    async fn get_simple(&self) -> anyhow::Result<Simple> {
        Ok(Simple { val: 66 })
    }

    async fn take_simple(&self, smpl: Simple) -> anyhow::Result<()> {
        anyhow::ensure!(smpl.val == 10, "WRONG");
        Ok(())
    }

    async fn get_iobuf(&self) -> anyhow::Result<Bytes> {
        Ok(Bytes::from_static(b"abc"))
    }

    async fn take_iobuf(&self, iobuf: Bytes) -> anyhow::Result<()> {
        anyhow::ensure!(iobuf == "cba", "WRONG");
        Ok(())
    }

    async fn take_iobuf_ptr(&self, iobuf_ptr: Bytes) -> anyhow::Result<()> {
        anyhow::ensure!(iobuf_ptr == "zyx", "WRONG");
        Ok(())
    }
}

fn call<A: serde::Serialize>(protocol: Protocol, method: &str, args: &A) -> (Call, RequestContext) {
    let codec = Codec::new(protocol);
    let context = RequestContext::new(method, Headers::new(), None);
    let call = Call::new(method, codec.encode(args).unwrap(), codec, context.clone());
    (call, context)
}

async fn invoke<P, A, R>(processor: &P, protocol: Protocol, method: &str, args: &A) -> R
where
    P: Dispatch,
    A: serde::Serialize,
    R: serde::de::DeserializeOwned,
{
    let (call, _) = call(protocol, method, args);
    let bytes = processor.dispatch(call).await.unwrap();
    Codec::new(protocol).decode(&bytes).unwrap()
}

// ============================================================================
// TestingService
// ============================================================================

#[tokio::test]
async fn test_testing_service_routes_every_method() {
    let processor = TestingServiceProcessor::new(Testing);
    for protocol in [Protocol::Binary, Protocol::Compact] {
        let name: String = invoke(&processor, protocol, "get_name", &()).await;
        assert_eq!(name, "Testing");

        let third: i64 = invoke(
            &processor,
            protocol,
            "complex_action",
            &("a".to_string(), "b".to_string(), 42i64, "d".to_string()),
        )
        .await;
        assert_eq!(third, 42);

        let () = invoke(&processor, protocol, "takes_a_list", &(vec![1, 2, 3],)).await;
        let () = invoke(&processor, protocol, "pick_a_color", &(Color::Blue,)).await;
        let () = invoke(
            &processor,
            protocol,
            "int_sizes",
            &(i8::MIN, i16::MAX, -1i32, i64::MAX),
        )
        .await;
        let easy = Easy {
            val: 5,
            val_list: vec![1],
            name: Some("easy".to_string()),
        };
        let () = invoke(&processor, protocol, "take_it_easy", &(5i32, easy)).await;
        let () = invoke(&processor, protocol, "shutdown", &()).await;
    }
}

#[tokio::test]
async fn test_invert_gets_explicit_context() {
    let processor = TestingServiceProcessor::new(Testing);
    let (call, context) = call(Protocol::Compact, "invert", &(true,));

    let bytes = processor.dispatch(call).await.unwrap();
    let inverted: bool = Codec::new(Protocol::Compact).decode(&bytes).unwrap();

    assert!(!inverted);
    assert_eq!(context.write_headers().get("seen").map(String::as_str), Some("invert"));
}

#[tokio::test]
async fn test_handler_error_and_bad_arguments() {
    let processor = TestingServiceProcessor::new(Testing);

    let (call_green, _) = call(Protocol::Binary, "pick_a_color", &(Color::Green,));
    let err = processor.dispatch(call_green).await.unwrap_err();
    assert_eq!(err.kind, ApplicationErrorKind::Unknown);
    assert_eq!(err.message, "no green");

    let (wrong_args, _) = call(Protocol::Compact, "invert", &("not a bool",));
    let err = processor.dispatch(wrong_args).await.unwrap_err();
    assert_eq!(err.kind, ApplicationErrorKind::ProtocolError);

    let (unknown, _) = call(Protocol::Binary, "getName", &());
    let err = processor.dispatch(unknown).await.unwrap_err();
    assert_eq!(err.kind, ApplicationErrorKind::UnknownMethod);
}

// ============================================================================
// StackService
// ============================================================================

#[tokio::test]
async fn test_stack_service_structs_and_buffers() {
    let processor = StackServiceProcessor::new(Stack);
    for protocol in [Protocol::Binary, Protocol::Compact] {
        let added: Vec<i32> = invoke(&processor, protocol, "add_to", &(vec![1, 2, 3, 4], 2)).await;
        assert_eq!(added, vec![3, 4, 5, 6]);

        let simple: Simple = invoke(&processor, protocol, "get_simple", &()).await;
        assert_eq!(simple.val, 66);

        let buf: Bytes = invoke(&processor, protocol, "get_iobuf", &()).await;
        assert_eq!(buf, "abc");

        let () = invoke(&processor, protocol, "take_simple", &(Simple { val: 10 },)).await;
        let () = invoke(&processor, protocol, "take_iobuf", &(Bytes::from_static(b"cba"),)).await;
        let () = invoke(&processor, protocol, "take_iobuf_ptr", &(Bytes::from_static(b"zyx"),)).await;
    }
}

#[tokio::test]
async fn test_stack_service_rejects_wrong_values() {
    let processor = StackServiceProcessor::new(Stack);
    let (wrong, _) = call(Protocol::Compact, "take_simple", &(Simple { val: 11 },));
    let err = processor.dispatch(wrong).await.unwrap_err();
    assert_eq!(err.kind, ApplicationErrorKind::Unknown);
    assert_eq!(err.message, "WRONG");
}
