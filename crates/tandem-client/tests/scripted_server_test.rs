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

//! Client tests against scripted servers
//!
//! Each test stands up a hand-written peer that reads requests with the
//! shared frame reader and answers exactly as the test scripts it: out of
//! order, never, with a stray sequence id, with an exception, or by hanging
//! up. This pins down client behavior that a well-behaved server never
//! triggers.

use std::future::Future;
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;

use tandem_client::{Client, ClientConfig, RpcOptions};
use tandem_common::transport::{
    encode_frame, write_frame, ClientType, Codec, FrameReader, Framing, HttpTransport,
    HyperResponse, MAX_MESSAGE_SIZE,
};
use tandem_common::{
    Address, ApplicationError, ApplicationErrorKind, Headers, RequestMessage, ResponseMessage,
    TandemError, TransportErrorKind,
};

// ============================================================================
// Test Helpers
// ============================================================================

type Reader = FrameReader<OwnedReadHalf>;

/// Accepts one connection and hands it to `script`.
async fn scripted_server<F, Fut>(script: F) -> Address
where
    F: FnOnce(Reader, OwnedWriteHalf) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        script(FrameReader::new(read_half, MAX_MESSAGE_SIZE), write_half).await;
    });
    addr.into()
}

async fn read_request(reader: &mut Reader, framing: Framing) -> (Codec, RequestMessage, Headers) {
    reader
        .read_message::<RequestMessage>(framing)
        .await
        .unwrap()
        .unwrap()
}

async fn send_response(
    writer: &mut OwnedWriteHalf,
    framing: Framing,
    codec: Codec,
    response: &ResponseMessage,
    headers: &Headers,
) {
    let payload = codec.encode_message(response).unwrap();
    let frame = encode_frame(framing, &payload, headers, MAX_MESSAGE_SIZE).unwrap();
    write_frame(writer, &frame).await.unwrap();
}

/// Replies `arg * 10` to a `(i32,)` request.
fn times_ten(codec: Codec, request: &RequestMessage) -> ResponseMessage {
    let (value,): (i32,) = codec.decode(&request.args).unwrap();
    ResponseMessage::success(request.seq_id, codec.encode(&(value * 10)).unwrap())
}

/// Holds the connection open until the client goes away.
async fn linger(reader: &mut Reader, framing: Framing) {
    while let Ok(Some(_)) = reader.read_message::<RequestMessage>(framing).await {}
}

/// Serves every HTTP request on every connection with `handler`.
async fn http_server<F>(handler: F) -> Address
where
    F: Fn(Codec, RequestMessage, Headers) -> HyperResponse + Clone + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = handler.clone();
                    async move {
                        let headers = HttpTransport::decode_header_block(req.headers()).unwrap();
                        let body = req.into_body().collect().await?.to_bytes();
                        let (codec, request) =
                            Codec::decode_message::<RequestMessage>(&body).unwrap();
                        Ok::<_, hyper::Error>(handler(codec, request, headers))
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr.into()
}

// ============================================================================
// Framed transports
// ============================================================================

#[tokio::test]
async fn test_pipelined_calls_match_replies_by_seq_id() {
    let addr = scripted_server(|mut reader, mut writer| async move {
        let first = read_request(&mut reader, Framing::Header).await;
        let second = read_request(&mut reader, Framing::Header).await;
        for (codec, request, _) in [second, first] {
            let response = times_ten(codec, &request);
            send_response(&mut writer, Framing::Header, codec, &response, &Headers::new()).await;
        }
        linger(&mut reader, Framing::Header).await;
    })
    .await;

    let client = Client::new(ClientConfig::new(addr));
    client.open().await.unwrap();
    let mut first_options = RpcOptions::new();
    let mut second_options = RpcOptions::new();
    let (first, second) = tokio::join!(
        client.invoke::<_, i32>("times_ten", &(1,), &mut first_options),
        client.invoke::<_, i32>("times_ten", &(2,), &mut second_options),
    );

    assert_eq!(first.unwrap(), 10);
    assert_eq!(second.unwrap(), 20);
    client.close().await;
}

#[tokio::test]
async fn test_every_framed_type_speaks_its_framing() {
    let cases = [
        (ClientType::UnframedLegacy, Framing::Unframed),
        (ClientType::FramedLegacy, Framing::Framed),
        (ClientType::FramedCompact, Framing::Header),
    ];
    for (client_type, framing) in cases {
        let addr = scripted_server(move |mut reader, mut writer| async move {
            let (codec, request, _) = read_request(&mut reader, framing).await;
            assert_eq!(codec.protocol(), client_type.default_protocol());
            let response = times_ten(codec, &request);
            send_response(&mut writer, framing, codec, &response, &Headers::new()).await;
            linger(&mut reader, framing).await;
        })
        .await;

        let client = Client::new(ClientConfig::new(addr).with_client_type(client_type));
        let value: i32 = client
            .invoke("times_ten", &(7,), &mut RpcOptions::new())
            .await
            .unwrap();
        assert_eq!(value, 70, "{}", client_type);
        client.close().await;
    }
}

#[tokio::test]
async fn test_reply_headers_are_read_back() {
    let addr = scripted_server(|mut reader, mut writer| async move {
        let (codec, request, mut headers) = read_request(&mut reader, Framing::Header).await;
        headers.insert("served-by".to_string(), "script".to_string());
        let response = times_ten(codec, &request);
        send_response(&mut writer, Framing::Header, codec, &response, &headers).await;
        linger(&mut reader, Framing::Header).await;
    })
    .await;

    let client = Client::new(ClientConfig::new(addr));
    let mut options = RpcOptions::new();
    options.set_header("trace", "t-1");
    let value: i32 = client.invoke("times_ten", &(3,), &mut options).await.unwrap();

    assert_eq!(value, 30);
    assert_eq!(options.read_header("trace"), Some("t-1"));
    assert_eq!(options.read_header("served-by"), Some("script"));
    assert_eq!(options.read_headers().len(), 2);
}

#[tokio::test]
async fn test_reply_for_unknown_seq_id_is_skipped() {
    let addr = scripted_server(|mut reader, mut writer| async move {
        let (codec, request, _) = read_request(&mut reader, Framing::Header).await;
        let mut stray = times_ten(codec, &request);
        stray.seq_id = request.seq_id.wrapping_add(1000);
        send_response(&mut writer, Framing::Header, codec, &stray, &Headers::new()).await;
        let response = times_ten(codec, &request);
        send_response(&mut writer, Framing::Header, codec, &response, &Headers::new()).await;
        linger(&mut reader, Framing::Header).await;
    })
    .await;

    let client = Client::new(ClientConfig::new(addr));
    let value: i32 = client
        .invoke("times_ten", &(4,), &mut RpcOptions::new())
        .await
        .unwrap();
    assert_eq!(value, 40);
}

#[tokio::test]
async fn test_exception_reply_is_an_application_error() {
    let addr = scripted_server(|mut reader, mut writer| async move {
        for _ in 0..2 {
            let (codec, request, _) = read_request(&mut reader, Framing::Header).await;
            let response = if request.method == "fail" {
                ResponseMessage::exception(
                    request.seq_id,
                    ApplicationError::new(ApplicationErrorKind::WrongMethodName, "scripted failure"),
                )
            } else {
                times_ten(codec, &request)
            };
            send_response(&mut writer, Framing::Header, codec, &response, &Headers::new()).await;
        }
        linger(&mut reader, Framing::Header).await;
    })
    .await;

    let client = Client::new(ClientConfig::new(addr));
    let err = client
        .invoke::<_, i32>("fail", &(1,), &mut RpcOptions::new())
        .await
        .unwrap_err();
    match err {
        TandemError::Application(e) => {
            assert_eq!(e.kind, ApplicationErrorKind::WrongMethodName);
            assert_eq!(e.message, "scripted failure");
        }
        other => panic!("expected an application error, got {:?}", other),
    }

    // the connection survives an application error
    let value: i32 = client
        .invoke("times_ten", &(5,), &mut RpcOptions::new())
        .await
        .unwrap();
    assert_eq!(value, 50);
}

#[tokio::test]
async fn test_undecodable_result_is_not_a_default_value() {
    let addr = scripted_server(|mut reader, mut writer| async move {
        let (codec, request, _) = read_request(&mut reader, Framing::Header).await;
        let response = ResponseMessage::success(request.seq_id, Vec::new());
        send_response(&mut writer, Framing::Header, codec, &response, &Headers::new()).await;
        linger(&mut reader, Framing::Header).await;
    })
    .await;

    let client = Client::new(ClientConfig::new(addr));
    let err = client
        .invoke::<_, i32>("times_ten", &(1,), &mut RpcOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_call_times_out_without_a_reply() {
    let addr = scripted_server(|mut reader, writer| async move {
        let _ = read_request(&mut reader, Framing::Header).await;
        linger(&mut reader, Framing::Header).await;
        drop(writer);
    })
    .await;

    let client = Client::new(ClientConfig::new(addr));
    let mut options = RpcOptions::new().with_timeout(Duration::from_millis(100));
    let err = client
        .invoke::<_, i32>("times_ten", &(1,), &mut options)
        .await
        .unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::TimedOut));
}

#[tokio::test]
async fn test_hang_up_fails_the_pending_call() {
    let addr = scripted_server(|mut reader, writer| async move {
        let _ = read_request(&mut reader, Framing::Header).await;
        drop(writer);
        drop(reader);
    })
    .await;

    let client = Client::new(ClientConfig::new(addr));
    let err = client
        .invoke::<_, i32>("times_ten", &(1,), &mut RpcOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::EndOfFile));
}

// ============================================================================
// HTTP transport
// ============================================================================

#[tokio::test]
async fn test_http_calls_and_headers() {
    let addr = http_server(|codec, request, mut headers| {
        headers.insert("method".to_string(), request.method.clone());
        let payload = codec.encode_message(&times_ten(codec, &request)).unwrap();
        HttpTransport::build_response(payload, &headers).unwrap()
    })
    .await;

    let client = Client::new(ClientConfig::new(addr).with_client_type(ClientType::Http));
    let mut options = RpcOptions::new();
    options.set_header("trace", "h-1");
    let value: i32 = client.invoke("times_ten", &(6,), &mut options).await.unwrap();
    assert_eq!(value, 60);
    assert_eq!(options.read_header("trace"), Some("h-1"));
    assert_eq!(options.read_header("method"), Some("times_ten"));

    let mut first_options = RpcOptions::new();
    let mut second_options = RpcOptions::new();
    let (first, second) = tokio::join!(
        client.invoke::<_, i32>("times_ten", &(8,), &mut first_options),
        client.invoke::<_, i32>("times_ten", &(9,), &mut second_options),
    );
    assert_eq!(first.unwrap(), 80);
    assert_eq!(second.unwrap(), 90);
    client.close().await;
}

#[tokio::test]
async fn test_http_error_status_is_a_transport_error() {
    let addr = http_server(|_, _, _| {
        HttpTransport::error_response(StatusCode::INTERNAL_SERVER_ERROR, "boom")
    })
    .await;

    let client = Client::new(ClientConfig::new(addr).with_client_type(ClientType::Http));
    let err = client
        .invoke::<_, i32>("times_ten", &(1,), &mut RpcOptions::new())
        .await
        .unwrap_err();
    match err {
        TandemError::Transport(e) => {
            assert_eq!(e.kind, TransportErrorKind::CorruptedData);
            assert!(e.message.contains("boom"), "{}", e.message);
        }
        other => panic!("expected a transport error, got {:?}", other),
    }
}
