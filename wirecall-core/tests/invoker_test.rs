use echo_service::EchoServiceServer;
use echo_service::FILE_DESCRIPTOR_SET;
use echo_service::pb::{EchoRequest, EchoResponse};
use echo_service_impl::EchoServiceImpl;
use prost_reflect::DescriptorPool;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use wirecall_core::conn::HeaderSet;
use wirecall_core::invoke::{CallError, CallReply, CallRequest, Invoker};


fn echo_pool() -> DescriptorPool {
    DescriptorPool::decode(FILE_DESCRIPTOR_SET).unwrap()
}

fn echo_call(method: &str, body: serde_json::Value) -> CallRequest {
    CallRequest {
        service: "echo.EchoService".to_string(),
        method: method.to_string(),
        body,
        headers: Default::default(),
    }
}

#[tokio::test]
async fn unary_call_round_trips_the_payload() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let payload = serde_json::json!({ "message": "hello" });
    let reply = invoker
        .call(&pool, echo_call("UnaryEcho", payload.clone()))
        .await
        .unwrap();

    match reply {
        CallReply::Unary(value) => assert_eq!(value, payload),
        _ => panic!("received stream reply for unary call"),
    }
}

#[tokio::test]
async fn unary_call_accepts_64_bit_sequence_as_string() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let payload = serde_json::json!({ "message": "hello", "sequence": "42" });
    let reply = invoker
        .call(&pool, echo_call("UnaryEcho", payload))
        .await
        .unwrap();

    match reply {
        CallReply::Unary(value) => {
            assert_eq!(value["message"], "hello");
            assert_eq!(value["sequence"], 42);
        }
        _ => panic!("received stream reply for unary call"),
    }
}

#[tokio::test]
async fn server_streaming_collects_in_emission_order() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let payload = serde_json::json!({ "message": "stream" });
    let reply = invoker
        .call(&pool, echo_call("ServerStreamingEcho", payload))
        .await
        .unwrap();

    match reply {
        CallReply::Stream(items) => {
            assert_eq!(items.len(), 3);
            assert_eq!(items[0]["message"], "stream - seq 0");
            assert_eq!(items[1]["message"], "stream - seq 1");
            assert_eq!(items[2]["message"], "stream - seq 2");
        }
        _ => panic!("received unary reply for server streaming call"),
    }
}

#[tokio::test]
async fn client_streaming_sends_every_array_element() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let payload = serde_json::json!([
        { "message": "A" },
        { "message": "B" },
        { "message": "C" }
    ]);
    let reply = invoker
        .call(&pool, echo_call("ClientStreamingEcho", payload))
        .await
        .unwrap();

    match reply {
        CallReply::Unary(value) => {
            assert_eq!(value["message"], "ABC");
            assert_eq!(value["sequence"], 3);
        }
        _ => panic!("received stream reply for client streaming call"),
    }
}

#[tokio::test]
async fn bidirectional_streaming_collects_all_responses() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let payload = serde_json::json!([
        { "message": "Ping" },
        { "message": "Pong" }
    ]);
    let reply = invoker
        .call(&pool, echo_call("BidirectionalEcho", payload))
        .await
        .unwrap();

    match reply {
        CallReply::Stream(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0]["message"], "echo: Ping");
            assert_eq!(items[1]["message"], "echo: Pong");
        }
        _ => panic!("received unary reply for bidirectional call"),
    }
}

/// Unary-only echo that answers with the request metadata it saw, so tests
/// can observe which headers actually reached the server.
struct HeaderEcho;

#[tonic::async_trait]
impl echo_service::EchoService for HeaderEcho {
    type ServerStreamingEchoStream = ReceiverStream<Result<EchoResponse, Status>>;
    type BidirectionalEchoStream = ReceiverStream<Result<EchoResponse, Status>>;

    async fn unary_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        let seen: Vec<String> = ["authorization", "x-env"]
            .iter()
            .filter_map(|key| request.metadata().get(*key))
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        Ok(Response::new(EchoResponse {
            message: seen.join(","),
            sequence: 0,
        }))
    }

    async fn server_streaming_echo(
        &self,
        _request: Request<EchoRequest>,
    ) -> Result<Response<Self::ServerStreamingEchoStream>, Status> {
        Err(Status::unimplemented("not under test"))
    }

    async fn client_streaming_echo(
        &self,
        _request: Request<Streaming<EchoRequest>>,
    ) -> Result<Response<EchoResponse>, Status> {
        Err(Status::unimplemented("not under test"))
    }

    async fn bidirectional_echo(
        &self,
        _request: Request<Streaming<EchoRequest>>,
    ) -> Result<Response<Self::BidirectionalEchoStream>, Status> {
        Err(Status::unimplemented("not under test"))
    }
}

#[tokio::test]
async fn profile_default_headers_reach_the_server_merged_with_overrides() {
    let pool = echo_pool();

    let mut defaults = HeaderSet::new();
    defaults.push("authorization", "Bearer abc");
    defaults.push("x-env", "staging");
    let mut invoker =
        Invoker::with_default_headers(EchoServiceServer::new(HeaderEcho), defaults);

    let mut request = echo_call("UnaryEcho", serde_json::json!({}));
    request.headers.push("x-env", "prod");

    let reply = invoker.call(&pool, request).await.unwrap();

    match reply {
        // The default survives alongside the override; the override wins
        // its own key.
        CallReply::Unary(value) => assert_eq!(value["message"], "Bearer abc,prod"),
        _ => panic!("received stream reply for unary call"),
    }
}

#[tokio::test]
async fn unknown_service_is_a_lookup_error() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let mut request = echo_call("UnaryEcho", serde_json::json!({}));
    request.service = "echo.NoSuchService".to_string();

    let err = invoker.call(&pool, request).await.unwrap_err();
    assert!(matches!(err, CallError::ServiceNotFound(_)));
}

#[tokio::test]
async fn unknown_method_is_a_lookup_error() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let err = invoker
        .call(&pool, echo_call("NoSuchMethod", serde_json::json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::MethodNotFound { .. }));
}

#[tokio::test]
async fn streaming_call_rejects_non_array_body() {
    let pool = echo_pool();
    let mut invoker = Invoker::new(EchoServiceServer::new(EchoServiceImpl));

    let err = invoker
        .call(
            &pool,
            echo_call("ClientStreamingEcho", serde_json::json!({ "message": "A" })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::InvalidInput(_)));
}
