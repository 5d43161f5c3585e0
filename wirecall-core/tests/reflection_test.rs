use echo_service::{EchoServiceServer, FILE_DESCRIPTOR_SET};
use echo_service_impl::EchoServiceImpl;
use tonic::Code;
use tonic_reflection::server::v1::ServerReflectionServer;
use wirecall_core::model::FieldKind;
use wirecall_core::reflection::client::{ReflectionClient, ReflectionError};


fn setup_reflection_client()
-> ReflectionClient<ServerReflectionServer<impl tonic_reflection::server::v1::ServerReflection>> {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .expect("Failed to setup Reflection Service");

    ReflectionClient::new(reflection_service)
}

#[tokio::test]
async fn list_services_excludes_the_reflection_service() {
    let mut client = setup_reflection_client();

    let services = client.list_services().await.unwrap();

    assert_eq!(services, vec!["echo.EchoService".to_string()]);
}

#[tokio::test]
async fn service_schema_resolves_methods_and_dependencies() {
    let mut client = setup_reflection_client();

    let service = client.service_schema("echo.EchoService").await.unwrap();

    assert_eq!(service.name, "echo.EchoService");
    assert_eq!(service.methods.len(), 4);

    let unary = service.method("UnaryEcho").unwrap();
    assert!(!unary.client_streaming);
    assert!(!unary.server_streaming);
    assert_eq!(unary.input.name, "echo.EchoRequest");
    assert_eq!(unary.output.name, "echo.EchoResponse");

    let client_streaming = service.method("ClientStreamingEcho").unwrap();
    assert!(client_streaming.client_streaming);
    assert!(!client_streaming.server_streaming);

    let server_streaming = service.method("ServerStreamingEcho").unwrap();
    assert!(!server_streaming.client_streaming);
    assert!(server_streaming.server_streaming);

    let bidirectional = service.method("BidirectionalEcho").unwrap();
    assert!(bidirectional.client_streaming);
    assert!(bidirectional.server_streaming);

    // The deadline field type lives in an imported file; resolving its
    // schema proves dependencies were fetched over the same stream.
    let deadline = unary
        .input
        .fields
        .iter()
        .find(|f| f.name == "deadline")
        .unwrap();
    assert_eq!(
        deadline.kind,
        FieldKind::WellKnown {
            name: "google.protobuf.Timestamp".to_string(),
        }
    );
}

#[tokio::test]
async fn schema_resolves_every_listed_service() {
    let mut client = setup_reflection_client();

    let schema = client.schema().await.unwrap();

    assert_eq!(schema.services.len(), 1);
    assert!(schema.service("echo.EchoService").is_some());
}

#[tokio::test]
async fn unknown_symbol_surfaces_the_server_status() {
    let mut client = setup_reflection_client();

    let result = client
        .file_descriptor_set_by_symbol("non.existent.Service")
        .await;

    assert!(matches!(
        result,
        Err(ReflectionError::StreamFailure(status)) if status.code() == Code::NotFound
    ));
}

#[tokio::test]
async fn server_without_reflection_fails_stream_init() {
    // This server only hosts the EchoService; the reflection service is not
    // registered, so opening the info stream must fail with UNIMPLEMENTED.
    let server = EchoServiceServer::new(EchoServiceImpl);
    let mut client = ReflectionClient::new(server);

    let result = client.file_descriptor_set_by_symbol("echo.EchoService").await;

    match result {
        Err(ReflectionError::StreamInitFailed(status)) => {
            assert_eq!(status.code(), Code::Unimplemented);
        }
        Err(e) => panic!("expected StreamInitFailed(Unimplemented), got: {e:?}"),
        Ok(_) => panic!("expected error, but the descriptor set resolved"),
    }
}
