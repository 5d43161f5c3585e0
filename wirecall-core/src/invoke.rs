//! # RPC Invoker
//!
//! Dispatches a dynamic call to the right one of the four streaming shapes,
//! chosen by the method's two streaming flags:
//!
//! 1. **Unary** — encode one request, invoke, decode one response.
//! 2. **Client-streaming** — the input is an array; send each element, close
//!    the send side, read exactly one response.
//! 3. **Server-streaming** — send one request, read responses until stream
//!    end, collect.
//! 4. **Bidirectional** — array in, all sent, responses collected until end.
//!
//! All four return only after the call fully completes; streamed responses
//! are collected, never delivered incrementally. Dropping the returned
//! future cancels the call — send loop and receive loop both run inside it,
//! so an abandoned call leaks neither a connection nor a receive loop.
use crate::BoxError;
use crate::conn::HeaderSet;
use crate::grpc::client::{GrpcClient, TransportError};
use futures_util::Stream;
use http_body::Body as HttpBody;
use prost_reflect::{DescriptorPool, MethodDescriptor};
use tokio_stream::StreamExt;
use tonic::transport::Channel;

/// Everything needed to perform one dynamic call.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Package-qualified service name, e.g. `echo.EchoService`.
    pub service: String,
    pub method: String,
    /// JSON body: an object for unary/server-streaming, an array of objects
    /// for client-streaming/bidirectional.
    pub body: serde_json::Value,
    /// Per-call headers, merged over the invoker's profile defaults before
    /// the request is issued (see [`HeaderSet::merged_with`]).
    pub headers: HeaderSet,
}

/// The result of a completed call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallReply {
    /// Unary and client-streaming shapes.
    Unary(serde_json::Value),
    /// Server-streaming and bidirectional shapes, in emission order.
    Stream(Vec<serde_json::Value>),
}

/// Call failures, distinguishable by origin: schema lookup, input shape,
/// transport, or a status the server returned. One failed call leaves the
/// connection usable; nothing is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("service '{0}' not found in the resolved schema")]
    ServiceNotFound(String),
    #[error("method '{method}' not found on service '{service}'")]
    MethodNotFound { service: String, method: String },
    #[error("invalid request body: {0}")]
    InvalidInput(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("rpc failed: {0}")]
    Rpc(tonic::Status),
}

/// Dispatches dynamic calls over a generic tonic transport.
///
/// Carries the profile's default headers; every call merges its own headers
/// over them, so a configured default (say, an authorization token) reaches
/// the server even when the caller passes none.
pub struct Invoker<S = Channel> {
    grpc: GrpcClient<S>,
    default_headers: HeaderSet,
}

impl<S> Invoker<S>
where
    S: tonic::client::GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self::with_default_headers(service, HeaderSet::new())
    }

    pub fn with_default_headers(service: S, default_headers: HeaderSet) -> Self {
        Self {
            grpc: GrpcClient::new(service),
            default_headers,
        }
    }

    /// Looks up the method named by the request in the pool.
    pub fn method_descriptor(
        pool: &DescriptorPool,
        service: &str,
        method: &str,
    ) -> Result<MethodDescriptor, CallError> {
        pool.get_service_by_name(service)
            .ok_or_else(|| CallError::ServiceNotFound(service.to_string()))?
            .methods()
            .find(|m| m.name() == method)
            .ok_or_else(|| CallError::MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })
    }

    /// Performs the call, blocking the task until it fully completes.
    pub async fn call(
        &mut self,
        pool: &DescriptorPool,
        request: CallRequest,
    ) -> Result<CallReply, CallError> {
        let method = Self::method_descriptor(pool, &request.service, &request.method)?;
        let headers = self.default_headers.merged_with(&request.headers);

        match (method.is_client_streaming(), method.is_server_streaming()) {
            (false, false) => {
                let value = self
                    .grpc
                    .unary(method, request.body, &headers)
                    .await?
                    .map_err(CallError::Rpc)?;
                Ok(CallReply::Unary(value))
            }
            (false, true) => {
                let stream = self
                    .grpc
                    .server_streaming(method, request.body, &headers)
                    .await?
                    .map_err(CallError::Rpc)?;
                Ok(CallReply::Stream(collect(stream).await?))
            }
            (true, false) => {
                let messages = into_message_stream(request.body)?;
                let value = self
                    .grpc
                    .client_streaming(method, messages, &headers)
                    .await?
                    .map_err(CallError::Rpc)?;
                Ok(CallReply::Unary(value))
            }
            (true, true) => {
                let messages = into_message_stream(request.body)?;
                let stream = self
                    .grpc
                    .bidirectional_streaming(method, messages, &headers)
                    .await?
                    .map_err(CallError::Rpc)?;
                Ok(CallReply::Stream(collect(stream).await?))
            }
        }
    }
}

/// Reads a response stream until end, failing on the first error status.
async fn collect(
    stream: impl Stream<Item = Result<serde_json::Value, tonic::Status>>,
) -> Result<Vec<serde_json::Value>, CallError> {
    let mut collected = Vec::new();
    let mut stream = std::pin::pin!(stream);
    while let Some(item) = stream.next().await {
        collected.push(item.map_err(CallError::Rpc)?);
    }
    Ok(collected)
}

/// Call shapes that send multiple requests take the outer input as an array
/// of independently decoded messages.
fn into_message_stream(
    body: serde_json::Value,
) -> Result<impl Stream<Item = serde_json::Value> + Send + 'static, CallError> {
    match body {
        serde_json::Value::Array(items) => Ok(tokio_stream::iter(items)),
        _ => Err(CallError::InvalidInput(
            "streaming requests take a JSON array of request messages".to_string(),
        )),
    }
}
