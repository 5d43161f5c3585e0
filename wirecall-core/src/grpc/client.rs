//! A generic gRPC client, agnostic to the messages being exchanged.
//!
//! [`GrpcClient`] wraps `tonic::client::Grpc` and supplies the
//! [`JsonCodec`], constructing the HTTP/2 path from the method descriptor at
//! call time. One access method per streaming shape; each returns a nested
//! result separating transport failures ([`TransportError`]) from RPC-level
//! failures (`tonic::Status`) — the surrounding call succeeded but the
//! server answered with an error status.
use super::codec::JsonCodec;
use crate::BoxError;
use crate::conn::HeaderSet;
use futures_util::Stream;
use http_body::Body as HttpBody;
use prost_reflect::MethodDescriptor;
use std::str::FromStr;
use tonic::{
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("the underlying service was not ready: '{0}'")]
    NotReady(#[source] BoxError),
    #[error("invalid header key '{key}': '{source}'")]
    InvalidHeaderKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("invalid header value for '{key}': '{source}'")]
    InvalidHeaderValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// A dynamic gRPC client over any tonic-compatible transport.
pub struct GrpcClient<S = Channel> {
    inner: tonic::client::Grpc<S>,
}

impl<S: Clone> Clone for GrpcClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            inner: tonic::client::Grpc::new(service),
        }
    }

    /// Unary: one request, one response.
    pub async fn unary(
        &mut self,
        method: MethodDescriptor,
        payload: serde_json::Value,
        headers: &HeaderSet,
    ) -> Result<Result<serde_json::Value, tonic::Status>, TransportError> {
        self.ready().await?;
        let codec = JsonCodec::new(method.input(), method.output());
        let path = http_path(&method);
        let request = build_request(payload, headers)?;

        match self.inner.unary(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Server streaming: one request, a stream of responses read until end.
    pub async fn server_streaming(
        &mut self,
        method: MethodDescriptor,
        payload: serde_json::Value,
        headers: &HeaderSet,
    ) -> Result<
        Result<impl Stream<Item = Result<serde_json::Value, tonic::Status>>, tonic::Status>,
        TransportError,
    > {
        self.ready().await?;
        let codec = JsonCodec::new(method.input(), method.output());
        let path = http_path(&method);
        let request = build_request(payload, headers)?;

        match self.inner.server_streaming(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Client streaming: a stream of requests, then exactly one response.
    pub async fn client_streaming(
        &mut self,
        method: MethodDescriptor,
        payloads: impl Stream<Item = serde_json::Value> + Send + 'static,
        headers: &HeaderSet,
    ) -> Result<Result<serde_json::Value, tonic::Status>, TransportError> {
        self.ready().await?;
        let codec = JsonCodec::new(method.input(), method.output());
        let path = http_path(&method);
        let request = build_request(payloads, headers)?;

        match self.inner.client_streaming(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Bidirectional streaming: all requests sent, responses read until end.
    pub async fn bidirectional_streaming(
        &mut self,
        method: MethodDescriptor,
        payloads: impl Stream<Item = serde_json::Value> + Send + 'static,
        headers: &HeaderSet,
    ) -> Result<
        Result<impl Stream<Item = Result<serde_json::Value, tonic::Status>>, tonic::Status>,
        TransportError,
    > {
        self.ready().await?;
        let codec = JsonCodec::new(method.input(), method.output());
        let path = http_path(&method);
        let request = build_request(payloads, headers)?;

        match self.inner.streaming(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    async fn ready(&mut self) -> Result<(), TransportError> {
        self.inner
            .ready()
            .await
            .map_err(|e| TransportError::NotReady(e.into()))
    }
}

/// Constructs the `/package.Service/Method` path at run time.
fn http_path(method: &MethodDescriptor) -> http::uri::PathAndQuery {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path).expect("descriptor names form a valid gRPC path")
}

fn build_request<T>(payload: T, headers: &HeaderSet) -> Result<tonic::Request<T>, TransportError> {
    let mut request = tonic::Request::new(payload);
    for (key, value) in headers.iter() {
        let parsed_key =
            MetadataKey::from_str(key).map_err(|source| TransportError::InvalidHeaderKey {
                key: key.clone(),
                source,
            })?;
        let parsed_value =
            MetadataValue::from_str(value).map_err(|source| TransportError::InvalidHeaderValue {
                key: key.clone(),
                source,
            })?;
        request.metadata_mut().insert(parsed_key, parsed_value);
    }
    Ok(request)
}
