//! # Reflection Client
//!
//! A client for the gRPC Server Reflection Protocol (`grpc.reflection.v1`).
//!
//! It builds complete `FileDescriptorSet`s by querying the server: ask for
//! the file containing a symbol, inspect that file's imports, and keep
//! requesting missing dependencies over the same stream until the schema
//! tree for the symbol is fully resolved.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use crate::model::{Schema, Service, builder};
use crate::resolver::well_known::WellKnownRegistry;
use futures_util::stream::once;
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::{Streaming, client::GrpcService};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error(
        "failed to start a stream to the reflection server, reflection might not be supported: '{0}'"
    )]
    StreamInitFailed(#[source] tonic::Status),

    #[error("the reflection stream returned an error status: '{0}'")]
    StreamFailure(#[source] tonic::Status),

    #[error("reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("internal error: failed to send request to the reflection stream")]
    SendFailed,

    #[error("server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("protocol error: received unexpected response type: {0}")]
    UnexpectedResponseType(String),

    #[error("failed to decode FileDescriptorProto: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("server sent an invalid descriptor set: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    #[error("symbol '{0}' missing from the descriptors the server sent for it")]
    SymbolMissing(String),
}

// The reflection protocol's host field is undocumented and servers ignore
// it, so it is never exposed to callers.
const EMPTY_HOST: &str = "";

/// The reflection service's own names, excluded from service listings.
const REFLECTION_SERVICES: &[&str] = &[
    "grpc.reflection.v1.ServerReflection",
    "grpc.reflection.v1alpha.ServerReflection",
];

/// A client for the gRPC Server Reflection Protocol over any
/// tonic-compatible transport.
pub struct ReflectionClient<S = Channel> {
    client: ServerReflectionClient<S>,
    well_known: WellKnownRegistry,
}

impl<S: Clone> Clone for ReflectionClient<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            well_known: self.well_known.clone(),
        }
    }
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
            well_known: WellKnownRegistry::standard(),
        }
    }

    pub fn with_well_known(service: S, well_known: WellKnownRegistry) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
            well_known,
        }
    }

    /// Lists the services exposed by the server, excluding the reflection
    /// service itself.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        let req = ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(MessageRequest::ListServices(String::new())),
        };

        let mut response_stream = self
            .client
            .server_reflection_info(once(async { req }))
            .await
            .map_err(ReflectionError::StreamInitFailed)?
            .into_inner();

        let response = response_stream
            .message()
            .await
            .map_err(ReflectionError::StreamFailure)?
            .ok_or(ReflectionError::StreamClosed)?;

        match response.message_response {
            Some(MessageResponse::ListServicesResponse(resp)) => Ok(resp
                .service
                .into_iter()
                .map(|s| s.name)
                .filter(|name| !REFLECTION_SERVICES.contains(&name.as_str()))
                .collect()),
            Some(MessageResponse::ErrorResponse(e)) => Err(ReflectionError::ServerError {
                code: e.error_code,
                message: e.error_message,
            }),
            Some(other) => Err(ReflectionError::UnexpectedResponseType(format!(
                "{other:?}"
            ))),
            None => Err(ReflectionError::UnexpectedResponseType(
                "empty message".into(),
            )),
        }
    }

    /// Asks for the file containing `symbol` and recursively fetches every
    /// missing dependency until the set is self-contained.
    pub async fn file_descriptor_set_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionError> {
        let (tx, rx) = mpsc::channel(100);

        let mut response_stream = self
            .client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionError::StreamInitFailed)?
            .into_inner();

        let req = ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(MessageRequest::FileContainingSymbol(symbol.to_string())),
        };
        tx.send(req).await.map_err(|_| ReflectionError::SendFailed)?;

        let file_map = collect_descriptors(&mut response_stream, tx).await?;

        Ok(FileDescriptorSet {
            file: file_map.into_values().collect(),
        })
    }

    /// Builds a descriptor pool for everything reachable from `symbol`.
    pub async fn descriptor_pool_for_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<DescriptorPool, ReflectionError> {
        let fd_set = self.file_descriptor_set_by_symbol(symbol).await?;
        Ok(DescriptorPool::from_file_descriptor_set(fd_set)?)
    }

    /// Resolves one service into the schema model.
    pub async fn service_schema(&mut self, service: &str) -> Result<Service, ReflectionError> {
        let pool = self.descriptor_pool_for_symbol(service).await?;
        let descriptor = pool
            .get_service_by_name(service)
            .ok_or_else(|| ReflectionError::SymbolMissing(service.to_string()))?;
        Ok(builder::build_service(&descriptor, &self.well_known))
    }

    /// Resolves the server's whole schema.
    ///
    /// A service that fails to resolve (unsupported, malformed) is logged
    /// and skipped; the listing continues with the rest. Only a failed
    /// listing fails the whole call.
    pub async fn schema(&mut self) -> Result<Schema, ReflectionError> {
        let mut services = Vec::new();
        for name in self.list_services().await? {
            match self.service_schema(&name).await {
                Ok(service) => services.push(service),
                Err(err) => {
                    tracing::warn!(service = %name, error = %err, "skipping unresolvable service");
                }
            }
        }
        Ok(Schema { services })
    }
}

/// Drains the reflection stream until every requested file has arrived.
///
/// Each answered batch may mention dependencies not yet seen; those are
/// requested over the same stream and counted as pending answers. The loop
/// ends once every pending request has been answered, leaving `files`
/// self-contained.
async fn collect_descriptors(
    responses: &mut Streaming<ServerReflectionResponse>,
    requests: mpsc::Sender<ServerReflectionRequest>,
) -> Result<HashMap<String, FileDescriptorProto>, ReflectionError> {
    // One answer pending: the initial file-containing-symbol request.
    let mut pending = 1usize;
    let mut files: HashMap<String, FileDescriptorProto> = HashMap::new();
    let mut requested: HashSet<String> = HashSet::new();

    while pending > 0 {
        let response = responses
            .message()
            .await
            .map_err(ReflectionError::StreamFailure)?
            .ok_or(ReflectionError::StreamClosed)?;
        pending -= 1;

        let batch = match response.message_response {
            Some(MessageResponse::FileDescriptorResponse(res)) => res.file_descriptor_proto,
            Some(MessageResponse::ErrorResponse(e)) => {
                return Err(ReflectionError::ServerError {
                    code: e.error_code,
                    message: e.error_message,
                });
            }
            Some(other) => {
                return Err(ReflectionError::UnexpectedResponseType(format!(
                    "{other:?}"
                )));
            }
            None => {
                return Err(ReflectionError::UnexpectedResponseType(
                    "empty message".into(),
                ));
            }
        };

        for raw in batch {
            let fd = FileDescriptorProto::decode(raw.as_ref())?;
            let Some(name) = fd.name.clone() else {
                continue;
            };
            if files.contains_key(&name) {
                continue;
            }

            for dep in &fd.dependency {
                // A dependency may arrive unsolicited in an earlier batch
                // or already be in flight; request each name at most once.
                if files.contains_key(dep) || !requested.insert(dep.clone()) {
                    continue;
                }
                let req = ServerReflectionRequest {
                    host: EMPTY_HOST.to_string(),
                    message_request: Some(MessageRequest::FileByFilename(dep.clone())),
                };
                requests
                    .send(req)
                    .await
                    .map_err(|_| ReflectionError::SendFailed)?;
                pending += 1;
            }

            files.insert(name, fd);
        }
    }

    Ok(files)
}
