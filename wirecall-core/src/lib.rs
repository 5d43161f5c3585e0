//! # Wirecall Core
//!
//! `wirecall-core` is a dynamic gRPC invocation engine. It lets a caller issue
//! arbitrary RPCs against a gRPC server without any generated client code, by
//! resolving the schema at run time — either from local `.proto` sources
//! compiled through `protoc`, or from a live server's reflection service —
//! and transcoding JSON values to Protobuf wire format on the fly.
//!
//! ## Key Components
//!
//! * **[`resolver::DescriptorResolver`]:** Scans a directory of `.proto`
//!   sources and turns each file into a self-contained descriptor set by
//!   driving a `protoc` subprocess, with per-file failure isolation and
//!   import-cycle detection.
//! * **[`reflection::client::ReflectionClient`]:** The alternate schema
//!   source — builds the same descriptors by querying `grpc.reflection.v1` on
//!   a connected server.
//! * **[`model::Schema`]:** A uniform, serializable graph of
//!   Services → Methods → MessageTypes → Fields produced from either source.
//! * **[`codec`]:** Encodes JSON values into [`prost_reflect::DynamicMessage`]
//!   instances against a message descriptor, and decodes responses back to
//!   JSON (enums by name, bytes as base64).
//! * **[`conn::manager::ConnectionManager`]:** Owns one transport channel per
//!   [`conn::ConnectionProfile`], with an idempotent `connect`, bounded dial
//!   timeouts, and automatic TLS on the well-known HTTPS port.
//! * **[`invoke::Invoker`]:** Dispatches all four streaming shapes off a
//!   method's two streaming flags, collecting streamed responses before
//!   returning.
//!
//! Every invocation resolves its schema from exactly one source — compiled
//! descriptors or live reflection — never both in the same call.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` so that
//! consumers use compatible versions of the underlying dependencies.
pub mod codec;
pub mod conn;
pub mod grpc;
pub mod invoke;
pub mod model;
pub mod reflection;
pub mod resolver;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
