//! # Generic gRPC Transport
//!
//! Low-level building blocks for performing gRPC calls with dynamic message
//! types. Unlike standard `tonic` clients, which are strongly typed, the
//! components here carry `serde_json::Value` end to end and transcode it to
//! Protobuf binary format at the wire boundary.
pub mod client;
pub mod codec;
