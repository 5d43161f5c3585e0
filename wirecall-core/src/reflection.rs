//! # Server Reflection
//!
//! The alternate schema source: instead of compiling local sources, query a
//! live server's `grpc.reflection.v1` self-description and build the same
//! [`Schema`](crate::model::Schema) graph from its answers.
pub mod client;
