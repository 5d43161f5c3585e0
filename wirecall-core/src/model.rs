//! # Schema Model
//!
//! A language-neutral, in-memory graph of what a gRPC server exposes:
//! Services → Methods → MessageTypes → Fields. Both schema sources (compiled
//! descriptors and live reflection) produce this same shape, so consumers
//! never need to know where a schema came from.
//!
//! All types derive `serde`, so a frontend or a store can persist and render
//! them without touching descriptor internals.
pub mod builder;

use serde::{Deserialize, Serialize};

/// The complete schema resolved from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub services: Vec<Service>,
}

/// A service with its methods in declaration order.
///
/// Service names are package-qualified (e.g. `echo.EchoService`) and unique
/// within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub methods: Vec<Method>,
}

/// A single RPC method.
///
/// The two independent streaming flags define the call shape: unary,
/// client-streaming, server-streaming, or bidirectional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub input: MessageType,
    pub output: MessageType,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

/// A message type with its fields in declaration order.
///
/// A `MessageType` with an empty field list can also be a reference to a type
/// already expanded earlier in the same traversal (self-referential schemas
/// terminate this way).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageType {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Wire tag, unique within the enclosing message.
    pub tag: u32,
    pub kind: FieldKind,
    pub repeated: bool,
}

/// What a field holds: one of the fifteen scalar kinds, an enum, a nested
/// message, a well-known type, or a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Enum { name: String, values: Vec<EnumValue> },
    Message(MessageType),
    /// A registered well-known type (e.g. `google.protobuf.Timestamp`),
    /// tagged distinctly so a consumer can special-case its rendering.
    WellKnown { name: String },
    /// A map field as a single synthetic kind carrying key and value type
    /// names.
    Map { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

impl Schema {
    /// Looks up a service by its package-qualified name.
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl Service {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}
