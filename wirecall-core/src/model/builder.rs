//! Builds the [`Schema`](super::Schema) graph out of a resolved
//! [`DescriptorPool`].
//!
//! This is a pure, stateless transform. It is the single place both schema
//! sources converge: the resolver decodes compiled descriptor sets into a
//! pool, the reflection client assembles one from the server's answers, and
//! both hand the pool to [`build_schema`].
use super::{EnumValue, Field, FieldKind, Method, MessageType, ScalarKind, Schema, Service};
use crate::resolver::well_known::WellKnownRegistry;
use prost_reflect::{DescriptorPool, FieldDescriptor, Kind, MessageDescriptor, ServiceDescriptor};
use std::collections::HashSet;

/// Builds the full schema graph for every service in the pool, in
/// declaration order.
pub fn build_schema(pool: &DescriptorPool, well_known: &WellKnownRegistry) -> Schema {
    Schema {
        services: pool
            .services()
            .map(|service| build_service(&service, well_known))
            .collect(),
    }
}

/// Builds the graph for a single service.
pub fn build_service(service: &ServiceDescriptor, well_known: &WellKnownRegistry) -> Service {
    Service {
        name: service.full_name().to_string(),
        methods: service
            .methods()
            .map(|method| Method {
                name: method.name().to_string(),
                input: build_message(&method.input(), well_known, &mut HashSet::new()),
                output: build_message(&method.output(), well_known, &mut HashSet::new()),
                client_streaming: method.is_client_streaming(),
                server_streaming: method.is_server_streaming(),
            })
            .collect(),
    }
}

/// Expands a message type, recursing into nested message fields.
///
/// A type already expanded in the current traversal is emitted as a
/// name-only reference with no fields, so self-referential schemas cannot
/// grow without bound.
pub fn build_message(
    message: &MessageDescriptor,
    well_known: &WellKnownRegistry,
    expanded: &mut HashSet<String>,
) -> MessageType {
    let name = full_name(message.full_name());
    if !expanded.insert(name.clone()) {
        return MessageType {
            name,
            fields: Vec::new(),
        };
    }
    let fields = message
        .fields()
        .map(|field| build_field(&field, well_known, expanded))
        .collect();
    MessageType { name, fields }
}

fn build_field(
    field: &FieldDescriptor,
    well_known: &WellKnownRegistry,
    expanded: &mut HashSet<String>,
) -> Field {
    let kind = match field.kind() {
        Kind::Message(entry) if field.is_map() => FieldKind::Map {
            key: kind_name(&entry.map_entry_key_field().kind()),
            value: kind_name(&entry.map_entry_value_field().kind()),
        },
        Kind::Message(nested) if well_known.contains(nested.full_name()) => FieldKind::WellKnown {
            name: full_name(nested.full_name()),
        },
        Kind::Message(nested) => FieldKind::Message(build_message(&nested, well_known, expanded)),
        Kind::Enum(en) => FieldKind::Enum {
            name: full_name(en.full_name()),
            values: en
                .values()
                .map(|v| EnumValue {
                    name: v.name().to_string(),
                    number: v.number(),
                })
                .collect(),
        },
        scalar => FieldKind::Scalar(scalar_kind(&scalar)),
    };

    Field {
        name: field.name().to_string(),
        tag: field.number(),
        kind,
        repeated: field.is_list(),
    }
}

/// Type names coming out of raw descriptor protos carry a leading
/// package-qualifier dot; the model always stores them without it.
fn full_name(name: &str) -> String {
    name.trim_start_matches('.').to_string()
}

fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Message(m) => full_name(m.full_name()),
        Kind::Enum(e) => full_name(e.full_name()),
        scalar => format!("{scalar:?}").to_ascii_lowercase(),
    }
}

fn scalar_kind(kind: &Kind) -> ScalarKind {
    match kind {
        Kind::Double => ScalarKind::Double,
        Kind::Float => ScalarKind::Float,
        Kind::Int32 => ScalarKind::Int32,
        Kind::Int64 => ScalarKind::Int64,
        Kind::Uint32 => ScalarKind::Uint32,
        Kind::Uint64 => ScalarKind::Uint64,
        Kind::Sint32 => ScalarKind::Sint32,
        Kind::Sint64 => ScalarKind::Sint64,
        Kind::Fixed32 => ScalarKind::Fixed32,
        Kind::Fixed64 => ScalarKind::Fixed64,
        Kind::Sfixed32 => ScalarKind::Sfixed32,
        Kind::Sfixed64 => ScalarKind::Sfixed64,
        Kind::Bool => ScalarKind::Bool,
        Kind::String => ScalarKind::String,
        Kind::Bytes => ScalarKind::Bytes,
        // Message/Enum are handled before this is called.
        Kind::Message(_) | Kind::Enum(_) => ScalarKind::Bytes,
    }
}
