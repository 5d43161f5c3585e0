//! # Dynamic Message Codec
//!
//! Transcodes generic JSON values to [`DynamicMessage`] instances against a
//! [`MessageDescriptor`], and back. No generated message types anywhere: the
//! encoder walks the declared fields and populates a mutable message, the
//! decoder produces the inverse JSON value from a received message.
//!
//! Encoding rules that callers rely on:
//!
//! * A singular numeric field given an empty string is **absent**, never
//!   `0`. Inside a repeated field or a map value an empty string is an
//!   error instead: skipping it would silently shrink the collection.
//! * A message-typed field is populated only when the caller supplied a
//!   non-null value; `null` and omission both leave it unset.
//! * A repeated field's input is an array, decoded element by element.
//! * 64-bit integer fields also accept JSON strings, since JSON numbers
//!   cannot carry the full 64-bit range.
//! * Enum fields accept a value name or a raw number.
//! * Byte fields are base64 strings in both directions.
//!
//! On decode, enum values render by name and bytes as base64 text. A
//! well-known timestamp needs no special handling: it is the structural
//! `{seconds, nanos}` object in both directions.
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use prost_reflect::{
    DynamicMessage, FieldDescriptor, Kind, MapKey, MessageDescriptor, ReflectMessage,
};
use serde_json::Value as Json;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("expected a JSON object for message '{0}'")]
    ExpectedObject(String),
    #[error("field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: String,
    },
    #[error("field '{field}': number out of range for {expected}")]
    OutOfRange {
        field: String,
        expected: &'static str,
    },
    #[error("field '{field}': invalid base64: {source}")]
    InvalidBase64 {
        field: String,
        source: base64::DecodeError,
    },
    #[error("field '{field}': unknown enum value '{value}'")]
    UnknownEnumValue { field: String, value: String },
    #[error("field '{field}': invalid map key '{key}'")]
    InvalidMapKey { field: String, key: String },
}

/// Builds a wire-encodable message from a JSON object.
///
/// Fields absent from the input, explicitly `null`, or numeric fields given
/// `""` stay unset; everything else is validated against the declared kind.
pub fn encode_message(
    descriptor: &MessageDescriptor,
    input: &Json,
) -> Result<DynamicMessage, CodecError> {
    let Json::Object(object) = input else {
        return Err(CodecError::ExpectedObject(
            descriptor.full_name().to_string(),
        ));
    };

    let mut message = DynamicMessage::new(descriptor.clone());
    for field in descriptor.fields() {
        let Some(value) = object.get(field.name()) else {
            continue;
        };
        if value.is_null() {
            // Explicit null still means unset, for messages and scalars alike.
            continue;
        }

        if field.is_map() {
            message.set_field(&field, encode_map(&field, value)?);
        } else if field.is_list() {
            let Json::Array(items) = value else {
                return Err(mismatch(&field, "an array", value));
            };
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match encode_single(&field, item)? {
                    Some(encoded) => list.push(encoded),
                    // "" marks a singular field absent; inside an array it
                    // would silently shrink the list, so it is an error.
                    None => return Err(mismatch(&field, "a non-empty element", item)),
                }
            }
            message.set_field(&field, prost_reflect::Value::List(list));
        } else if let Some(encoded) = encode_single(&field, value)? {
            message.set_field(&field, encoded);
        }
    }
    Ok(message)
}

/// Produces the JSON value for a received message. Only fields the message
/// actually carries appear in the output.
pub fn decode_message(message: &DynamicMessage) -> Json {
    let mut object = serde_json::Map::new();
    for field in message.descriptor().fields() {
        if !message.has_field(&field) {
            continue;
        }
        let value = message.get_field(&field);
        object.insert(field.name().to_string(), decode_value(&field, &value));
    }
    Json::Object(object)
}

fn encode_single(
    field: &FieldDescriptor,
    value: &Json,
) -> Result<Option<prost_reflect::Value>, CodecError> {
    use prost_reflect::Value as V;

    let encoded = match field.kind() {
        Kind::Message(nested) => Some(V::Message(encode_message(&nested, value)?)),
        Kind::Enum(en) => match value {
            Json::String(name) => {
                let number = en
                    .get_value_by_name(name)
                    .map(|v| v.number())
                    .ok_or_else(|| CodecError::UnknownEnumValue {
                        field: field.name().to_string(),
                        value: name.clone(),
                    })?;
                Some(V::EnumNumber(number))
            }
            Json::Number(_) => encode_i32(field, value)?.map(V::EnumNumber),
            other => return Err(mismatch(field, "an enum name or number", other)),
        },
        Kind::String => match value {
            Json::String(s) => Some(V::String(s.clone())),
            other => return Err(mismatch(field, "a string", other)),
        },
        Kind::Bool => match value {
            Json::Bool(b) => Some(V::Bool(*b)),
            other => return Err(mismatch(field, "a boolean", other)),
        },
        Kind::Bytes => match value {
            Json::String(text) => {
                let bytes = BASE64
                    .decode(text)
                    .map_err(|source| CodecError::InvalidBase64 {
                        field: field.name().to_string(),
                        source,
                    })?;
                Some(V::Bytes(prost::bytes::Bytes::from(bytes)))
            }
            other => return Err(mismatch(field, "a base64 string", other)),
        },
        Kind::Double => encode_f64(field, value)?.map(V::F64),
        Kind::Float => encode_f64(field, value)?.map(|v| V::F32(v as f32)),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => encode_i32(field, value)?.map(V::I32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => encode_i64(field, value)?.map(V::I64),
        Kind::Uint32 | Kind::Fixed32 => encode_u32(field, value)?.map(V::U32),
        Kind::Uint64 | Kind::Fixed64 => encode_u64(field, value)?.map(V::U64),
    };
    Ok(encoded)
}

fn encode_map(field: &FieldDescriptor, value: &Json) -> Result<prost_reflect::Value, CodecError> {
    let Json::Object(entries) = value else {
        return Err(mismatch(field, "an object", value));
    };
    let Kind::Message(entry) = field.kind() else {
        return Err(mismatch(field, "a map", value));
    };
    let key_kind = entry.map_entry_key_field().kind();
    let value_field = entry.map_entry_value_field();

    let mut map = HashMap::with_capacity(entries.len());
    for (key, item) in entries {
        let map_key = parse_map_key(field, &key_kind, key)?;
        match encode_single(&value_field, item)? {
            Some(encoded) => {
                map.insert(map_key, encoded);
            }
            // Same rule as list elements: "" would silently drop the entry.
            None => return Err(mismatch(field, "a non-empty map value", item)),
        }
    }
    Ok(prost_reflect::Value::Map(map))
}

fn parse_map_key(field: &FieldDescriptor, kind: &Kind, key: &str) -> Result<MapKey, CodecError> {
    let invalid = || CodecError::InvalidMapKey {
        field: field.name().to_string(),
        key: key.to_string(),
    };
    let parsed = match kind {
        Kind::String => MapKey::String(key.to_string()),
        Kind::Bool => MapKey::Bool(key.parse().map_err(|_| invalid())?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            MapKey::I32(key.parse().map_err(|_| invalid())?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            MapKey::I64(key.parse().map_err(|_| invalid())?)
        }
        Kind::Uint32 | Kind::Fixed32 => MapKey::U32(key.parse().map_err(|_| invalid())?),
        Kind::Uint64 | Kind::Fixed64 => MapKey::U64(key.parse().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };
    Ok(parsed)
}

fn decode_value(field: &FieldDescriptor, value: &prost_reflect::Value) -> Json {
    use prost_reflect::Value as V;

    match value {
        V::Bool(v) => Json::from(*v),
        V::I32(v) => Json::from(*v),
        V::I64(v) => Json::from(*v),
        V::U32(v) => Json::from(*v),
        V::U64(v) => Json::from(*v),
        V::F32(v) => decode_f32(*v),
        V::F64(v) => Json::from(*v),
        V::String(v) => Json::from(v.clone()),
        V::Bytes(v) => Json::from(BASE64.encode(v)),
        V::EnumNumber(number) => match field.kind() {
            Kind::Enum(en) => en
                .get_value(*number)
                .map(|v| Json::from(v.name().to_string()))
                .unwrap_or_else(|| Json::from(*number)),
            _ => Json::from(*number),
        },
        V::Message(nested) => decode_message(nested),
        V::List(items) => Json::Array(items.iter().map(|i| decode_value(field, i)).collect()),
        V::Map(entries) => {
            let value_field = match field.kind() {
                Kind::Message(entry) => Some(entry.map_entry_value_field()),
                _ => None,
            };
            let mut object = serde_json::Map::new();
            for (key, item) in entries {
                let decoded = match &value_field {
                    Some(vf) => decode_value(vf, item),
                    None => decode_value(field, item),
                };
                object.insert(map_key_string(key), decoded);
            }
            Json::Object(object)
        }
    }
}

/// Widening an `f32` directly drags in representation noise (`0.1f32`
/// becomes `0.10000000149011612`); going through the shortest decimal form
/// keeps the value the sender wrote. Non-finite values have no JSON number
/// and fall through to `null`, same as `Json::from` on a non-finite `f64`.
fn decode_f32(value: f32) -> Json {
    format!("{value}")
        .parse::<f64>()
        .map(Json::from)
        .unwrap_or(Json::Null)
}

fn map_key_string(key: &MapKey) -> String {
    match key {
        MapKey::String(s) => s.clone(),
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
    }
}

fn mismatch(field: &FieldDescriptor, expected: &'static str, got: &Json) -> CodecError {
    CodecError::TypeMismatch {
        field: field.name().to_string(),
        expected,
        got: json_kind(got).to_string(),
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

// Numeric parsing shared by all integer kinds: a JSON number, a numeric
// string, or the empty string (meaning the field was left blank — absent,
// never zero).

fn encode_i64(field: &FieldDescriptor, value: &Json) -> Result<Option<i64>, CodecError> {
    match value {
        Json::Number(n) => n.as_i64().map(Some).ok_or_else(|| CodecError::OutOfRange {
            field: field.name().to_string(),
            expected: "a 64-bit integer",
        }),
        Json::String(s) if s.is_empty() => Ok(None),
        Json::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| mismatch(field, "an integer", value)),
        other => Err(mismatch(field, "an integer", other)),
    }
}

fn encode_u64(field: &FieldDescriptor, value: &Json) -> Result<Option<u64>, CodecError> {
    match value {
        Json::Number(n) => n.as_u64().map(Some).ok_or_else(|| CodecError::OutOfRange {
            field: field.name().to_string(),
            expected: "an unsigned 64-bit integer",
        }),
        Json::String(s) if s.is_empty() => Ok(None),
        Json::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| mismatch(field, "an unsigned integer", value)),
        other => Err(mismatch(field, "an unsigned integer", other)),
    }
}

fn encode_i32(field: &FieldDescriptor, value: &Json) -> Result<Option<i32>, CodecError> {
    encode_i64(field, value)?
        .map(|v| {
            i32::try_from(v).map_err(|_| CodecError::OutOfRange {
                field: field.name().to_string(),
                expected: "a 32-bit integer",
            })
        })
        .transpose()
}

fn encode_u32(field: &FieldDescriptor, value: &Json) -> Result<Option<u32>, CodecError> {
    encode_u64(field, value)?
        .map(|v| {
            u32::try_from(v).map_err(|_| CodecError::OutOfRange {
                field: field.name().to_string(),
                expected: "an unsigned 32-bit integer",
            })
        })
        .transpose()
}

fn encode_f64(field: &FieldDescriptor, value: &Json) -> Result<Option<f64>, CodecError> {
    match value {
        Json::Number(n) => Ok(n.as_f64()),
        Json::String(s) if s.is_empty() => Ok(None),
        Json::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| mismatch(field, "a number", value)),
        other => Err(mismatch(field, "a number", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::DescriptorPool;
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, FileDescriptorSet, MessageOptions,
        field_descriptor_proto::{Label, Type},
    };
    use serde_json::json;

    fn field(
        name: &str,
        number: i32,
        ty: Type,
        label: Label,
        type_name: Option<&str>,
    ) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            type_name: type_name.map(str::to_string),
            json_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn test_descriptor() -> MessageDescriptor {
        let file = FileDescriptorProto {
            name: Some("everything.proto".to_string()),
            package: Some("test".to_string()),
            syntax: Some("proto3".to_string()),
            enum_type: vec![EnumDescriptorProto {
                name: Some("Color".to_string()),
                value: vec![
                    EnumValueDescriptorProto {
                        name: Some("COLOR_UNSPECIFIED".to_string()),
                        number: Some(0),
                        ..Default::default()
                    },
                    EnumValueDescriptorProto {
                        name: Some("RED".to_string()),
                        number: Some(1),
                        ..Default::default()
                    },
                    EnumValueDescriptorProto {
                        name: Some("BLUE".to_string()),
                        number: Some(2),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            message_type: vec![
                DescriptorProto {
                    name: Some("Inner".to_string()),
                    field: vec![field("text", 1, Type::String, Label::Optional, None)],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Everything".to_string()),
                    field: vec![
                        field("name", 1, Type::String, Label::Optional, None),
                        field("count", 2, Type::Int32, Label::Optional, None),
                        field("big", 3, Type::Int64, Label::Optional, None),
                        field("ratio", 4, Type::Double, Label::Optional, None),
                        field("flag", 5, Type::Bool, Label::Optional, None),
                        field("data", 6, Type::Bytes, Label::Optional, None),
                        field("color", 7, Type::Enum, Label::Optional, Some(".test.Color")),
                        field("tags", 8, Type::String, Label::Repeated, None),
                        field(
                            "inner",
                            9,
                            Type::Message,
                            Label::Optional,
                            Some(".test.Inner"),
                        ),
                        field(
                            "attrs",
                            10,
                            Type::Message,
                            Label::Repeated,
                            Some(".test.Everything.AttrsEntry"),
                        ),
                        field("weight", 11, Type::Float, Label::Optional, None),
                        field("nums", 12, Type::Int32, Label::Repeated, None),
                    ],
                    nested_type: vec![DescriptorProto {
                        name: Some("AttrsEntry".to_string()),
                        field: vec![
                            field("key", 1, Type::String, Label::Optional, None),
                            field("value", 2, Type::Int64, Label::Optional, None),
                        ],
                        options: Some(MessageOptions {
                            map_entry: Some(true),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
            .expect("valid test descriptor set");
        pool.get_message_by_name("test.Everything").unwrap()
    }

    #[test]
    fn empty_string_numeric_is_absent_not_zero() {
        let desc = test_descriptor();
        let message =
            encode_message(&desc, &json!({ "count": "", "big": "", "ratio": "" })).unwrap();

        let count_field = desc.get_field_by_name("count").unwrap();
        let big_field = desc.get_field_by_name("big").unwrap();
        let ratio_field = desc.get_field_by_name("ratio").unwrap();
        assert!(!message.has_field(&count_field));
        assert!(!message.has_field(&big_field));
        assert!(!message.has_field(&ratio_field));

        // A genuine zero is a different thing entirely and is kept.
        let message = encode_message(&desc, &json!({ "count": 0 })).unwrap();
        assert_eq!(
            message.get_field(&count_field).as_i32(),
            Some(0),
            "explicit zero must encode"
        );
    }

    #[test]
    fn message_field_set_only_on_explicit_value() {
        let desc = test_descriptor();
        let inner_field = desc.get_field_by_name("inner").unwrap();

        let omitted = encode_message(&desc, &json!({ "name": "x" })).unwrap();
        assert!(!omitted.has_field(&inner_field));

        let explicit_null = encode_message(&desc, &json!({ "inner": null })).unwrap();
        assert!(!explicit_null.has_field(&inner_field));

        // Present but empty is distinct from omitted.
        let empty = encode_message(&desc, &json!({ "inner": {} })).unwrap();
        assert!(empty.has_field(&inner_field));
    }

    #[test]
    fn repeated_string_round_trips() {
        let desc = test_descriptor();
        let input = json!({ "tags": ["one", "two", "three"] });

        let message = encode_message(&desc, &input).unwrap();
        let output = decode_message(&message);

        assert_eq!(output["tags"], json!(["one", "two", "three"]));
    }

    #[test]
    fn sixty_four_bit_fields_accept_strings() {
        let desc = test_descriptor();
        let message = encode_message(&desc, &json!({ "big": "9007199254740993" })).unwrap();
        let big_field = desc.get_field_by_name("big").unwrap();
        assert_eq!(message.get_field(&big_field).as_i64(), Some(9007199254740993));
    }

    #[test]
    fn bytes_are_base64_both_ways() {
        let desc = test_descriptor();
        let message = encode_message(&desc, &json!({ "data": "aGVsbG8=" })).unwrap();
        let data_field = desc.get_field_by_name("data").unwrap();
        assert_eq!(
            message.get_field(&data_field).as_bytes().map(|b| b.as_ref()),
            Some(b"hello".as_ref())
        );

        let output = decode_message(&message);
        assert_eq!(output["data"], json!("aGVsbG8="));

        let err = encode_message(&desc, &json!({ "data": "not base64!!" })).unwrap_err();
        assert!(matches!(err, CodecError::InvalidBase64 { .. }));
    }

    #[test]
    fn enums_encode_by_name_or_number_and_decode_by_name() {
        let desc = test_descriptor();
        let color_field = desc.get_field_by_name("color").unwrap();

        let by_name = encode_message(&desc, &json!({ "color": "BLUE" })).unwrap();
        assert_eq!(by_name.get_field(&color_field).as_enum_number(), Some(2));

        let by_number = encode_message(&desc, &json!({ "color": 1 })).unwrap();
        assert_eq!(decode_message(&by_number)["color"], json!("RED"));

        let err = encode_message(&desc, &json!({ "color": "MAGENTA" })).unwrap_err();
        assert!(matches!(err, CodecError::UnknownEnumValue { .. }));
    }

    #[test]
    fn maps_round_trip_through_json_objects() {
        let desc = test_descriptor();
        let input = json!({ "attrs": { "height": 12, "width": 7 } });

        let message = encode_message(&desc, &input).unwrap();
        let output = decode_message(&message);

        assert_eq!(output["attrs"], json!({ "height": 12, "width": 7 }));
    }

    #[test]
    fn type_mismatches_are_reported_per_field() {
        let desc = test_descriptor();
        let err = encode_message(&desc, &json!({ "flag": "yes" })).unwrap_err();
        match err {
            CodecError::TypeMismatch { field, .. } => assert_eq!(field, "flag"),
            other => panic!("expected type mismatch, got {other:?}"),
        }

        let err = encode_message(&desc, &json!([1, 2])).unwrap_err();
        assert!(matches!(err, CodecError::ExpectedObject(_)));
    }

    #[test]
    fn float_fields_decode_without_widening_noise() {
        let desc = test_descriptor();
        let message = encode_message(&desc, &json!({ "weight": 0.1 })).unwrap();

        let weight_field = desc.get_field_by_name("weight").unwrap();
        assert_eq!(message.get_field(&weight_field).as_f32(), Some(0.1f32));

        // A plain `as f64` widening would print 0.10000000149011612 here.
        let output = decode_message(&message);
        assert_eq!(output["weight"], json!(0.1));
    }

    #[test]
    fn empty_string_inside_repeated_numeric_is_rejected() {
        let desc = test_descriptor();
        let err = encode_message(&desc, &json!({ "nums": ["1", "", "2"] })).unwrap_err();
        match err {
            CodecError::TypeMismatch { field, .. } => assert_eq!(field, "nums"),
            other => panic!("expected type mismatch, got {other:?}"),
        }

        let err = encode_message(&desc, &json!({ "attrs": { "height": "" } })).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn unknown_input_keys_are_ignored() {
        // Only declared fields are walked; extra keys do not fail the encode.
        let desc = test_descriptor();
        let message = encode_message(&desc, &json!({ "name": "x", "ghost": 1 })).unwrap();
        let name_field = desc.get_field_by_name("name").unwrap();
        assert!(message.has_field(&name_field));
    }
}
