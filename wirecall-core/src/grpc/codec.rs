//! A `tonic::codec::Codec` carrying `serde_json::Value` instead of generated
//! structs.
//!
//! The encoder validates the JSON against the request [`MessageDescriptor`]
//! through [`crate::codec::encode_message`] — so the field-presence rules
//! (empty-string numerics absent, null messages unset) hold on the wire, not
//! just in memory — and the decoder turns received bytes back into JSON via
//! [`crate::codec::decode_message`].
use crate::codec::{decode_message, encode_message};
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// Bridges JSON values and Protobuf binary format for one method, holding
/// the descriptors for both message directions.
pub struct JsonCodec {
    request: MessageDescriptor,
    response: MessageDescriptor,
}

impl JsonCodec {
    pub fn new(request: MessageDescriptor, response: MessageDescriptor) -> Self {
        Self { request, response }
    }
}

impl Codec for JsonCodec {
    type Encode = serde_json::Value;
    type Decode = serde_json::Value;

    type Encoder = JsonEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder(self.request.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(self.response.clone())
    }
}

pub struct JsonEncoder(MessageDescriptor);

impl Encoder for JsonEncoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        let message = encode_message(&self.0, &item).map_err(|e| {
            Status::invalid_argument(format!(
                "request does not match schema for '{}': {e}",
                self.0.full_name()
            ))
        })?;
        message.encode_raw(dst);
        Ok(())
    }
}

pub struct JsonDecoder(MessageDescriptor);

impl Decoder for JsonDecoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut message = DynamicMessage::new(self.0.clone());
        message
            .merge(src)
            .map_err(|e| Status::internal(format!("failed to decode response bytes: {e}")))?;
        Ok(Some(decode_message(&message)))
    }
}
