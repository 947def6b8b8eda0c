use super::JsonFlavor;
use crate::errors::DecodeError;
use crate::extended_json::ExtendedValue;
use crate::types::Decoded;
use serde_json::Value;

/// Parses a JSON document. Object keys keep their order in the payload.
pub fn decode_json(payload: &[u8], flavor: JsonFlavor) -> Result<Decoded, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    match flavor {
        JsonFlavor::Plain => Ok(Decoded::Json(value)),
        JsonFlavor::Extended => ExtendedValue::from_json(value).map(Decoded::Document),
    }
}
