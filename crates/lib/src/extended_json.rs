//! # Extended JSON
//!
//! MongoDB Extended JSON v2 (canonical and relaxed) plus the legacy
//! `$binary`/`$type` and `$regex`/`$options` wrappers. Cloud Storage exports
//! written by `mongoexport` or `bson.json_util` land here.

use crate::errors::DecodeError;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Key-ordered document.
pub type Document = IndexMap<String, ExtendedValue>;

/// A 12-byte BSON object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl FromStr for ObjectId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecodeError::ExtendedJson(format!("invalid ObjectId '{s}'"));
        if s.len() != 24 || !s.is_ascii() {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtendedValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Array(Vec<ExtendedValue>),
    Document(Document),
    ObjectId(ObjectId),
    DateTime(DateTime<Utc>),
    Decimal128(String),
    Binary { subtype: u8, bytes: Vec<u8> },
    Regex { pattern: String, options: String },
    Timestamp { time: u32, increment: u32 },
    Symbol(String),
    Code(String),
    CodeWithScope { code: String, scope: Document },
    MinKey,
    MaxKey,
    Undefined,
}

impl ExtendedValue {
    /// Interprets a parsed JSON tree, replacing type wrappers with typed values.
    pub fn from_json(value: Value) -> Result<Self, DecodeError> {
        Ok(match value {
            Value::Null => ExtendedValue::Null,
            Value::Bool(b) => ExtendedValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ExtendedValue::Int64(i),
                None => ExtendedValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ExtendedValue::String(s),
            Value::Array(items) => ExtendedValue::Array(
                items
                    .into_iter()
                    .map(ExtendedValue::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => match parse_wrapper(&map) {
                Some(typed) => typed?,
                None => ExtendedValue::Document(to_document(map)?),
            },
        })
    }

    pub fn get(&self, key: &str) -> Option<&ExtendedValue> {
        self.as_document()?.get(key)
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            ExtendedValue::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ExtendedValue]> {
        match self {
            ExtendedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Renders relaxed extended JSON: plain numbers where they are lossless,
    /// wrappers for everything JSON cannot express.
    pub fn to_relaxed_json(&self) -> Value {
        match self {
            ExtendedValue::Null => Value::Null,
            ExtendedValue::Bool(b) => Value::Bool(*b),
            ExtendedValue::Int32(i) => json!(i),
            ExtendedValue::Int64(i) => json!(i),
            ExtendedValue::Double(x) if x.is_finite() => json!(x),
            ExtendedValue::Double(x) => json!({ "$numberDouble": non_finite_name(*x) }),
            ExtendedValue::String(s) => Value::String(s.clone()),
            ExtendedValue::Array(items) => {
                Value::Array(items.iter().map(ExtendedValue::to_relaxed_json).collect())
            }
            ExtendedValue::Document(doc) => document_to_json(doc),
            ExtendedValue::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
            ExtendedValue::DateTime(dt) => {
                if (1970..=9999).contains(&dt.year()) {
                    json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true) })
                } else {
                    json!({ "$date": { "$numberLong": dt.timestamp_millis().to_string() } })
                }
            }
            ExtendedValue::Decimal128(d) => json!({ "$numberDecimal": d }),
            ExtendedValue::Binary { subtype, bytes } => json!({
                "$binary": {
                    "base64": general_purpose::STANDARD.encode(bytes),
                    "subType": format!("{subtype:02x}"),
                }
            }),
            ExtendedValue::Regex { pattern, options } => json!({
                "$regularExpression": { "pattern": pattern, "options": options }
            }),
            ExtendedValue::Timestamp { time, increment } => {
                json!({ "$timestamp": { "t": time, "i": increment } })
            }
            ExtendedValue::Symbol(s) => json!({ "$symbol": s }),
            ExtendedValue::Code(code) => json!({ "$code": code }),
            ExtendedValue::CodeWithScope { code, scope } => {
                json!({ "$code": code, "$scope": document_to_json(scope) })
            }
            ExtendedValue::MinKey => json!({ "$minKey": 1 }),
            ExtendedValue::MaxKey => json!({ "$maxKey": 1 }),
            ExtendedValue::Undefined => json!({ "$undefined": true }),
        }
    }
}

fn document_to_json(doc: &Document) -> Value {
    Value::Object(
        doc.iter()
            .map(|(k, v)| (k.clone(), v.to_relaxed_json()))
            .collect(),
    )
}

fn non_finite_name(x: f64) -> &'static str {
    if x.is_nan() {
        "NaN"
    } else if x > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn to_document(map: Map<String, Value>) -> Result<Document, DecodeError> {
    map.into_iter()
        .map(|(k, v)| ExtendedValue::from_json(v).map(|v| (k, v)))
        .collect()
}

fn invalid(what: &str, value: &Value) -> DecodeError {
    DecodeError::ExtendedJson(format!("invalid {what}: {value}"))
}

fn as_str<'a>(what: &str, value: &'a Value) -> Result<&'a str, DecodeError> {
    value.as_str().ok_or_else(|| invalid(what, value))
}

fn parse_number<T: FromStr>(what: &str, value: &Value) -> Result<T, DecodeError> {
    as_str(what, value)?
        .parse()
        .map_err(|_| invalid(what, value))
}

fn parse_subtype(value: &Value) -> Result<u8, DecodeError> {
    u8::from_str_radix(as_str("binary subtype", value)?, 16)
        .map_err(|_| invalid("binary subtype", value))
}

fn decode_base64(value: &Value) -> Result<Vec<u8>, DecodeError> {
    general_purpose::STANDARD
        .decode(as_str("binary payload", value)?)
        .map_err(|e| DecodeError::ExtendedJson(format!("invalid base64 payload: {e}")))
}

fn parse_date(value: &Value) -> Result<DateTime<Utc>, DecodeError> {
    let millis = match value {
        Value::String(s) => {
            // Offsets without a colon (`+0000`) are common in older exports.
            return DateTime::parse_from_rfc3339(s)
                .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DecodeError::ExtendedJson(format!("invalid $date '{s}': {e}")));
        }
        Value::Number(n) => n.as_i64().ok_or_else(|| invalid("$date", value))?,
        Value::Object(inner) => match inner.get("$numberLong") {
            Some(ms) if inner.len() == 1 => parse_number("$date", ms)?,
            _ => return Err(invalid("$date", value)),
        },
        _ => return Err(invalid("$date", value)),
    };
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| invalid("$date", value))
}

fn parse_double(value: &Value) -> Result<f64, DecodeError> {
    match as_str("$numberDouble", value)? {
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => parse_number("$numberDouble", value),
    }
}

fn parse_u32(what: &str, value: Option<&Value>) -> Result<u32, DecodeError> {
    value
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| DecodeError::ExtendedJson(format!("invalid {what}")))
}

/// Recognises a type wrapper by its exact key set. `None` means `map` is an
/// ordinary document.
fn parse_wrapper(map: &Map<String, Value>) -> Option<Result<ExtendedValue, DecodeError>> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();

    let value = |key: &str| &map[key];
    let parsed = match keys.as_slice() {
        ["$oid"] => as_str("$oid", value("$oid"))
            .and_then(|s| s.parse())
            .map(ExtendedValue::ObjectId),
        ["$date"] => parse_date(value("$date")).map(ExtendedValue::DateTime),
        ["$numberInt"] => parse_number("$numberInt", value("$numberInt")).map(ExtendedValue::Int32),
        ["$numberLong"] => {
            parse_number("$numberLong", value("$numberLong")).map(ExtendedValue::Int64)
        }
        ["$numberDouble"] => parse_double(value("$numberDouble")).map(ExtendedValue::Double),
        ["$numberDecimal"] => as_str("$numberDecimal", value("$numberDecimal"))
            .map(|d| ExtendedValue::Decimal128(d.to_string())),
        ["$binary"] => {
            let inner = value("$binary");
            match (inner.get("base64"), inner.get("subType")) {
                (Some(payload), Some(subtype)) => decode_base64(payload).and_then(|bytes| {
                    Ok(ExtendedValue::Binary {
                        subtype: parse_subtype(subtype)?,
                        bytes,
                    })
                }),
                _ => Err(invalid("$binary", inner)),
            }
        }
        ["$binary", "$type"] => decode_base64(value("$binary")).and_then(|bytes| {
            Ok(ExtendedValue::Binary {
                subtype: parse_subtype(value("$type"))?,
                bytes,
            })
        }),
        ["$uuid"] => as_str("$uuid", value("$uuid")).and_then(|s| {
            let hex: String = s.chars().filter(|c| *c != '-').collect();
            let bytes = (0..hex.len() / 2)
                .map(|i| u8::from_str_radix(hex.get(i * 2..i * 2 + 2).unwrap_or(""), 16))
                .collect::<Result<Vec<u8>, _>>()
                .ok()
                .filter(|b| b.len() == 16 && hex.len() == 32)
                .ok_or_else(|| invalid("$uuid", value("$uuid")))?;
            Ok(ExtendedValue::Binary { subtype: 4, bytes })
        }),
        ["$regularExpression"] => {
            let inner = value("$regularExpression");
            match (
                inner.get("pattern").and_then(Value::as_str),
                inner.get("options").and_then(Value::as_str),
            ) {
                (Some(pattern), Some(options)) => Ok(ExtendedValue::Regex {
                    pattern: pattern.to_string(),
                    options: options.to_string(),
                }),
                _ => Err(invalid("$regularExpression", inner)),
            }
        }
        ["$options", "$regex"] => match (value("$regex").as_str(), value("$options").as_str()) {
            (Some(pattern), Some(options)) => Ok(ExtendedValue::Regex {
                pattern: pattern.to_string(),
                options: options.to_string(),
            }),
            // `{"$regex": .., "$options": ..}` with non-string values is a query
            // operator document, not a wrapper.
            _ => return None,
        },
        ["$timestamp"] => {
            let inner = value("$timestamp");
            parse_u32("$timestamp.t", inner.get("t")).and_then(|time| {
                Ok(ExtendedValue::Timestamp {
                    time,
                    increment: parse_u32("$timestamp.i", inner.get("i"))?,
                })
            })
        }
        ["$symbol"] => {
            as_str("$symbol", value("$symbol")).map(|s| ExtendedValue::Symbol(s.to_string()))
        }
        ["$code"] => {
            as_str("$code", value("$code")).map(|s| ExtendedValue::Code(s.to_string()))
        }
        ["$code", "$scope"] => as_str("$code", value("$code")).and_then(|code| {
            match value("$scope") {
                Value::Object(scope) => Ok(ExtendedValue::CodeWithScope {
                    code: code.to_string(),
                    scope: to_document(scope.clone())?,
                }),
                other => Err(invalid("$scope", other)),
            }
        }),
        ["$minKey"] => Ok(ExtendedValue::MinKey),
        ["$maxKey"] => Ok(ExtendedValue::MaxKey),
        ["$undefined"] => Ok(ExtendedValue::Undefined),
        _ => return None,
    };
    Some(parsed)
}
