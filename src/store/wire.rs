//! JSON shapes of the document store's REST API.
//!
//! Shared by [`super::firestore::FirestoreStore`] (client side) and the
//! emulator (server side) so both ends agree on one encoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;
use time::OffsetDateTime;

use super::{Document, Fields};

/// A typed field value, externally tagged the way the REST API encodes it
/// (`{"stringValue": "Alice"}`, `{"integerValue": "30"}`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(#[serde(with = "int64")] i64),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

/// int64 travels as a decimal string; some producers send a bare number.
mod int64 {
    use super::*;

    pub fn serialize<S: Serializer>(v: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }
        match Repr::deserialize(d)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl From<&Json> for Value {
    fn from(v: &Json) -> Self {
        match v {
            Json::Null => Value::NullValue(()),
            Json::Bool(b) => Value::BooleanValue(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::IntegerValue(i),
                None => Value::DoubleValue(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::StringValue(s.clone()),
            Json::Array(items) => Value::ArrayValue(ArrayValue {
                values: items.iter().map(Value::from).collect(),
            }),
            Json::Object(map) => Value::MapValue(MapValue {
                fields: encode_fields(map),
            }),
        }
    }
}

impl Value {
    /// Plain JSON view of the value. Non-finite doubles have no JSON form and
    /// come back as `null`.
    pub fn into_json(self) -> Json {
        match self {
            Value::NullValue(()) => Json::Null,
            Value::BooleanValue(b) => Json::Bool(b),
            Value::IntegerValue(i) => Json::from(i),
            Value::DoubleValue(f) => serde_json::Number::from_f64(f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::TimestampValue(s)
            | Value::StringValue(s)
            | Value::BytesValue(s)
            | Value::ReferenceValue(s) => Json::String(s),
            Value::GeoPointValue(p) => serde_json::json!({
                "latitude": p.latitude,
                "longitude": p.longitude,
            }),
            Value::ArrayValue(a) => Json::Array(a.values.into_iter().map(Value::into_json).collect()),
            Value::MapValue(m) => Json::Object(decode_fields(m.fields)),
        }
    }
}

pub fn encode_fields(fields: &Fields) -> BTreeMap<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v)))
        .collect()
}

pub fn decode_fields(fields: BTreeMap<String, Value>) -> Fields {
    fields.into_iter().map(|(k, v)| (k, v.into_json())).collect()
}

/// A document resource. `name` is the full resource path; the document id is
/// its last segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub create_time: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub update_time: Option<OffsetDateTime>,
}

impl WireDocument {
    pub fn from_document(doc: &Document, parent: &str) -> Self {
        Self {
            name: format!("{}/{}", parent, doc.id),
            fields: encode_fields(&doc.fields),
            create_time: Some(doc.create_time),
            update_time: Some(doc.update_time),
        }
    }

    pub fn id(&self) -> &str {
        id_from_name(&self.name)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<WireDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorStatus {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

impl ErrorEnvelope {
    pub fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorStatus {
                code: http_status_for(status),
                message: message.into(),
                status: status.to_string(),
            },
        }
    }
}

pub fn collection_path(project: &str, database: &str, collection: &str) -> String {
    format!("projects/{project}/databases/{database}/documents/{collection}")
}

pub fn id_from_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// `NOT_FOUND` -> `not-found`, the spelling client code matches on.
pub fn status_to_code(status: &str) -> String {
    status.to_ascii_lowercase().replace('_', "-")
}

/// `not-found` -> `NOT_FOUND`.
pub fn code_to_status(code: &str) -> String {
    code.to_ascii_uppercase().replace('-', "_")
}

pub fn http_status_for(status: &str) -> u16 {
    match status {
        "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "OUT_OF_RANGE" => 400,
        "UNAUTHENTICATED" => 401,
        "PERMISSION_DENIED" => 403,
        "NOT_FOUND" => 404,
        "ALREADY_EXISTS" | "ABORTED" => 409,
        "RESOURCE_EXHAUSTED" => 429,
        "CANCELLED" => 499,
        "UNIMPLEMENTED" => 501,
        "UNAVAILABLE" => 503,
        "DEADLINE_EXCEEDED" => 504,
        _ => 500,
    }
}
