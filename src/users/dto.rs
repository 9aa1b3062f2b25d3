use anyhow::Context;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::store::{Document, Fields};

/// One user as last read from the store; `id` is the store's document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: i64,
}

/// The document payload of a user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserFields {
    pub name: String,
    pub email: String,
    #[serde(deserialize_with = "whole_number")]
    pub age: i64,
}

/// Integers pass through; doubles written by other clients are truncated.
fn whole_number<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let n = serde_json::Number::deserialize(d)?;
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
        _ => Err(serde::de::Error::custom(format!("age {n} is not an integer"))),
    }
}

impl UserFields {
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(self.name));
        fields.insert("email".into(), Value::String(self.email));
        fields.insert("age".into(), Value::from(self.age));
        fields
    }
}

impl UserRecord {
    pub fn from_document(doc: Document) -> anyhow::Result<Self> {
        let f: UserFields = serde_json::from_value(Value::Object(doc.fields))
            .with_context(|| format!("decode user document {}", doc.id))?;
        Ok(Self {
            id: doc.id,
            name: f.name,
            email: f.email,
            age: f.age,
        })
    }
}

#[cfg(test)]
mod dto_tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    fn doc(id: &str, fields: Value) -> Document {
        Document {
            id: id.into(),
            fields: fields.as_object().cloned().unwrap(),
            create_time: OffsetDateTime::UNIX_EPOCH,
            update_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn record_merges_id_with_payload() {
        let rec = UserRecord::from_document(doc(
            "k3y",
            json!({"name": "Alice", "email": "alice@x.com", "age": 30, "extra": true}),
        ))
        .unwrap();
        assert_eq!(
            rec,
            UserRecord {
                id: "k3y".into(),
                name: "Alice".into(),
                email: "alice@x.com".into(),
                age: 30,
            }
        );
    }

    #[test]
    fn whole_double_age_is_accepted() {
        let rec = UserRecord::from_document(doc(
            "d",
            json!({"name": "Bo", "email": "bo@x.com", "age": 44.0}),
        ))
        .unwrap();
        assert_eq!(rec.age, 44);
    }

    #[test]
    fn malformed_payload_names_the_document() {
        let err = UserRecord::from_document(doc("bad1", json!({"name": "NoAge"}))).unwrap_err();
        assert!(err.to_string().contains("bad1"));

        let err = UserRecord::from_document(doc(
            "bad2",
            json!({"name": "Text", "email": "t@x.com", "age": "thirty"}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("bad2"));
    }

    #[test]
    fn fields_payload_shape() {
        let fields = UserFields {
            name: "Alice".into(),
            email: "alice@x.com".into(),
            age: 30,
        }
        .into_fields();
        assert_eq!(
            Value::Object(fields),
            json!({"name": "Alice", "email": "alice@x.com", "age": 30})
        );
    }
}
