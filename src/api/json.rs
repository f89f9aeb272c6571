//! BSON to client JSON: ObjectIds become hex strings and dates RFC 3339.

use crate::utils::AppError;
use mongodb::bson::{to_document, Bson, Document};
use serde::Serialize;
use serde_json::{Map, Number, Value};

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(dt.try_to_rfc3339_string().unwrap_or_else(|_| dt.to_string())),
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(v) => Value::from(v),
        Bson::Int64(v) => Value::from(v),
        Bson::Double(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

pub fn document_to_json(doc: Document) -> Value {
    Value::Object(doc.into_iter().map(|(k, v)| (k, bson_to_json(v))).collect::<Map<_, _>>())
}

pub fn documents_to_json(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(document_to_json).collect())
}

/// Serializes a stored model the way it is kept in the database.
pub fn model<T: Serialize>(model: &T) -> Result<Value, AppError> {
    to_document(model)
        .map(document_to_json)
        .map_err(|e| AppError::Internal(format!("failed to encode response: {}", e)))
}

pub fn models<T: Serialize>(items: &[T]) -> Result<Value, AppError> {
    items.iter().map(model).collect::<Result<Vec<_>, _>>().map(Value::Array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};

    #[test]
    fn test_ids_and_dates_are_strings() {
        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        let json = document_to_json(doc! {
            "_id": oid,
            "classesId": [oid],
            "date": DateTime::from_millis(0),
            "price": 12.5,
            "seats": 3_i64,
        });
        assert_eq!(
            json,
            serde_json::json!({
                "_id": "65a1b2c3d4e5f60718293a4b",
                "classesId": ["65a1b2c3d4e5f60718293a4b"],
                "date": "1970-01-01T00:00:00Z",
                "price": 12.5,
                "seats": 3,
            })
        );
    }
}
