use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value};

/// A normalized document: public string `id` first, no `_id`.
pub type Record = Document;

/// Renames the store-internal `_id` to a string `id`. Documents without an
/// `_id` pass through untouched.
pub fn normalize(mut doc: Document) -> Record {
    let Some(raw_id) = doc.remove("_id") else {
        return doc;
    };

    let mut record = Document::new();
    record.insert("id", id_to_string(&raw_id));
    for (key, value) in doc {
        record.insert(key, value);
    }
    record
}

pub fn normalize_all(docs: Vec<Document>) -> Vec<Record> {
    docs.into_iter().map(normalize).collect()
}

fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Plain JSON for API responses: datetimes as RFC 3339, object ids as hex.
pub fn record_to_json(record: &Record) -> Value {
    let map: Map<String, Value> = record
        .iter()
        .map(|(key, value)| (key.clone(), bson_to_json(value)))
        .collect();
    Value::Object(map)
}

pub fn records_to_json(records: &[Record]) -> Vec<Value> {
    records.iter().map(record_to_json).collect()
}

fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Document(doc) => record_to_json(doc),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        other => other.clone().into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};
    use serde_json::json;

    #[test]
    fn test_normalize_object_id() {
        let oid = ObjectId::new();
        let record = normalize(doc! { "_id": oid, "username": "ana" });
        assert!(record.get("_id").is_none());
        assert_eq!(record.get_str("id").unwrap(), oid.to_hex());
        assert_eq!(record.keys().next().map(String::as_str), Some("id"));
        assert_eq!(record.get_str("username").unwrap(), "ana");
    }

    #[test]
    fn test_normalize_without_id() {
        let record = normalize(doc! { "total": 3 });
        assert!(record.get("id").is_none());
        assert_eq!(record.get_i32("total").unwrap(), 3);
    }

    #[test]
    fn test_normalize_non_object_id() {
        let record = normalize(doc! { "_id": "ana", "count": 2 });
        assert_eq!(record.get_str("id").unwrap(), "ana");
        let record = normalize(doc! { "_id": Bson::Null, "count": 2 });
        assert_eq!(record.get_str("id").unwrap(), "null");
    }

    #[test]
    fn test_record_to_json() {
        let created = DateTime::from_millis(0);
        let nested = ObjectId::new();
        let record = doc! {
            "id": "abc",
            "created_on": created,
            "owner": nested,
            "tags": ["a", "b"],
            "meta": { "views": 5_i64 },
            "email": Bson::Null,
        };
        let value = record_to_json(&record);
        assert_eq!(value["created_on"], json!("1970-01-01T00:00:00Z"));
        assert_eq!(value["owner"], json!(nested.to_hex()));
        assert_eq!(value["tags"], json!(["a", "b"]));
        assert_eq!(value["meta"]["views"], json!(5));
        assert_eq!(value["email"], Value::Null);
    }
}
