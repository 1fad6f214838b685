use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{Document, DocumentStore, StoreError};

/// In-process collections. Used when no Firestore project is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, collection: &str, doc: Document) {
        let mut map = self.collections.write();
        let docs = map.entry(collection.to_string()).or_default();
        docs.retain(|d| d.id != doc.id);
        docs.push(doc);
    }

    pub fn insert_fields(&self, collection: &str, id: &str, fields: Value) {
        let fields = match fields {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        self.insert(collection, Document::new(id, fields));
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        // Firestore orders numbers before strings
        (Value::Number(_), Value::String(_)) => Ordering::Less,
        (Value::String(_), Value::Number(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        Ok(self.collections.read().get(collection).map(|d| d.len() as u64).unwrap_or(0))
    }

    async fn list_recent(&self, collection: &str, order_by: &str, limit: usize) -> Result<Vec<Document>, StoreError> {
        let map = self.collections.read();
        let Some(docs) = map.get(collection) else { return Ok(Vec::new()); };
        let mut out: Vec<Document> = docs.iter().filter(|d| d.fields.contains_key(order_by)).cloned().collect();
        out.sort_by(|a, b| cmp_values(&b.fields[order_by], &a.fields[order_by]));
        out.truncate(limit);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn counts_per_collection() {
        let store = MemoryStore::new();
        assert_eq!(store.count("books").await.unwrap(), 0);
        store.insert_fields("books", "a", json!({}));
        store.insert_fields("books", "b", json!({}));
        store.insert_fields("books", "a", json!({"title": "replaced"}));
        store.insert_fields("authors", "x", json!({}));
        assert_eq!(store.count("books").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lists_newest_first_and_skips_unordered_docs() {
        let store = MemoryStore::new();
        store.insert_fields("books", "old", json!({"createdAt": "2025-01-01T00:00:00Z"}));
        store.insert_fields("books", "new", json!({"createdAt": "2025-06-01T00:00:00Z"}));
        store.insert_fields("books", "mid", json!({"createdAt": "2025-03-01T00:00:00Z"}));
        store.insert_fields("books", "none", json!({"title": "no timestamp"}));

        let ids: Vec<String> = store.list_recent("books", "createdAt", 2).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }
}
