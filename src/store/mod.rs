//! Document backend used by the dispatcher. Only two reads are needed: counting a
//! collection and listing its newest documents.

mod firestore;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use firestore::{FirestoreStore, decode_value};
pub use memory::MemoryStore;

/// Field used to order resource listings, newest first.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Maximum number of documents returned by a listing.
pub const RECENT_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected store response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new<S: Into<String>>(id: S, fields: Map<String, Value>) -> Self {
        Self { id: id.into(), fields }
    }

    /// `{id, ...fields}`; a stored `id` field wins over the document id.
    pub fn to_json(&self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 1);
        out.insert("id".into(), Value::String(self.id.clone()));
        for (k, v) in self.fields.iter() {
            out.insert(k.clone(), v.clone());
        }
        Value::Object(out)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    /// Documents that carry `order_by`, sorted by it descending, at most `limit`.
    async fn list_recent(&self, collection: &str, order_by: &str, limit: usize) -> Result<Vec<Document>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_id_field_overrides_document_id() {
        let fields = json!({"id": "custom", "title": "Coping"}).as_object().cloned().unwrap();
        let doc = Document::new("abc", fields);
        assert_eq!(doc.to_json(), json!({"id": "custom", "title": "Coping"}));

        let plain = Document::new("abc", Map::new());
        assert_eq!(plain.to_json(), json!({"id": "abc"}));
    }
}
