//! Firestore REST client (v1 `runQuery` / `runAggregationQuery`).
//!
//! Works against production Firestore with a bearer token, or against the local emulator when
//! an emulator host is configured. Documents come back in Firestore's typed value encoding and
//! are flattened to plain JSON by [`decode_value`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::FirestoreSettings;

use super::{Document, DocumentStore, StoreError};

const PRODUCTION_BASE: &str = "https://firestore.googleapis.com/v1";
// The emulator accepts this token as an admin credential and skips security rules.
const EMULATOR_TOKEN: &str = "owner";

pub struct FirestoreStore {
    client: reqwest::Client,
    documents_url: String,
    token: Option<String>,
}

impl FirestoreStore {
    pub fn new(client: reqwest::Client, project_id: &str, emulator_host: Option<&str>, token: Option<String>) -> Self {
        let base = match emulator_host {
            Some(host) => format!("http://{}/v1", host.trim_end_matches('/')),
            None => PRODUCTION_BASE.to_string(),
        };
        let token = token.or_else(|| emulator_host.map(|_| EMULATOR_TOKEN.to_string()));
        Self {
            client,
            documents_url: format!("{}/projects/{}/databases/(default)/documents", base, project_id),
            token,
        }
    }

    /// Build from settings; `None` when no project is configured.
    pub fn from_settings(client: reqwest::Client, s: &FirestoreSettings) -> Option<Self> {
        let project = s.project_id.as_deref()?;
        Some(Self::new(client, project, s.emulator_host.as_deref(), s.token.clone()))
    }

    pub fn documents_url(&self) -> &str { &self.documents_url }

    async fn post(&self, action: &str, body: Value) -> Result<Value, StoreError> {
        let url = format!("{}:{}", self.documents_url, action);
        let mut req = self.client.post(&url).json(&body);
        if let Some(t) = self.token.as_deref() {
            req = req.bearer_auth(t);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status { status: status.as_u16(), body });
        }
        Ok(resp.json::<Value>().await?)
    }

    async fn run_query(&self, structured: Value) -> Result<Vec<Document>, StoreError> {
        let raw = self.post("runQuery", json!({ "structuredQuery": structured })).await?;
        let rows: Vec<RunQueryRow> = serde_json::from_value(raw).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.into_iter().filter_map(|r| r.document).map(FsDocument::into_document).collect())
    }

    async fn aggregate_count(&self, collection: &str) -> Result<u64, StoreError> {
        let body = json!({
            "structuredAggregationQuery": {
                "structuredQuery": { "from": [{ "collectionId": collection }] },
                "aggregations": [{ "alias": "count", "count": {} }]
            }
        });
        let raw = self.post("runAggregationQuery", body).await?;
        let rows: Vec<AggregationRow> = serde_json::from_value(raw).map_err(|e| StoreError::Decode(e.to_string()))?;
        let field = rows
            .into_iter()
            .find_map(|r| r.result)
            .and_then(|r| r.aggregate_fields.get("count").cloned())
            .ok_or_else(|| StoreError::Decode("aggregation result without count".into()))?;
        match decode_value(&field) {
            Value::Number(n) => n.as_u64().ok_or_else(|| StoreError::Decode(format!("bad count {n}"))),
            other => Err(StoreError::Decode(format!("bad count {other}"))),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        match self.aggregate_count(collection).await {
            Ok(n) => Ok(n),
            Err(e) => {
                // Older backends reject aggregation queries; count a full listing instead.
                warn!(target: "store", collection, "aggregation count failed, listing instead: {e}");
                let docs = self.run_query(json!({ "from": [{ "collectionId": collection }] })).await?;
                Ok(docs.len() as u64)
            }
        }
    }

    async fn list_recent(&self, collection: &str, order_by: &str, limit: usize) -> Result<Vec<Document>, StoreError> {
        let docs = self
            .run_query(json!({
                "from": [{ "collectionId": collection }],
                "orderBy": [{ "field": { "fieldPath": order_by }, "direction": "DESCENDING" }],
                "limit": limit
            }))
            .await?;
        debug!(target: "store", collection, returned = docs.len(), "listed recent documents");
        Ok(docs)
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    #[serde(default)]
    document: Option<FsDocument>,
}

#[derive(Debug, Deserialize)]
struct FsDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FsDocument {
    fn into_document(self) -> Document {
        let id = self.name.rsplit('/').next().unwrap_or_default().to_string();
        let fields = self.fields.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect();
        Document { id, fields }
    }
}

#[derive(Debug, Deserialize)]
struct AggregationRow {
    #[serde(default)]
    result: Option<AggregationResult>,
}

#[derive(Debug, Deserialize)]
struct AggregationResult {
    #[serde(rename = "aggregateFields", default)]
    aggregate_fields: Map<String, Value>,
}

/// Flatten one Firestore typed value (`{"stringValue": "x"}`, `{"mapValue": {...}}`, ...) to JSON.
/// Timestamps, bytes and references stay strings; geo points become `{latitude, longitude}`.
pub fn decode_value(v: &Value) -> Value {
    let Some(obj) = v.as_object() else { return v.clone(); };
    let Some((kind, inner)) = obj.iter().next() else { return Value::Null; };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or_else(|_| inner.clone()),
            _ => inner.clone(),
        },
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => {
            let values = inner.get("values").and_then(|x| x.as_array()).cloned().unwrap_or_default();
            Value::Array(values.iter().map(decode_value).collect())
        }
        "mapValue" => {
            let fields = inner.get("fields").and_then(|x| x.as_object()).cloned().unwrap_or_default();
            Value::Object(fields.iter().map(|(k, x)| (k.clone(), decode_value(x))).collect())
        }
        _ => inner.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nested_typed_values() {
        let raw = json!({
            "mapValue": { "fields": {
                "title": { "stringValue": "Headspace" },
                "rating": { "integerValue": "4" },
                "score": { "doubleValue": 4.5 },
                "free": { "booleanValue": true },
                "createdAt": { "timestampValue": "2025-09-01T10:00:00Z" },
                "tags": { "arrayValue": { "values": [ { "stringValue": "sleep" }, { "nullValue": null } ] } },
                "where": { "geoPointValue": { "latitude": -37.8, "longitude": 144.9 } },
                "empty": { "arrayValue": {} }
            } }
        });
        assert_eq!(
            decode_value(&raw),
            json!({
                "title": "Headspace",
                "rating": 4,
                "score": 4.5,
                "free": true,
                "createdAt": "2025-09-01T10:00:00Z",
                "tags": ["sleep", null],
                "where": { "latitude": -37.8, "longitude": 144.9 },
                "empty": []
            })
        );
    }

    #[test]
    fn document_id_is_last_path_segment() {
        let doc = FsDocument {
            name: "projects/p/databases/(default)/documents/books/abc123".into(),
            fields: json!({ "title": { "stringValue": "x" } }).as_object().cloned().unwrap(),
        };
        let d = doc.into_document();
        assert_eq!(d.id, "abc123");
        assert_eq!(d.fields["title"], json!("x"));
    }

    #[test]
    fn emulator_host_switches_base_url_and_token() {
        let store = FirestoreStore::new(reqwest::Client::new(), "demo", Some("localhost:8081"), None);
        assert_eq!(store.documents_url(), "http://localhost:8081/v1/projects/demo/databases/(default)/documents");
        assert_eq!(store.token.as_deref(), Some("owner"));

        let prod = FirestoreStore::new(reqwest::Client::new(), "demo", None, None);
        assert!(prod.documents_url().starts_with("https://firestore.googleapis.com/v1/projects/demo/"));
        assert!(prod.token.is_none());
    }

    #[test]
    fn run_query_rows_without_document_are_skipped() {
        let rows: Vec<RunQueryRow> = serde_json::from_value(json!([
            { "readTime": "2025-01-01T00:00:00Z" },
            { "document": { "name": "a/b/books/1", "fields": {} }, "readTime": "2025-01-01T00:00:00Z" }
        ]))
        .unwrap();
        let docs: Vec<Document> = rows.into_iter().filter_map(|r| r.document).map(FsDocument::into_document).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "1");
    }
}
