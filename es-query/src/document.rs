//! Hit documents

use serde::Serialize;
use serde_json::{Map, Value};

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    index: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<String>,
    id: Option<String>,
    score: f64,
    source: Map<String, Value>,
}

impl Document {
    /// Build from a raw `hits.hits[]` entry
    ///
    /// Missing metadata stays `None`, a missing or null score defaults to 1.
    pub fn from_hit(hit: &Value) -> Self {
        Self {
            index: meta_string(hit, "_index"),
            doc_type: meta_string(hit, "_type"),
            id: meta_string(hit, "_id"),
            score: hit.get("_score").and_then(Value::as_f64).unwrap_or(1.0),
            source: hit
                .get("_source")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Returned field, `None` when absent or null
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.source.get(name).filter(|v| !v.is_null())
    }

    pub fn source_field_names(&self) -> Vec<&str> {
        self.source.keys().map(String::as_str).collect()
    }
}

// Ids are strings on the wire but some clients send numbers
fn meta_string(hit: &Value, key: &str) -> Option<String> {
    match hit.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
