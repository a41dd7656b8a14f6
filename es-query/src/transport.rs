//! Transport seam
//!
//! Network access, retries and timeouts belong to the implementor; failures
//! are passed through to the caller unchanged.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Search request envelope handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub index: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,
}

impl SearchRequest {
    /// Envelope as JSON (`index`, `type`, `body`, `size?`, `from?`)
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Executes search requests against the engine
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Run `request` and return the engine's raw reply
    async fn search(&self, request: SearchRequest) -> anyhow::Result<Value>;
}
