//! Error types for query construction and response parsing

/// Errors raised while building, executing or interpreting a search
#[derive(Debug, thiserror::Error)]
pub enum EsQueryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Aggregation '{name}' is already set on '{parent}'")]
    DuplicateName { parent: String, name: String },

    #[error("Unexpected response shape for aggregation '{aggregation}': missing '{missing}'")]
    ResponseShape { aggregation: String, missing: String },

    #[error("Invalid request parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("Config load error: {0}")]
    ConfigLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EsQueryError {
    pub(crate) fn duplicate(parent: &str, name: &str) -> Self {
        Self::DuplicateName {
            parent: parent.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn shape(aggregation: &str, missing: impl Into<String>) -> Self {
        Self::ResponseShape {
            aggregation: aggregation.to_string(),
            missing: missing.into(),
        }
    }

    /// Whether the error describes a request/response mismatch that lenient
    /// parsing is allowed to skip
    pub fn is_response_shape(&self) -> bool {
        matches!(self, Self::ResponseShape { .. })
    }
}
