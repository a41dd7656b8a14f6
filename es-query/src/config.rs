//! Runner configuration
//!
//! Every knob has a documented default; nothing is read from process-wide
//! state. Can be embedded in a larger TOML file or loaded on its own:
//!
//! ```toml
//! index = "my_content"
//! limit = 20
//! fulltext_param = "q"
//! fulltext_field = "text_combined"
//! strict = true
//! ```

use crate::error::EsQueryError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default request key holding the free-text search
pub const DEFAULT_FULLTEXT_PARAM: &str = "s";

/// Default request key holding the page number
pub const DEFAULT_PAGE_PARAM: &str = "page";

/// Default fuzziness of the injected free-text term
pub const DEFAULT_ROAMING: f64 = 0.8;

/// Default page size
pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Target index; execution fails while unset
    #[serde(default)]
    pub index: Option<String>,

    /// Document type written into the request envelope (default: "node")
    #[serde(default = "default_doc_type")]
    pub doc_type: String,

    /// Page size; `None` or `0` leaves `size`/`from` to the engine
    #[serde(default = "default_limit")]
    pub limit: Option<usize>,

    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Added to the raw page number: request pages are 0-based, engine pages 1-based
    #[serde(default = "default_page_delta")]
    pub page_delta: i64,

    #[serde(default = "default_fulltext_param")]
    pub fulltext_param: String,

    /// Field targeted by the free-text term; unfielded when unset
    #[serde(default)]
    pub fulltext_field: Option<String>,

    /// Fuzziness of the free-text term, between 0 and 1
    #[serde(default = "default_roaming")]
    pub fulltext_roaming: f64,

    /// Fail on aggregation fragments missing from the reply instead of skipping them
    #[serde(default)]
    pub strict: bool,
}

fn default_doc_type() -> String {
    "node".to_string()
}

fn default_limit() -> Option<usize> {
    Some(DEFAULT_LIMIT)
}

fn default_page_param() -> String {
    DEFAULT_PAGE_PARAM.to_string()
}

fn default_page_delta() -> i64 {
    1
}

fn default_fulltext_param() -> String {
    DEFAULT_FULLTEXT_PARAM.to_string()
}

fn default_roaming() -> f64 {
    DEFAULT_ROAMING
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            index: None,
            doc_type: default_doc_type(),
            limit: default_limit(),
            page_param: default_page_param(),
            page_delta: default_page_delta(),
            fulltext_param: default_fulltext_param(),
            fulltext_field: None,
            fulltext_roaming: default_roaming(),
            strict: false,
        }
    }
}

impl RunnerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| EsQueryError::ConfigLoad(e.to_string()))
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EsQueryError::ConfigLoad(e.to_string()))
    }

    /// Check the settings execution depends on
    pub fn validate(&self) -> Result<()> {
        match self.index.as_deref() {
            Some(index) if !index.trim().is_empty() => {}
            _ => {
                return Err(EsQueryError::Configuration(
                    "index must be set before execution".to_string(),
                ))
            }
        }
        if !(0.0..=1.0).contains(&self.fulltext_roaming) {
            return Err(EsQueryError::Configuration(format!(
                "fulltext_roaming must be between 0 and 1, got {}",
                self.fulltext_roaming
            )));
        }
        Ok(())
    }
}
