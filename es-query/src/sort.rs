//! Sort clauses

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// How multi-valued fields are reduced before sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Min,
    Max,
    Avg,
    Sum,
    Median,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Median => "median",
        }
    }
}

/// Placement of documents missing the sort field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMissing {
    #[serde(rename = "_first")]
    First,
    #[serde(rename = "_last")]
    Last,
}

impl SortMissing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "_first",
            Self::Last => "_last",
        }
    }
}

/// One entry of the `sort` array
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    field: String,
    order: Option<SortOrder>,
    mode: Option<SortMode>,
    missing: Option<SortMissing>,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::new(Self::SCORE_FIELD)
    }
}

impl SortSpec {
    /// Relevance score pseudo-field
    pub const SCORE_FIELD: &'static str = "_score";

    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: None,
            mode: None,
            missing: None,
        }
    }

    pub fn with_order(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            order: Some(order),
            ..Self::new(field)
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::with_order(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::with_order(field, SortOrder::Desc)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn order(&self) -> Option<SortOrder> {
        self.order
    }

    pub fn mode(&self) -> Option<SortMode> {
        self.mode
    }

    pub fn missing(&self) -> Option<SortMissing> {
        self.missing
    }

    pub fn set_mode(&mut self, mode: Option<SortMode>) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn set_missing(&mut self, missing: Option<SortMissing>) -> &mut Self {
        self.missing = missing;
        self
    }

    /// Options object (`order`, `mode`, `missing`), empty when none is set
    pub fn options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        if let Some(order) = self.order {
            options.insert("order".into(), order.as_str().into());
        }
        if let Some(mode) = self.mode {
            options.insert("mode".into(), mode.as_str().into());
        }
        if let Some(missing) = self.missing {
            options.insert("missing".into(), missing.as_str().into());
        }
        options
    }

    /// Render as a `sort` array entry: the bare field name when no option is
    /// set, `{field: {options}}` otherwise
    pub fn render(&self) -> Value {
        let options = self.options();
        if options.is_empty() {
            return Value::String(self.field.clone());
        }

        let mut entry = Map::new();
        entry.insert(self.field.clone(), Value::Object(options));
        Value::Object(entry)
    }
}
