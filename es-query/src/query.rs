//! Search query and its wire body
//!
//! A [`Query`] owns three Lucene clauses (query, filter, post-filter), the
//! sort list, the source projection and the top-level aggregations. It
//! renders into the engine's search body with [`Query::to_body`]:
//!
//! | query   | filter  | `query` key                                           |
//! |---------|---------|-------------------------------------------------------|
//! | empty   | empty   | `match_all`                                           |
//! | set     | empty   | `query_string`                                        |
//! | empty   | set     | `constant_score` over a cached `fquery`               |
//! | set     | set     | `filtered` (`query_string` + cached `fquery` filter)  |
//!
//! The post-filter is applied by the engine after aggregations are
//! computed, so facet counts ignore it while the hit list honors it.

use crate::aggregation::{insert_unique, render_all, AggregationNode, FacetRun};
use crate::lucene::LuceneQuery;
use crate::merge::merge_into;
use crate::params::RequestParams;
use crate::sort::SortSpec;
use crate::Result;
use serde_json::{json, Map, Value};

/// Parent name reported for duplicate top-level aggregations
const ROOT_NAME: &str = "query";

/// `_source` projection state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceFields {
    /// Engine default, every stored field is returned
    #[default]
    All,
    /// Only these fields
    Fields(Vec<String>),
    /// Source fetching disabled
    Disabled,
}

impl SourceFields {
    /// `_source` value for this projection, `None` when the engine default applies
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::All => None,
            Self::Fields(fields) => Some(json!(fields)),
            Self::Disabled => Some(Value::Bool(false)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    query: LuceneQuery,
    filter: LuceneQuery,
    post_filter: LuceneQuery,
    sorts: Vec<SortSpec>,
    source: SourceFields,
    aggregations: Vec<AggregationNode>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-text clause, scored
    pub fn query(&self) -> &LuceneQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut LuceneQuery {
        &mut self.query
    }

    /// Filter clause, unscored and cacheable
    pub fn filter(&self) -> &LuceneQuery {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut LuceneQuery {
        &mut self.filter
    }

    /// Post-filter clause, applied after aggregations
    pub fn post_filter(&self) -> &LuceneQuery {
        &self.post_filter
    }

    pub fn post_filter_mut(&mut self) -> &mut LuceneQuery {
        &mut self.post_filter
    }

    pub fn add_sort(&mut self, sort: SortSpec) -> &mut Self {
        self.sorts.push(sort);
        self
    }

    pub fn sorts(&self) -> &[SortSpec] {
        &self.sorts
    }

    /// Add fields to the projection, ignoring names already present
    ///
    /// Re-enables the projection if source was disabled.
    pub fn add_source_fields<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields = match std::mem::take(&mut self.source) {
            SourceFields::Fields(fields) => fields,
            SourceFields::All | SourceFields::Disabled => Vec::new(),
        };
        for name in names {
            let name = name.into();
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        self.source = if fields.is_empty() {
            SourceFields::All
        } else {
            SourceFields::Fields(fields)
        };
        self
    }

    pub fn add_source_field(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_source_fields([name.into()])
    }

    pub fn disable_source(&mut self) -> &mut Self {
        self.source = SourceFields::Disabled;
        self
    }

    pub fn source_fields(&self) -> &SourceFields {
        &self.source
    }

    /// Add a top-level aggregation, rejecting names already in use
    pub fn add_aggregation(&mut self, aggregation: AggregationNode) -> Result<&mut Self> {
        insert_unique(&mut self.aggregations, ROOT_NAME, aggregation)?;
        Ok(self)
    }

    pub fn has_aggregations(&self) -> bool {
        !self.aggregations.is_empty()
    }

    /// Top-level aggregations in insertion order
    pub fn aggregations(&self) -> &[AggregationNode] {
        &self.aggregations
    }

    pub fn aggregation(&self, name: &str) -> Option<&AggregationNode> {
        self.aggregations.iter().find(|a| a.name() == name)
    }

    /// Run every top-level facet against this query
    pub fn apply_facets(&mut self, params: &RequestParams) {
        let facets: Vec<FacetRun> = self
            .aggregations
            .iter()
            .filter_map(AggregationNode::facet_run)
            .collect();

        for facet in facets {
            facet.run(self, params);
        }
    }

    /// Render the search body
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), self.render_query());

        if !self.post_filter.is_empty() {
            body.insert(
                "post_filter".into(),
                query_string(&self.post_filter.to_string()),
            );
        }

        if !self.sorts.is_empty() {
            body.insert(
                "sort".into(),
                Value::Array(self.sorts.iter().map(SortSpec::render).collect()),
            );
        }

        if self.has_aggregations() {
            body.insert("aggs".into(), render_all(&self.aggregations));
        }

        Value::Object(body)
    }

    /// Render the search body and merge `overrides` on top of it
    ///
    /// Conflicting keys are squashed by the override.
    pub fn to_body_with(&self, overrides: &Value) -> Value {
        let mut body = self.to_body();
        merge_into(&mut body, overrides.clone());
        body
    }

    fn render_query(&self) -> Value {
        match (self.query.is_empty(), self.filter.is_empty()) {
            (true, true) => json!({"match_all": []}),
            (false, true) => query_string(&self.query.to_string()),
            (true, false) => json!({
                "constant_score": {
                    "filter": cached_filter(&self.filter.to_string()),
                },
            }),
            (false, false) => json!({
                "filtered": {
                    "query": query_string(&self.query.to_string()),
                    "filter": cached_filter(&self.filter.to_string()),
                },
            }),
        }
    }
}

fn query_string(text: &str) -> Value {
    json!({"query_string": {"query": text}})
}

fn cached_filter(text: &str) -> Value {
    json!({
        "fquery": {
            "query": query_string(text),
            "_cache": true,
        },
    })
}
