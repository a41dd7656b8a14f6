//! Search response interpretation
//!
//! The raw reply is read with the originating [`Query`] as a template: the
//! aggregation request tree dictates the shape of the response tree, and each
//! node's bucket flag decides whether its fragment is read as a list of
//! buckets or as a metric payload. Nothing is inferred from the reply itself.

use crate::aggregation::AggregationNode;
use crate::document::Document;
use crate::error::EsQueryError;
use crate::query::Query;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// What to do when the reply lacks an aggregation fragment the request asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Fail the whole parse
    Strict,
    /// Skip the offending branch and keep going
    #[default]
    Lenient,
}

impl ParseMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Parsed aggregation result
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationResponse {
    Bucket(BucketResponse),
    Metric(MetricResponse),
}

impl AggregationResponse {
    pub fn name(&self) -> &str {
        match self {
            Self::Bucket(b) => &b.name,
            Self::Metric(m) => &m.name,
        }
    }

    /// Raw fragment as returned by the engine
    pub fn raw(&self) -> &Value {
        match self {
            Self::Bucket(b) => &b.raw,
            Self::Metric(m) => &m.raw,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw().get(key)
    }

    pub fn is_bucket(&self) -> bool {
        matches!(self, Self::Bucket(_))
    }

    pub fn as_bucket(&self) -> Option<&BucketResponse> {
        match self {
            Self::Bucket(b) => Some(b),
            Self::Metric(_) => None,
        }
    }

    pub fn as_metric(&self) -> Option<&MetricResponse> {
        match self {
            Self::Metric(m) => Some(m),
            Self::Bucket(_) => None,
        }
    }

    /// Direct sub-results: every child of every bucket, or the metric children
    fn nested(&self) -> Vec<&Arc<AggregationResponse>> {
        match self {
            Self::Bucket(b) => b.buckets.iter().flat_map(|bucket| &bucket.children).collect(),
            Self::Metric(m) => m.children.iter().flatten().collect(),
        }
    }
}

/// Result of a bucket aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct BucketResponse {
    name: String,
    raw: Value,
    buckets: Vec<Bucket>,
}

impl BucketResponse {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// One bucket with its sub-aggregation results
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    raw: Value,
    children: Vec<Arc<AggregationResponse>>,
}

impl Bucket {
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn key(&self) -> Option<&Value> {
        self.get("key")
    }

    pub fn doc_count(&self) -> Option<u64> {
        self.get("doc_count").and_then(Value::as_u64)
    }

    /// Sub-aggregation results in request order
    pub fn children(&self) -> &[Arc<AggregationResponse>] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&AggregationResponse> {
        find_child(&self.children, name)
    }
}

/// Result of a metric aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResponse {
    name: String,
    raw: Value,
    children: Option<Vec<Arc<AggregationResponse>>>,
}

impl MetricResponse {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Single-value metrics (`avg`, `value_count`, ...) report under `value`
    pub fn value(&self) -> Option<f64> {
        self.get("value").and_then(Value::as_f64)
    }

    /// Sub-aggregation results, `None` when the request node had no children
    pub fn children(&self) -> Option<&[Arc<AggregationResponse>]> {
        self.children.as_deref()
    }

    pub fn child(&self, name: &str) -> Option<&AggregationResponse> {
        self.children
            .as_deref()
            .and_then(|children| find_child(children, name))
    }
}

fn find_child<'a>(
    children: &'a [Arc<AggregationResponse>],
    name: &str,
) -> Option<&'a AggregationResponse> {
    children.iter().find(|c| c.name() == name).map(Arc::as_ref)
}

/// Build the response subtree of `node` from its raw fragment
pub fn build_aggregation(
    node: &AggregationNode,
    fragment: &Value,
    mode: ParseMode,
) -> Result<AggregationResponse> {
    if node.is_bucket_kind() {
        let entries = bucket_entries(fragment)
            .ok_or_else(|| EsQueryError::shape(node.name(), "buckets"))?;

        let mut buckets = Vec::with_capacity(entries.len());
        for raw in entries {
            let children = build_children(node, &raw, mode)?;
            buckets.push(Bucket { raw, children });
        }

        Ok(AggregationResponse::Bucket(BucketResponse {
            name: node.name().to_string(),
            raw: fragment.clone(),
            buckets,
        }))
    } else {
        let children = if node.has_children() {
            Some(build_children(node, fragment, mode)?)
        } else {
            None
        };

        Ok(AggregationResponse::Metric(MetricResponse {
            name: node.name().to_string(),
            raw: fragment.clone(),
            children,
        }))
    }
}

// Buckets come as an array, or as an object keyed by bucket key when the
// request sets `keyed: true`
fn bucket_entries(fragment: &Value) -> Option<Vec<Value>> {
    match fragment.get("buckets")? {
        Value::Array(items) => Some(items.clone()),
        Value::Object(keyed) => Some(
            keyed
                .iter()
                .map(|(key, bucket)| {
                    let mut bucket = bucket.clone();
                    if let Value::Object(map) = &mut bucket {
                        if !map.contains_key("key") {
                            map.insert("key".into(), Value::String(key.clone()));
                        }
                    }
                    bucket
                })
                .collect(),
        ),
        _ => None,
    }
}

fn build_children(
    node: &AggregationNode,
    fragment: &Value,
    mode: ParseMode,
) -> Result<Vec<Arc<AggregationResponse>>> {
    let mut children = Vec::with_capacity(node.children().len());

    for child in node.children() {
        let built = match fragment.get(child.name()) {
            Some(child_fragment) => build_aggregation(child, child_fragment, mode),
            None => Err(EsQueryError::shape(node.name(), child.name())),
        };

        match built {
            Ok(response) => children.push(Arc::new(response)),
            Err(e) => skip_or_fail(mode, e)?,
        }
    }

    Ok(children)
}

fn skip_or_fail(mode: ParseMode, error: EsQueryError) -> Result<()> {
    if mode == ParseMode::Lenient {
        if let EsQueryError::ResponseShape { aggregation, missing } = &error {
            warn!(%aggregation, %missing, "skipping aggregation missing from response");
            return Ok(());
        }
    }
    Err(error)
}

/// Parsed search reply
#[derive(Debug, Clone)]
pub struct Response {
    total: Option<u64>,
    max_score: Option<f64>,
    documents: Vec<Document>,
    aggregations: Vec<Arc<AggregationResponse>>,
    index: HashMap<String, Vec<Arc<AggregationResponse>>>,
    raw: Value,
}

impl Response {
    /// Parse `raw` using the aggregation tree of `query` as template
    pub fn parse(query: &Query, raw: Value, mode: ParseMode) -> Result<Self> {
        let hits = raw.get("hits");

        let total = hits.and_then(|h| h.get("total")).and_then(|total| match total {
            Value::Object(t) => t.get("value").and_then(Value::as_u64),
            other => other.as_u64(),
        });
        let max_score = hits
            .and_then(|h| h.get("max_score"))
            .and_then(Value::as_f64);
        let documents = hits
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Document::from_hit).collect())
            .unwrap_or_default();

        let empty = Map::new();
        let fragments = raw
            .get("aggregations")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let mut aggregations = Vec::with_capacity(query.aggregations().len());
        for node in query.aggregations() {
            let built = match fragments.get(node.name()) {
                Some(fragment) => build_aggregation(node, fragment, mode),
                None => Err(EsQueryError::shape(
                    node.name(),
                    format!("aggregations.{}", node.name()),
                )),
            };

            match built {
                Ok(response) => aggregations.push(Arc::new(response)),
                Err(e) => skip_or_fail(mode, e)?,
            }
        }

        let mut index = HashMap::new();
        for response in &aggregations {
            index_tree(&mut index, response);
        }

        Ok(Self {
            total,
            max_score,
            documents,
            aggregations,
            index,
            raw,
        })
    }

    /// Total number of matching documents
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    pub fn has_hits(&self) -> bool {
        !self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Top-level aggregation results in request order
    pub fn roots(&self) -> &[Arc<AggregationResponse>] {
        &self.aggregations
    }

    /// Every result named `name`, anywhere in the tree, in depth-first order
    pub fn aggregations_named(&self, name: &str) -> &[Arc<AggregationResponse>] {
        self.index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First result named `name`
    pub fn aggregation(&self, name: &str) -> Option<&AggregationResponse> {
        self.aggregations_named(name).first().map(Arc::as_ref)
    }

    /// Flattened name index
    pub fn aggregation_index(&self) -> &HashMap<String, Vec<Arc<AggregationResponse>>> {
        &self.index
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

fn index_tree(
    index: &mut HashMap<String, Vec<Arc<AggregationResponse>>>,
    response: &Arc<AggregationResponse>,
) {
    index
        .entry(response.name().to_string())
        .or_default()
        .push(Arc::clone(response));

    for nested in response.nested() {
        index_tree(index, nested);
    }
}
