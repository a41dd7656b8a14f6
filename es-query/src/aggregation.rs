//! Request-side aggregation tree
//!
//! A single data-driven node type covers the whole engine catalog: the type
//! tag names the engine feature (`terms`, `date_histogram`, `top_hits`, ...)
//! and the parameters are passed through untouched. Whether the engine
//! answers with buckets or a metric payload is declared on the node, and
//! drives response parsing.

use crate::error::EsQueryError;
use crate::lucene::TermValue;
use crate::params::RequestParams;
use crate::query::Query;
use crate::Result;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Callback applying user input to a query when the aggregation acts as a facet
pub type FacetHook = Arc<dyn Fn(&mut Query, &RequestParams) + Send + Sync>;

/// One aggregation of the request tree
#[derive(Clone)]
pub struct AggregationNode {
    name: String,
    type_tag: String,
    parameters: Value,
    meta: Map<String, Value>,
    bucket_kind: bool,
    apply_on_post_filter: bool,
    facet_hook: Option<FacetHook>,
    param_facet: Option<ParamFacet>,
    children: Vec<AggregationNode>,
}

/// Request parameter matched on a field by the node's own facet
#[derive(Debug, Clone, PartialEq)]
struct ParamFacet {
    field: String,
    param: String,
}

/// Owned copy of a node's facet behavior, runnable while the query is
/// borrowed mutably
#[derive(Clone)]
pub(crate) struct FacetRun {
    name: String,
    hook: Option<FacetHook>,
    param_facet: Option<ParamFacet>,
    on_post_filter: bool,
}

impl FacetRun {
    pub(crate) fn run(&self, query: &mut Query, params: &RequestParams) {
        debug!(aggregation = %self.name, "applying facet");
        if let Some(hook) = &self.hook {
            hook(query, params);
        }
        if let Some(facet) = &self.param_facet {
            match_param(query, params, &facet.field, &facet.param, self.on_post_filter);
        }
    }
}

impl fmt::Debug for AggregationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationNode")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .field("parameters", &self.parameters)
            .field("meta", &self.meta)
            .field("bucket_kind", &self.bucket_kind)
            .field("apply_on_post_filter", &self.apply_on_post_filter)
            .field("facet_hook", &self.facet_hook.is_some())
            .field("param_facet", &self.param_facet)
            .field("children", &self.children)
            .finish()
    }
}

impl AggregationNode {
    /// Metric aggregation with empty parameters
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            parameters: Value::Object(Map::new()),
            meta: Map::new(),
            bucket_kind: false,
            apply_on_post_filter: false,
            facet_hook: None,
            param_facet: None,
            children: Vec::new(),
        }
    }

    /// Bucket aggregation with empty parameters
    pub fn bucket(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            bucket_kind: true,
            ..Self::new(name, type_tag)
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_facet<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Query, &RequestParams) + Send + Sync + 'static,
    {
        self.facet_hook = Some(Arc::new(hook));
        self
    }

    /// Use this node as a facet on request parameter `param`, matched on `field`
    ///
    /// The term goes to the post-filter or to the filter depending on the
    /// node's `apply_on_post_filter` flag at execution time.
    pub fn with_request_param_facet(
        mut self,
        field: impl Into<String>,
        param: impl Into<String>,
    ) -> Self {
        self.set_request_param_facet(field, param);
        self
    }

    pub fn with_apply_on_post_filter(mut self, toggle: bool) -> Self {
        self.apply_on_post_filter = toggle;
        self
    }

    pub fn with_child(mut self, child: AggregationNode) -> Result<Self> {
        self.add_child(child)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn is_bucket_kind(&self) -> bool {
        self.bucket_kind
    }

    pub fn applies_on_post_filter(&self) -> bool {
        self.apply_on_post_filter
    }

    pub fn facet_hook(&self) -> Option<&FacetHook> {
        self.facet_hook.as_ref()
    }

    pub fn set_parameters(&mut self, parameters: Value) -> &mut Self {
        self.parameters = parameters;
        self
    }

    pub fn set_meta(&mut self, meta: Map<String, Value>) -> &mut Self {
        self.meta = meta;
        self
    }

    pub fn set_bucket_kind(&mut self, toggle: bool) -> &mut Self {
        self.bucket_kind = toggle;
        self
    }

    pub fn set_apply_on_post_filter(&mut self, toggle: bool) -> &mut Self {
        self.apply_on_post_filter = toggle;
        self
    }

    pub fn set_facet_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Query, &RequestParams) + Send + Sync + 'static,
    {
        self.facet_hook = Some(Arc::new(hook));
        self
    }

    pub fn set_request_param_facet(
        &mut self,
        field: impl Into<String>,
        param: impl Into<String>,
    ) -> &mut Self {
        self.param_facet = Some(ParamFacet {
            field: field.into(),
            param: param.into(),
        });
        self
    }

    /// Whether applying facets can touch the query
    pub fn has_facet(&self) -> bool {
        self.facet_hook.is_some() || self.param_facet.is_some()
    }

    /// Add a sub-aggregation, rejecting names already used on this node
    pub fn add_child(&mut self, child: AggregationNode) -> Result<&mut Self> {
        insert_unique(&mut self.children, &self.name, child)?;
        Ok(self)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Sub-aggregations in insertion order
    pub fn children(&self) -> &[AggregationNode] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&AggregationNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Run the facet hook and the request parameter facet against `query`
    pub fn apply_facet(&self, query: &mut Query, params: &RequestParams) {
        if let Some(run) = self.facet_run() {
            run.run(query, params);
        }
    }

    pub(crate) fn facet_run(&self) -> Option<FacetRun> {
        if !self.has_facet() {
            return None;
        }
        Some(FacetRun {
            name: self.name.clone(),
            hook: self.facet_hook.clone(),
            param_facet: self.param_facet.clone(),
            on_post_filter: self.apply_on_post_filter,
        })
    }

    /// Render as `{type: parameters, meta?, aggs?}`
    pub fn render(&self) -> Value {
        let mut body = Map::new();
        body.insert(self.type_tag.clone(), self.parameters.clone());

        if !self.meta.is_empty() {
            body.insert("meta".into(), Value::Object(self.meta.clone()));
        }

        if self.has_children() {
            body.insert("aggs".into(), render_all(&self.children));
        }

        Value::Object(body)
    }
}

/// Render a list of aggregations as a `{name: body}` object
pub(crate) fn render_all(nodes: &[AggregationNode]) -> Value {
    Value::Object(
        nodes
            .iter()
            .map(|node| (node.name.clone(), node.render()))
            .collect(),
    )
}

pub(crate) fn insert_unique(
    siblings: &mut Vec<AggregationNode>,
    parent: &str,
    node: AggregationNode,
) -> Result<()> {
    if siblings.iter().any(|s| s.name == node.name) {
        return Err(EsQueryError::duplicate(parent, &node.name));
    }
    siblings.push(node);
    Ok(())
}

/// Facet hook matching the value of request parameter `param` on `field`
///
/// Scalars add a term clause, lists add a term collection. The clause goes to
/// the post-filter when `on_post_filter` is set, so the other aggregations
/// keep counting the unfiltered set, and to the filter otherwise.
pub fn match_request_param(
    field: impl Into<String>,
    param: impl Into<String>,
    on_post_filter: bool,
) -> impl Fn(&mut Query, &RequestParams) + Send + Sync + 'static {
    let field = field.into();
    let param = param.into();

    move |query: &mut Query, params: &RequestParams| {
        match_param(query, params, &field, &param, on_post_filter)
    }
}

fn match_param(
    query: &mut Query,
    params: &RequestParams,
    field: &str,
    param: &str,
    on_post_filter: bool,
) {
    if !params.has_value(param) {
        return;
    }
    let Some(value) = params.get(param) else {
        return;
    };

    let clause = if on_post_filter {
        query.post_filter_mut()
    } else {
        query.filter_mut()
    };

    match value {
        Value::Array(items) => {
            clause.match_term_collection(field, items.iter().filter_map(TermValue::from_json));
        }
        other => {
            if let Some(term) = TermValue::from_json(other) {
                clause.match_term(field, term);
            }
        }
    }
}
