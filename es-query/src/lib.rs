//! Elasticsearch query construction and response interpretation
//!
//! Builds search request bodies from a small set of primitives and reads the
//! engine's replies back into typed hits and aggregation trees.
//!
//! # Building
//!
//! - [`Query`] holds three Lucene clause builders (main query, filter,
//!   post-filter), sort specs, source projection and an aggregation tree
//! - [`AggregationNode`] describes one named aggregation, optionally with a
//!   facet hook that turns request parameters into filter terms
//! - [`QueryRunner`] applies request parameters (facets, pagination, free-text
//!   search) and hands the rendered request to a [`SearchTransport`]
//!
//! # Reading
//!
//! [`Response`] pairs the raw reply with the [`Query`] that produced it; the
//! request's aggregation tree decides how each fragment is read. Every parsed
//! aggregation is also reachable by name through a flattened index.
//!
//! ```
//! use es_query::{Query, SortSpec};
//! use serde_json::json;
//!
//! let mut query = Query::new();
//! query.filter_mut().match_term("status", 1);
//! query.add_sort(SortSpec::desc("updated"));
//!
//! assert_eq!(
//!     query.to_body()["sort"],
//!     json!([{"updated": {"order": "desc"}}])
//! );
//! ```

pub mod aggregation;
pub mod config;
pub mod document;
pub mod error;
pub mod lucene;
pub mod merge;
pub mod params;
pub mod query;
pub mod response;
pub mod runner;
pub mod sort;
pub mod transport;

pub use aggregation::{match_request_param, AggregationNode, FacetHook};
pub use config::RunnerConfig;
pub use document::Document;
pub use error::EsQueryError;
pub use lucene::{LuceneQuery, TermValue};
pub use merge::{merge, merge_into};
pub use params::RequestParams;
pub use query::{Query, SourceFields};
pub use response::{
    AggregationResponse, Bucket, BucketResponse, MetricResponse, ParseMode, Response,
};
pub use runner::QueryRunner;
pub use sort::{SortMissing, SortMode, SortOrder, SortSpec};
pub use transport::{SearchRequest, SearchTransport};

/// Result type for query building and response parsing
pub type Result<T> = std::result::Result<T, EsQueryError>;
