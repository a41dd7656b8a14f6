//! End-to-end search cycle against a recording in-memory transport.
//!
//! Builds a faceted listing query, executes it through `QueryRunner`, checks
//! the envelope the transport received and reads the canned reply back.

use async_trait::async_trait;
use es_query::{
    AggregationNode, EsQueryError, ParseMode, Query, QueryRunner,
    RequestParams, Response, SearchRequest, SearchTransport,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("es_query=debug")
        .try_init();
}

/// Returns a canned reply and records every request it is handed
struct RecordingTransport {
    reply: Value,
    requests: Mutex<Vec<SearchRequest>>,
}

impl RecordingTransport {
    fn new(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchTransport for RecordingTransport {
    async fn search(&self, request: SearchRequest) -> anyhow::Result<Value> {
        self.requests.lock().unwrap().push(request);
        Ok(self.reply.clone())
    }
}

struct FailingTransport;

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct ConnectionRefused;

#[async_trait]
impl SearchTransport for FailingTransport {
    async fn search(&self, _request: SearchRequest) -> anyhow::Result<Value> {
        Err(ConnectionRefused.into())
    }
}

/// Listing query: types restricted by filter, per-type top hits, and a
/// post-filter facet on `type`
fn listing_query() -> Query {
    let top_hits = AggregationNode::new("type_top_hits", "top_hits").with_parameters(json!({
        "_source": {"include": ["_id", "title"]},
        "size": 3,
    }));

    let terms = AggregationNode::bucket("terms", "terms")
        .with_parameters(json!({"field": "type"}))
        .with_child(top_hits)
        .unwrap();

    let counts = AggregationNode::new("type_count", "value_count")
        .with_parameters(json!({"field": "type"}))
        .with_apply_on_post_filter(true)
        .with_request_param_facet("type", "type");

    let mut query = Query::new();
    query.add_aggregation(terms).unwrap();
    query.add_aggregation(counts).unwrap();
    query
        .filter_mut()
        .match_term_collection("type", ["page", "news", "event"])
        .match_term("status", 1);
    query
}

fn runner(transport: Arc<dyn SearchTransport>) -> QueryRunner {
    let mut runner = QueryRunner::with_transport(transport);
    runner
        .set_index("my_content")
        .set_fulltext_field("text_combined")
        .set_fulltext_param("q")
        .set_page_param("page")
        .set_limit(Some(20));
    runner
}

fn listing_reply() -> Value {
    json!({
        "took": 4,
        "timed_out": false,
        "hits": {
            "total": 625,
            "max_score": 1.0,
            "hits": [
                {
                    "_index": "private",
                    "_type": "node",
                    "_id": "5",
                    "_score": 1,
                    "_source": {
                        "created": "2016-05-30T17:11:45+0000",
                        "owner": "15",
                        "is_flagged": false,
                    },
                },
                {
                    "_index": "private",
                    "_type": "node",
                    "_id": "6",
                    "_score": 1,
                    "_source": {
                        "updated": "2016-06-02T20:02:26+0000",
                        "owner": "15",
                        "is_global": true,
                    },
                },
            ],
        },
        "aggregations": {
            "terms": {
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": 0,
                "buckets": [
                    {
                        "key": "page",
                        "doc_count": 400,
                        "type_top_hits": {"hits": {"total": 400, "hits": []}},
                    },
                    {
                        "key": "news",
                        "doc_count": 225,
                        "type_top_hits": {"hits": {"total": 225, "hits": []}},
                    },
                ],
            },
            "type_count": {"value": 625},
        },
    })
}

// ---------------------------------------------------------------------------
// Request side
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_envelope_sent_without_params() {
    init_tracing();
    let transport = RecordingTransport::new(listing_reply());
    let mut query = listing_query();

    runner(transport.clone())
        .execute(&mut query, &RequestParams::new())
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].to_value().unwrap(),
        json!({
            "index": "my_content",
            "type": "node",
            "body": {
                "query": {
                    "constant_score": {
                        "filter": {
                            "fquery": {
                                "query": {
                                    "query_string": {
                                        "query": "(type:(page OR news OR event) status:1)",
                                    },
                                },
                                "_cache": true,
                            },
                        },
                    },
                },
                "aggs": {
                    "terms": {
                        "terms": {"field": "type"},
                        "aggs": {
                            "type_top_hits": {
                                "top_hits": {
                                    "_source": {"include": ["_id", "title"]},
                                    "size": 3,
                                },
                            },
                        },
                    },
                    "type_count": {"value_count": {"field": "type"}},
                },
            },
            "size": 20,
            "from": 0,
        })
    );
}

#[tokio::test]
async fn test_envelope_sent_with_facet_and_fulltext() {
    init_tracing();
    let transport = RecordingTransport::new(listing_reply());
    let mut query = listing_query();

    let params: RequestParams = [
        ("type", json!("page")),
        ("q", json!("Oh you, you want to break free")),
    ]
    .into_iter()
    .collect();

    runner(transport.clone())
        .execute(&mut query, &params)
        .await
        .unwrap();

    let body = &transport.requests()[0].body;
    assert_eq!(
        body["query"],
        json!({
            "filtered": {
                "query": {
                    "query_string": {
                        "query": "text_combined:\"Oh you, you want to break free\"~0.8",
                    },
                },
                "filter": {
                    "fquery": {
                        "query": {
                            "query_string": {
                                "query": "(type:(page OR news OR event) status:1)",
                            },
                        },
                        "_cache": true,
                    },
                },
            },
        })
    );
    assert_eq!(
        body["post_filter"],
        json!({"query_string": {"query": "type:page"}})
    );
}

#[test]
fn test_to_request_without_transport() {
    let mut runner = QueryRunner::new();
    runner.set_index("my_content").set_limit(Some(10));

    let mut params = RequestParams::new();
    params.insert("page", "4");

    let request = runner.to_request(&mut Query::new(), &params).unwrap();
    assert_eq!(request.size, Some(10));
    assert_eq!(request.from, Some(30));
}

// ---------------------------------------------------------------------------
// Response side
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reply_parsed_against_request_tree() {
    init_tracing();
    let transport = RecordingTransport::new(listing_reply());
    let mut query = listing_query();

    let response = runner(transport)
        .execute(&mut query, &RequestParams::new())
        .await
        .unwrap();

    assert_eq!(response.total(), Some(625));
    assert_eq!(response.max_score(), Some(1.0));
    assert_eq!(response.documents().len(), 2);

    let first = &response.documents()[0];
    assert_eq!(first.index(), Some("private"));
    assert_eq!(first.id(), Some("5"));
    assert_eq!(first.get("owner"), Some(&json!("15")));
    assert_eq!(first.get("is_flagged"), Some(&json!(false)));

    let roots: Vec<&str> = response.roots().iter().map(|r| r.name()).collect();
    assert_eq!(roots, vec!["terms", "type_count"]);

    let terms = response.aggregation("terms").unwrap().as_bucket().unwrap();
    assert_eq!(terms.len(), 2);
    assert_eq!(terms.buckets()[0].key(), Some(&json!("page")));
    assert_eq!(terms.buckets()[1].doc_count(), Some(225));

    // One top_hits result per bucket, all reachable by name
    let top_hits = response.aggregations_named("type_top_hits");
    assert_eq!(top_hits.len(), 2);
    assert!(top_hits.iter().all(|r| !r.is_bucket()));
    assert_eq!(
        top_hits[1].get("hits").and_then(|h| h.get("total")),
        Some(&json!(225))
    );

    let counts = response.aggregation("type_count").unwrap().as_metric().unwrap();
    assert_eq!(counts.value(), Some(625.0));
}

#[tokio::test]
async fn test_missing_fragment_lenient_and_strict() {
    init_tracing();
    let mut reply = listing_reply();
    reply["aggregations"]
        .as_object_mut()
        .unwrap()
        .remove("type_count");

    let transport = RecordingTransport::new(reply.clone());
    let mut query = listing_query();
    let response = runner(transport)
        .execute(&mut query, &RequestParams::new())
        .await
        .unwrap();
    assert!(response.aggregation("type_count").is_none());
    assert!(response.aggregation("terms").is_some());

    let transport = RecordingTransport::new(reply);
    let mut strict = runner(transport);
    strict.set_strict(true);
    let err = strict
        .execute(&mut listing_query(), &RequestParams::new())
        .await
        .unwrap_err();
    match err {
        EsQueryError::ResponseShape {
            aggregation,
            missing,
        } => {
            assert_eq!(aggregation, "type_count");
            assert_eq!(missing, "aggregations.type_count");
        }
        other => panic!("Expected ResponseShape error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_error_passed_through() {
    let mut query = Query::new();
    let err = runner(Arc::new(FailingTransport))
        .execute(&mut query, &RequestParams::new())
        .await
        .unwrap_err();

    match err {
        EsQueryError::Transport(source) => {
            assert!(source.downcast_ref::<ConnectionRefused>().is_some());
        }
        other => panic!("Expected Transport error, got {other:?}"),
    }
}

#[test]
fn test_parse_without_runner() {
    let reply = json!({"hits": {"total": {"value": 3, "relation": "eq"}, "hits": []}});
    let response = Response::parse(&Query::new(), reply, ParseMode::Strict).unwrap();
    assert_eq!(response.total(), Some(3));
    assert!(!response.has_hits());
    assert!(response.max_score().is_none());
    assert!(response.aggregation_index().is_empty());
}
