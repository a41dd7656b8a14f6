//! Property-based render/parse round trip for aggregation trees.
//!
//! Generates random bucket/metric trees, renders them into a request body,
//! synthesizes an engine reply shaped exactly like that body and checks that
//! strict parsing reproduces the tree shape and leaf values.

use es_query::{AggregationNode, AggregationResponse, ParseMode, Query, Response};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Buckets synthesized per bucket-kind fragment
const BUCKETS: usize = 2;

#[derive(Debug, Clone)]
struct Shape {
    bucket: bool,
    children: Vec<Shape>,
}

// ---------------------------------------------------------------------------
// Strategies and builders
// ---------------------------------------------------------------------------

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = any::<bool>().prop_map(|bucket| Shape {
        bucket,
        children: Vec::new(),
    });
    leaf.prop_recursive(3, 16, 3, |inner| {
        (any::<bool>(), prop::collection::vec(inner, 0..3))
            .prop_map(|(bucket, children)| Shape { bucket, children })
    })
}

fn build_node(shape: &Shape, name: String) -> AggregationNode {
    let mut node = if shape.bucket {
        AggregationNode::bucket(&name, "terms").with_parameters(json!({"field": name}))
    } else {
        AggregationNode::new(&name, "max").with_parameters(json!({"field": name}))
    };
    for (position, child) in shape.children.iter().enumerate() {
        node.add_child(build_node(child, format!("{name}_{position}")))
            .unwrap();
    }
    node
}

/// Reply fragment for `node`, driven by its rendered request body
fn fragment(node: &AggregationNode, rendered: &Value) -> Value {
    let rendered_children = rendered
        .get("aggs")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let nested = |target: &mut Map<String, Value>| {
        for (name, body) in &rendered_children {
            let child = node.child(name).unwrap();
            target.insert(name.clone(), fragment(child, body));
        }
    };

    if node.is_bucket_kind() {
        let buckets: Vec<Value> = (0..BUCKETS)
            .map(|i| {
                let mut bucket = Map::new();
                bucket.insert("key".into(), json!(format!("{}-{i}", node.name())));
                bucket.insert("doc_count".into(), json!(i + 1));
                nested(&mut bucket);
                Value::Object(bucket)
            })
            .collect();
        json!({"buckets": buckets})
    } else {
        let mut metric = Map::new();
        metric.insert("value".into(), json!(1.5));
        nested(&mut metric);
        Value::Object(metric)
    }
}

/// Occurrences of every node name in the parsed tree
fn expected_counts(shape: &Shape, name: &str, multiplier: usize, out: &mut Vec<(String, usize)>) {
    out.push((name.to_string(), multiplier));
    let below = if shape.bucket { multiplier * BUCKETS } else { multiplier };
    for (position, child) in shape.children.iter().enumerate() {
        expected_counts(child, &format!("{name}_{position}"), below, out);
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn rendered_tree_parses_back(roots in prop::collection::vec(shape(), 1..3)) {
        let mut query = Query::new();
        for (position, root) in roots.iter().enumerate() {
            query.add_aggregation(build_node(root, format!("agg{position}"))).unwrap();
        }

        let body = query.to_body();
        let mut aggregations = Map::new();
        for node in query.aggregations() {
            let rendered = &body["aggs"][node.name()];
            aggregations.insert(node.name().to_string(), fragment(node, rendered));
        }
        let reply = json!({
            "hits": {"total": 0, "max_score": null, "hits": []},
            "aggregations": aggregations,
        });

        let response = Response::parse(&query, reply, ParseMode::Strict).unwrap();
        prop_assert_eq!(response.roots().len(), roots.len());

        let mut expected = Vec::new();
        for (position, root) in roots.iter().enumerate() {
            expected_counts(root, &format!("agg{position}"), 1, &mut expected);
        }

        for (name, count) in expected {
            let found = response.aggregations_named(&name);
            prop_assert_eq!(found.len(), count, "occurrences of {}", name);

            for result in found {
                match result.as_ref() {
                    AggregationResponse::Bucket(buckets) => {
                        prop_assert_eq!(buckets.len(), BUCKETS);
                        for (i, bucket) in buckets.buckets().iter().enumerate() {
                            let key = json!(format!("{name}-{i}"));
                            prop_assert_eq!(bucket.key(), Some(&key));
                            prop_assert_eq!(bucket.doc_count(), Some(i as u64 + 1));
                        }
                    }
                    AggregationResponse::Metric(metric) => {
                        prop_assert_eq!(metric.value(), Some(1.5));
                    }
                }
            }
        }
    }
}
