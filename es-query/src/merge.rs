//! Recursive structural merge of JSON bodies
//!
//! Used to apply caller overrides on top of a generated request body.
//! For every key of the override: if both sides hold containers of the same
//! kind the two are merged recursively, otherwise the override value wins.
//! Keys only present in the base are kept untouched, keys only present in
//! the override are appended. Arrays are merged position by position, never
//! concatenated or deduplicated.
//!
//! An empty override container is a no-op against any base container, so
//! `merge(a, {})` and `merge(a, [])` both return `a`.

use serde_json::{Map, Value};

/// Merge `overrides` on top of `base` and return the result
pub fn merge(base: &Value, overrides: &Value) -> Value {
    let mut merged = base.clone();
    merge_into(&mut merged, overrides.clone());
    merged
}

/// In-place variant of [`merge`]
pub fn merge_into(base: &mut Value, overrides: Value) {
    if is_empty_container(&overrides) && is_container(base) {
        return;
    }

    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => merge_objects(base, overrides),
        (Value::Array(base), Value::Array(overrides)) => merge_arrays(base, overrides),
        (base, overrides) => *base = overrides,
    }
}

fn merge_objects(base: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        match base.get_mut(&key) {
            Some(existing) if is_container(existing) && is_container(&value) => {
                merge_into(existing, value)
            }
            Some(existing) => *existing = value,
            None => {
                base.insert(key, value);
            }
        }
    }
}

fn merge_arrays(base: &mut Vec<Value>, overrides: Vec<Value>) {
    for (position, value) in overrides.into_iter().enumerate() {
        match base.get_mut(position) {
            Some(existing) if is_container(existing) && is_container(&value) => {
                merge_into(existing, value)
            }
            Some(existing) => *existing = value,
            None => base.push(value),
        }
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
