//! Sanitizes render data before it is interpolated into the sandbox.
//!
//! The response payload comes from an untrusted counterparty and ends up as a
//! JS object literal inside the creative isolate, so prototype-pollution keys
//! are stripped rather than passed through. Stripping (instead of rejecting)
//! keeps a hostile-but-otherwise-renderable payload renderable.

use serde_json::{Map, Value};

/// Nesting beyond this depth is discarded wholesale.
const MAX_DEPTH: usize = 32;

const POLLUTION_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Strip prototype-pollution keys and over-deep nesting from a payload.
pub fn sanitize_render_data(value: Value) -> Value {
    clean(value, 0)
}

fn clean(value: Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        tracing::warn!(depth, "render data nested too deep, truncating");
        return Value::Null;
    }

    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                if POLLUTION_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "stripping prototype-pollution key from render data");
                    continue;
                }
                out.insert(key, clean(val, depth + 1));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| clean(v, depth + 1)).collect())
        }
        primitive => primitive,
    }
}
