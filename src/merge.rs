use serde_json::{Map, Value};

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};

const COMPONENT: &str = "merge";

/// Deep-merges `secondary` into `primary`; `primary` wins every conflict.
///
/// Keys only present in `secondary` are copied, nested objects are merged
/// recursively, and differing leaf values keep `primary`'s value (a debug
/// event names the key).
pub fn merge(
    primary: &Map<String, Value>,
    secondary: &Map<String, Value>,
    sink: &dyn DiagnosticSink,
) -> Map<String, Value> {
    merge_at(primary, secondary, "", sink)
}

fn merge_at(
    primary: &Map<String, Value>,
    secondary: &Map<String, Value>,
    prefix: &str,
    sink: &dyn DiagnosticSink,
) -> Map<String, Value> {
    secondary
        .iter()
        .fold(primary.clone(), |mut merged, (key, theirs)| {
            match (merged.get(key), theirs) {
                (None, _) => {
                    merged.insert(key.clone(), theirs.clone());
                }
                (Some(Value::Object(ours)), Value::Object(theirs)) => {
                    let nested = merge_at(ours, theirs, &key_path(prefix, key), sink);
                    merged.insert(key.clone(), Value::Object(nested));
                }
                (Some(ours), theirs) if ours != theirs => {
                    sink.event(DiagnosticEvent::debug(
                        COMPONENT,
                        format!(
                            "values for {} differ, keeping the primary value",
                            key_path(prefix, key)
                        ),
                    ));
                }
                _ => {}
            }
            merged
        })
}

fn key_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
