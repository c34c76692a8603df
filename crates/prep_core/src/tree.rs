//! crates/prep_core/src/tree.rs
//!
//! Helpers for the realtime document tree: `/`-separated paths, nested
//! reads and writes on a `serde_json::Value`, and the flattened leaf form a
//! relational backend stores.
//!
//! The tree follows the realtime store's conventions: `null` means absent,
//! empty containers vanish, and arrays are kept as index-keyed children and
//! read back as arrays when their keys are exactly `0..n`.
//!
//! Object keys inside a written value are free text (topic labels, for
//! instance), so the flattened form escapes `/` and `%` in them.

use serde_json::{Map, Value};

/// Splits a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalises a path (no leading, trailing or doubled slashes).
pub fn normalize(path: &str) -> String {
    segments(path).join("/")
}

/// Joins path segments.
pub fn join(parts: &[&str]) -> String {
    normalize(&parts.join("/"))
}

/// True when `a` equals `b` or one is an ancestor of the other, i.e. a write
/// to one can change what a reader of the other sees.
pub fn overlaps(a: &str, b: &str) -> bool {
    let a = segments(a);
    let b = segments(b);
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

/// Reads the subtree at `path`.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for seg in segments(path) {
        node = match node {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!node.is_null()).then_some(node)
}

/// Writes `value` at `path`, creating intermediate objects and replacing any
/// scalar in the way. Writing `null` removes the node and prunes parents left empty.
pub fn set(root: &mut Value, path: &str, value: Value) {
    set_segments(root, &segments(path), value);
}

fn set_segments(root: &mut Value, segs: &[&str], value: Value) {
    let value = canonical(value);
    if segs.is_empty() {
        *root = value.unwrap_or(Value::Null);
        return;
    }
    set_in(root, segs, value);
    if matches!(root, Value::Object(m) if m.is_empty()) {
        *root = Value::Null;
    }
}

fn set_in(node: &mut Value, segs: &[&str], value: Option<Value>) {
    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else { return };
    let (head, rest) = (segs[0], &segs[1..]);
    if rest.is_empty() {
        match value {
            Some(v) => {
                map.insert(head.to_string(), v);
            }
            None => {
                map.remove(head);
            }
        }
        return;
    }
    let child = map.entry(head.to_string()).or_insert(Value::Null);
    set_in(child, rest, value);
    if child.is_null() || matches!(child, Value::Object(m) if m.is_empty()) {
        map.remove(head);
    }
}

/// Converts a value to its stored form: arrays become index-keyed objects,
/// nulls and empty containers disappear.
pub fn canonical(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let map: Map<String, Value> = items
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| canonical(v).map(|v| (i.to_string(), v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| canonical(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        scalar => Some(scalar),
    }
}

/// Converts a stored value back to its readable form: objects keyed
/// exactly `0..n` become arrays again.
pub fn restore_arrays(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sequential = !map.is_empty()
                && (0..map.len()).all(|i| map.contains_key(&i.to_string()));
            if sequential {
                let mut map = map;
                let items = (0..map.len())
                    .map(|i| restore_arrays(map.remove(&i.to_string()).unwrap_or(Value::Null)))
                    .collect();
                Value::Array(items)
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, restore_arrays(v)))
                        .collect(),
                )
            }
        }
        other => other,
    }
}

/// Flattens a value written at `base` into `(path, scalar)` leaves.
pub fn flatten(base: &str, value: Value) -> Vec<(String, Value)> {
    let mut leaves = Vec::new();
    if let Some(value) = canonical(value) {
        flatten_into(normalize(base), value, &mut leaves);
    }
    leaves
}

fn flatten_into(path: String, value: Value, leaves: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = escape_key(&key);
                let child_path = if path.is_empty() {
                    key
                } else {
                    format!("{}/{}", path, key)
                };
                flatten_into(child_path, child, leaves);
            }
        }
        scalar => leaves.push((path, scalar)),
    }
}

/// Rebuilds the subtree at `base` from leaves at or below it.
pub fn assemble(base: &str, leaves: impl IntoIterator<Item = (String, Value)>) -> Option<Value> {
    let base_segs = segments(base);
    let mut root = Value::Null;
    for (path, value) in leaves {
        let segs = segments(&path);
        if segs.len() < base_segs.len() || segs[..base_segs.len()] != base_segs[..] {
            continue;
        }
        let keys: Vec<String> = segs[base_segs.len()..].iter().map(|s| unescape_key(s)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        set_segments(&mut root, &keys, value);
    }
    (!root.is_null()).then(|| restore_arrays(root))
}

/// Escapes an object key so it stays a single path segment.
pub fn escape_key(key: &str) -> String {
    key.replace('%', "%25").replace('/', "%2F")
}

/// Reverses [`escape_key`]. Unknown escapes are kept as written.
pub fn unescape_key(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("%2F") {
            out.push('/');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("%25") {
            out.push('%');
            rest = after;
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_are_normalised() {
        assert_eq!(normalize("/users//u1/tests/"), "users/u1/tests");
        assert_eq!(join(&["users", "u1", "streak"]), "users/u1/streak");
        assert!(overlaps("users/u1", "users/u1/tests/x"));
        assert!(overlaps("users/u1/tests/x", "users/u1"));
        assert!(!overlaps("users/u1", "users/u2"));
    }

    #[test]
    fn nested_writes_merge_into_the_tree() {
        let mut root = Value::Null;
        set(&mut root, "users/u1/tests/d/t1", json!({"submitted": false}));
        set(&mut root, "users/u1/tests/d/t1/status", json!(["answered", "review"]));

        let test = get(&root, "users/u1/tests/d/t1").unwrap();
        assert_eq!(test["submitted"], json!(false));
        assert_eq!(restore_arrays(test["status"].clone()), json!(["answered", "review"]));
    }

    #[test]
    fn null_writes_remove_and_prune() {
        let mut root = json!({});
        set(&mut root, "a/b/c", json!(1));
        set(&mut root, "a/b/c", Value::Null);
        assert!(get(&root, "a").is_none());
        assert!(root.is_null());
    }

    #[test]
    fn scalars_in_the_way_are_replaced() {
        let mut root = Value::Null;
        set(&mut root, "users/u1/streak", json!(3));
        set(&mut root, "users/u1/streak/extra", json!(true));
        assert_eq!(get(&root, "users/u1/streak"), Some(&json!({"extra": true})));
    }

    #[test]
    fn flatten_and_assemble_round_trip_arrays() {
        let value = json!({
            "answers": ["A", null, "C"],
            "review": [false, true],
            "meta": {"count": 2, "empty": {}}
        });
        let leaves = flatten("users/u1/tests/t1", value);
        assert!(leaves.iter().any(|(p, v)| p == "users/u1/tests/t1/answers/2" && v == "C"));
        assert!(!leaves.iter().any(|(p, _)| p.ends_with("answers/1")));

        let rebuilt = assemble("users/u1/tests/t1", leaves).unwrap();
        // A hole in an array leaves a map, as in the realtime store.
        assert_eq!(rebuilt["answers"], json!({"0": "A", "2": "C"}));
        assert_eq!(rebuilt["review"], json!([false, true]));
        assert_eq!(rebuilt["meta"], json!({"count": 2}));
    }

    #[test]
    fn keys_with_slashes_stay_single_segments() {
        assert_eq!(escape_key("Art/Culture 100%"), "Art%2FCulture 100%25");
        assert_eq!(unescape_key("Art%2FCulture 100%25"), "Art/Culture 100%");
        assert_eq!(unescape_key(&escape_key("%2F")), "%2F");
        assert_eq!(unescape_key("50%"), "50%");
    }

    #[test]
    fn history_with_slashed_topics_survives_flattening() {
        use crate::analytics::compute_analytics;
        use crate::domain::{Question, TestHistoryEntry};

        let question = Question {
            question: "Consider the following statements:".to_string(),
            statements: vec!["One".to_string()],
            options: vec!["A".to_string(), "B".to_string()],
            answer: "A".to_string(),
            explanation: String::new(),
            topic: Some("Art/Culture".to_string()),
        };
        let analytics = compute_analytics(&[question], &[Some("A".to_string())]);
        let entry = TestHistoryEntry {
            test_id: "t1".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
            score: 100.0,
            topics: vec!["Art/Culture".to_string()],
            total_questions: 1,
            time_taken: 12,
            analytics: Some(analytics),
        };

        let base = "users/u1/testHistory/t1";
        let leaves = flatten(base, serde_json::to_value(&entry).unwrap());
        assert!(leaves
            .iter()
            .any(|(p, _)| p.contains("/topicWiseAnalysis/Art%2FCulture/")));

        let rebuilt = assemble(base, leaves).unwrap();
        assert_eq!(rebuilt["analytics"]["topicWiseAnalysis"]["Art/Culture"]["correct"], json!(1));
        let decoded: TestHistoryEntry = serde_json::from_value(rebuilt).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn assemble_ignores_unrelated_leaves() {
        let leaves = vec![
            ("users/u1/streak".to_string(), json!(4)),
            ("users/u2/streak".to_string(), json!(9)),
        ];
        assert_eq!(assemble("users/u1/streak", leaves.clone()), Some(json!(4)));
        assert_eq!(assemble("users/u3", leaves), None);
    }
}
