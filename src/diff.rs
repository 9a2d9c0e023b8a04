use serde_json::{Map, Value};

/// One leaf-level difference: `(path, old, new)`. Paths use `a.b[2].c`.
pub(crate) type Change = (String, Value, Value);

fn child(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Collects leaf changes from `previous` to `current`. Keys that disappear
/// are reported with a `null` new value.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    prefix: &str,
    changes: &mut Vec<Change>,
) {
    match (previous, current) {
        (Value::Object(prev), Value::Object(curr)) => {
            for (key, curr_val) in curr {
                let path = child(prefix, key);
                match prev.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => {
                        diff_json(&Value::Object(Map::new()), curr_val, &path, changes)
                    }
                    None => changes.push((path, Value::Null, curr_val.clone())),
                }
            }
            for (key, prev_val) in prev {
                if !curr.contains_key(key) {
                    changes.push((child(prefix, key), prev_val.clone(), Value::Null));
                }
            }
        }
        (Value::Array(prev), Value::Array(curr)) if prev.len() == curr.len() => {
            for (i, (p, c)) in prev.iter().zip(curr).enumerate() {
                diff_json(p, c, &format!("{prefix}[{i}]"), changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diff(a: Value, b: Value) -> Vec<Change> {
        let mut changes = Vec::new();
        diff_json(&a, &b, "", &mut changes);
        changes
    }

    #[test]
    fn identical_documents_have_no_changes() {
        let doc = json!({"zones": [{"zoneId": "1", "temperatureStatus": {"temperature": 20.5}}]});
        assert!(diff(doc.clone(), doc).is_empty());
    }

    #[test]
    fn descends_into_arrays_of_equal_length() {
        let changes = diff(
            json!({"zones": [{"t": 20.5}, {"t": 18.0}]}),
            json!({"zones": [{"t": 20.5}, {"t": 18.5}]}),
        );
        assert_eq!(changes, vec![("zones[1].t".to_string(), json!(18.0), json!(18.5))]);
    }

    #[test]
    fn resized_arrays_are_replaced_whole() {
        let changes = diff(json!({"faults": []}), json!({"faults": [{"faultType": "X"}]}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "faults");
    }

    #[test]
    fn added_and_removed_keys() {
        let changes = diff(json!({"a": 1, "gone": true}), json!({"a": 1, "new": {"x": 2}}));
        assert!(changes.contains(&("new.x".to_string(), Value::Null, json!(2))));
        assert!(changes.contains(&("gone".to_string(), json!(true), Value::Null)));
    }
}
