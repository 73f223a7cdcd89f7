//! Two-way strategic-merge patch generation for workload objects.
//!
//! The patch turns `original` into `modified` when applied by the API server
//! with `application/strategic-merge-patch+json` semantics. Lists of pod-spec
//! fields with a merge key are diffed element-wise and carry a
//! `$setElementOrder/<field>` directive, every other list is replaced as a
//! whole.

use serde_json::{Map, Value};

const SET_ELEMENT_ORDER_PREFIX: &str = "$setElementOrder/";

const PATCH_DIRECTIVE: &str = "$patch";

/// Fields merged by key rather than replaced.
const MERGE_KEYS: &[(&str, &str)] = &[
    ("containers", "name"),
    ("env", "name"),
    ("ephemeralContainers", "name"),
    ("imagePullSecrets", "name"),
    ("initContainers", "name"),
    ("volumes", "name"),
];

fn merge_key_of(field: &str) -> Option<&'static str> {
    MERGE_KEYS.iter().find(|(name, _)| *name == field).map(|(_, key)| *key)
}

/// Computes the patch from `original` to `modified`. Returns an empty object
/// when the documents are equal.
#[must_use]
pub fn two_way_merge(original: &Value, modified: &Value) -> Value {
    match (original, modified) {
        (Value::Object(original), Value::Object(modified)) => {
            Value::Object(diff_maps(original, modified))
        }
        _ if original == modified => Value::Object(Map::new()),
        _ => modified.clone(),
    }
}

fn diff_maps(original: &Map<String, Value>, modified: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();

    for (key, modified_value) in modified {
        let Some(original_value) = original.get(key) else {
            let _unused = patch.insert(key.clone(), modified_value.clone());
            continue;
        };
        if original_value == modified_value {
            continue;
        }

        match (original_value, modified_value) {
            (Value::Object(original_value), Value::Object(modified_value)) => {
                let nested = diff_maps(original_value, modified_value);
                if !nested.is_empty() {
                    let _unused = patch.insert(key.clone(), Value::Object(nested));
                }
            }
            (Value::Array(original_list), Value::Array(modified_list)) => {
                match merge_key_of(key).filter(|merge_key| {
                    keyed_by(original_list, merge_key) && keyed_by(modified_list, merge_key)
                }) {
                    Some(merge_key) => {
                        diff_keyed_lists(key, merge_key, original_list, modified_list, &mut patch);
                    }
                    None => {
                        let _unused = patch.insert(key.clone(), modified_value.clone());
                    }
                }
            }
            _ => {
                let _unused = patch.insert(key.clone(), modified_value.clone());
            }
        }
    }

    for key in original.keys() {
        if !modified.contains_key(key) {
            let _unused = patch.insert(key.clone(), Value::Null);
        }
    }

    patch
}

fn keyed_by(list: &[Value], merge_key: &str) -> bool {
    list.iter().all(|item| item.get(merge_key).is_some())
}

fn diff_keyed_lists(
    field: &str,
    merge_key: &str,
    original: &[Value],
    modified: &[Value],
    patch: &mut Map<String, Value>,
) {
    let mut consumed = vec![false; original.len()];
    let mut changes = Vec::new();

    for item in modified {
        let matched = original.iter().enumerate().position(|(index, candidate)| {
            !consumed[index] && candidate.get(merge_key) == item.get(merge_key)
        });
        match matched {
            Some(index) => {
                consumed[index] = true;
                if let (Value::Object(before), Value::Object(after)) = (&original[index], item) {
                    let mut nested = diff_maps(before, after);
                    if !nested.is_empty() {
                        let _unused = nested.insert(
                            merge_key.to_string(),
                            item.get(merge_key).cloned().unwrap_or(Value::Null),
                        );
                        changes.push(Value::Object(nested));
                    }
                }
            }
            None => changes.push(item.clone()),
        }
    }

    for (index, item) in original.iter().enumerate() {
        if !consumed[index] {
            let mut deletion = Map::new();
            let _unused = deletion
                .insert(merge_key.to_string(), item.get(merge_key).cloned().unwrap_or(Value::Null));
            let _unused = deletion.insert(PATCH_DIRECTIVE.to_string(), Value::from("delete"));
            changes.push(Value::Object(deletion));
        }
    }

    let order_same = original.len() == modified.len()
        && original.iter().zip(modified).all(|(a, b)| a.get(merge_key) == b.get(merge_key));

    if !changes.is_empty() || !order_same {
        let order = modified
            .iter()
            .map(|item| {
                let mut entry = Map::new();
                let _unused = entry.insert(
                    merge_key.to_string(),
                    item.get(merge_key).cloned().unwrap_or(Value::Null),
                );
                Value::Object(entry)
            })
            .collect();
        let _unused =
            patch.insert(format!("{SET_ELEMENT_ORDER_PREFIX}{field}"), Value::Array(order));
    }
    if !changes.is_empty() {
        let _unused = patch.insert(field.to_string(), Value::Array(changes));
    }
}

/// Applies a strategic-merge patch the way the API server does for the
/// subset of directives produced by [`two_way_merge`].
#[cfg(test)]
pub fn apply(target: &mut Value, patch: &Value) {
    let (Value::Object(target_map), Value::Object(patch_map)) = (&mut *target, patch) else {
        *target = patch.clone();
        return;
    };

    for (key, value) in patch_map {
        if key.starts_with(SET_ELEMENT_ORDER_PREFIX) {
            continue;
        }
        if value.is_null() {
            let _unused = target_map.remove(key);
            continue;
        }
        match (merge_key_of(key), target_map.get_mut(key), value) {
            (Some(merge_key), Some(Value::Array(existing)), Value::Array(items)) => {
                for item in items {
                    let position = existing
                        .iter()
                        .position(|candidate| candidate.get(merge_key) == item.get(merge_key));
                    let is_delete =
                        item.get(PATCH_DIRECTIVE).and_then(Value::as_str) == Some("delete");
                    match (position, is_delete) {
                        (Some(index), true) => {
                            let _unused = existing.remove(index);
                        }
                        (Some(index), false) => apply(&mut existing[index], item),
                        (None, false) => existing.push(item.clone()),
                        (None, true) => {}
                    }
                }
            }
            (_, Some(existing @ Value::Object(_)), Value::Object(_)) => apply(existing, value),
            _ => {
                let _unused = target_map.insert(key.clone(), value.clone());
            }
        }
    }

    for (key, order) in patch_map {
        let Some(field) = key.strip_prefix(SET_ELEMENT_ORDER_PREFIX) else { continue };
        let (Some(merge_key), Some(Value::Array(existing)), Value::Array(order)) =
            (merge_key_of(field), target_map.get_mut(field), order)
        else {
            continue;
        };
        let rank = |item: &Value| {
            order
                .iter()
                .position(|entry| entry.get(merge_key) == item.get(merge_key))
                .unwrap_or(usize::MAX)
        };
        existing.sort_by_key(rank);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_equal_documents_produce_empty_patch() {
        let doc = json!({"spec": {"containers": [{"name": "app", "image": "nginx"}]}});
        assert_eq!(two_way_merge(&doc, &doc), json!({}));
    }

    #[test]
    fn test_new_list_is_added_whole() {
        let original = json!({"spec": {"containers": [{"name": "app"}]}});
        let modified = json!({
            "spec": {"containers": [{"name": "app"}], "imagePullSecrets": [{"name": "a"}, {"name": "a"}]}
        });
        assert_eq!(
            two_way_merge(&original, &modified),
            json!({"spec": {"imagePullSecrets": [{"name": "a"}, {"name": "a"}]}})
        );
    }

    #[test]
    fn test_null_list_is_replaced() {
        let original = json!({"spec": {"imagePullSecrets": null}});
        let modified = json!({"spec": {"imagePullSecrets": [{"name": "a"}]}});
        assert_eq!(
            two_way_merge(&original, &modified),
            json!({"spec": {"imagePullSecrets": [{"name": "a"}]}})
        );
    }

    #[test]
    fn test_appending_to_keyed_list_sets_element_order() {
        let original = json!({"spec": {"imagePullSecrets": [{"name": "existing"}]}});
        let modified =
            json!({"spec": {"imagePullSecrets": [{"name": "existing"}, {"name": "pull-a"}]}});
        assert_eq!(
            two_way_merge(&original, &modified),
            json!({
                "spec": {
                    "$setElementOrder/imagePullSecrets": [{"name": "existing"}, {"name": "pull-a"}],
                    "imagePullSecrets": [{"name": "pull-a"}]
                }
            })
        );
    }

    #[test]
    fn test_removed_keys_become_null() {
        let original = json!({"metadata": {"labels": {"a": "1", "b": "2"}}});
        let modified = json!({"metadata": {"labels": {"a": "1"}}});
        assert_eq!(
            two_way_merge(&original, &modified),
            json!({"metadata": {"labels": {"b": null}}})
        );
    }

    #[test]
    fn test_removed_keyed_element_is_deleted() {
        let original = json!({"volumes": [{"name": "a"}, {"name": "b"}]});
        let modified = json!({"volumes": [{"name": "a"}]});
        assert_eq!(
            two_way_merge(&original, &modified),
            json!({
                "$setElementOrder/volumes": [{"name": "a"}],
                "volumes": [{"name": "b", "$patch": "delete"}]
            })
        );
    }

    #[test]
    fn test_unkeyed_list_is_replaced() {
        let original = json!({"args": ["a"]});
        let modified = json!({"args": ["a", "b"]});
        assert_eq!(two_way_merge(&original, &modified), json!({"args": ["a", "b"]}));
    }

    #[test]
    fn test_apply_restores_modified_document() {
        let original = json!({
            "kind": "Deployment",
            "spec": {"template": {"spec": {
                "containers": [{"name": "app", "image": "reg.example.com/app:v1"}],
                "imagePullSecrets": [{"name": "existing"}]
            }}}
        });
        let mut modified = original.clone();
        modified["spec"]["template"]["spec"]["imagePullSecrets"] =
            json!([{"name": "existing"}, {"name": "pull-a"}, {"name": "pull-b"}]);

        let patch = two_way_merge(&original, &modified);
        let mut patched = original;
        apply(&mut patched, &patch);
        assert_eq!(patched, modified);
    }
}
