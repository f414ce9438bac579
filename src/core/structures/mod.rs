//! Helpers for reshaping loosely-typed data loaded from YAML or JSON.

use serde_json::Value;
use serde_yaml::Value as YamlValue;
use std::collections::HashMap;
use std::path::PathBuf;

/// Deep-merges `overlay` into a copy of `base`.
///
/// Objects are merged key by key, recursing where both sides hold an
/// object. Anything else in `overlay` replaces what `base` had.
pub fn dict_merge(base: &Value, overlay: &Value) -> Value {
    let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
        return overlay.clone();
    };

    let mut merged = base_map.clone();
    for (key, value) in overlay_map {
        let entry = match merged.get(key) {
            Some(existing @ Value::Object(_)) => dict_merge(existing, value),
            _ => value.clone(),
        };
        merged.insert(key.clone(), entry);
    }
    Value::Object(merged)
}

/// Coerces a value into a flat list.
///
/// Arrays are returned as they are and strings become a one-element list.
/// Objects yield their values, with nested objects flattened in place, or
/// their keys when `use_keys` is set. Other types are not covered and give
/// `None`.
pub fn to_list(value: &Value, use_keys: bool) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(_) => Some(vec![value.clone()]),
        Value::Object(map) if use_keys => Some(map.keys().cloned().map(Value::String).collect()),
        Value::Object(map) => {
            let mut res = Vec::new();
            for item in map.values() {
                match item {
                    Value::Object(_) => res.extend(to_list(item, false).unwrap_or_default()),
                    other => res.push(other.clone()),
                }
            }
            Some(res)
        }
        other => {
            crate::log_warning!("structures", "type for {} uncovered", other);
            None
        }
    }
}

fn scalar_to_string(value: &YamlValue) -> String {
    match value {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// `!str_join [a, b, c]` -> `"abc"`
pub fn yaml_str_join(items: &[YamlValue]) -> String {
    items.iter().map(scalar_to_string).collect()
}

/// `!loc_join [name, sub, file]` -> `<location of name>/sub/file`
///
/// Items naming a known location are replaced by its path before joining.
pub fn yaml_loc_join(items: &[YamlValue], locations: &HashMap<String, String>) -> String {
    let mut path = PathBuf::new();
    for item in items {
        let part = scalar_to_string(item);
        match locations.get(&part) {
            Some(location) => path.push(location),
            None => path.push(part),
        }
    }
    path.to_string_lossy().into_owned()
}

/// Replaces every `!str_join` and `!loc_join` tagged sequence in `value`.
/// Unknown tags are left untouched.
pub fn resolve_tags(value: YamlValue, locations: &HashMap<String, String>) -> YamlValue {
    match value {
        YamlValue::Sequence(items) => YamlValue::Sequence(
            items
                .into_iter()
                .map(|item| resolve_tags(item, locations))
                .collect(),
        ),
        YamlValue::Mapping(map) => YamlValue::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, resolve_tags(v, locations)))
                .collect(),
        ),
        YamlValue::Tagged(mut tagged) => {
            let inner = std::mem::replace(&mut tagged.value, YamlValue::Null);
            tagged.value = resolve_tags(inner, locations);

            let joined = match &tagged.value {
                YamlValue::Sequence(items) if tagged.tag == "str_join" => Some(yaml_str_join(items)),
                YamlValue::Sequence(items) if tagged.tag == "loc_join" => {
                    Some(yaml_loc_join(items, locations))
                }
                _ => None,
            };
            match joined {
                Some(s) => YamlValue::String(s),
                None => YamlValue::Tagged(tagged),
            }
        }
        other => other,
    }
}
