//! Dotted-path access into YAML documents.

use crate::error::ComposeError;
use serde_yaml::{Mapping, Value};

fn key_matches(key: &Value, segment: &str) -> bool {
    match key {
        Value::String(s) => s == segment,
        Value::Number(n) => n.to_string() == segment,
        Value::Bool(b) => b.to_string() == segment,
        _ => false,
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Mapping(map) => map
            .iter()
            .find(|(k, _)| key_matches(k, segment))
            .map(|(_, v)| v),
        Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Mapping(map) => map
            .iter_mut()
            .find(|(k, _)| key_matches(k, segment))
            .map(|(_, v)| v),
        Value::Sequence(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Look up a dotted path. Integer segments index sequences.
pub fn get_path<'a>(doc: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(doc, |node, segment| child(node, segment))
}

pub fn contains_path(doc: &Value, segments: &[&str]) -> bool {
    get_path(doc, segments).is_some()
}

/// Set a dotted path, creating intermediate mappings as needed.
///
/// Fails if an intermediate node exists but is a scalar.
pub fn set_path(doc: &mut Value, segments: &[&str], value: Value) -> Result<(), ComposeError> {
    let Some((last, parents)) = segments.split_last() else {
        *doc = value;
        return Ok(());
    };

    let mut node = doc;
    for (depth, segment) in parents.iter().enumerate() {
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let exists = child(node, segment).is_some();
        if !exists {
            match node {
                Value::Mapping(map) => {
                    map.insert(Value::String((*segment).to_string()), Value::Mapping(Mapping::new()));
                }
                _ => return Err(not_a_mapping(segments, depth)),
            }
        }
        node = child_mut(node, segment).ok_or_else(|| not_a_mapping(segments, depth))?;
    }

    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    if let Some(slot) = child_mut(node, last) {
        *slot = value;
        return Ok(());
    }
    match node {
        Value::Mapping(map) => {
            map.insert(Value::String((*last).to_string()), value);
            Ok(())
        }
        _ => Err(not_a_mapping(segments, parents.len())),
    }
}

/// Remove a dotted path, returning the removed value.
pub fn remove_path(doc: &mut Value, segments: &[&str]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let mut node = doc;
    for segment in parents {
        node = child_mut(node, segment)?;
    }
    match node {
        Value::Mapping(map) => {
            let key = map.keys().find(|k| key_matches(k, last))?.clone();
            map.shift_remove(&key)
        }
        Value::Sequence(items) => {
            let index = last.parse::<usize>().ok().filter(|i| *i < items.len())?;
            Some(items.remove(index))
        }
        _ => None,
    }
}

/// Wrap `value` so it sits at `package` (e.g. `["db"]` gives `{db: value}`).
pub fn nest_under(package: &[&str], value: Value) -> Value {
    package.iter().rev().fold(value, |inner, segment| {
        let mut map = Mapping::new();
        map.insert(Value::String((*segment).to_string()), inner);
        Value::Mapping(map)
    })
}

fn not_a_mapping(segments: &[&str], depth: usize) -> ComposeError {
    ComposeError::NotAMapping {
        key: segments.join("."),
        parent: segments[..=depth.min(segments.len().saturating_sub(1))].join("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_get_path_through_sequences() {
        let doc = yaml("a: {b: [10, {c: 3}]}");
        assert_eq!(get_path(&doc, &["a", "b", "0"]), Some(&Value::from(10)));
        assert_eq!(get_path(&doc, &["a", "b", "1", "c"]), Some(&Value::from(3)));
        assert_eq!(get_path(&doc, &["a", "x"]), None);
        assert_eq!(get_path(&doc, &[]), Some(&doc));
    }

    #[test]
    fn test_set_path_creates_parents() {
        let mut doc = yaml("a: 1");
        set_path(&mut doc, &["b", "c", "d"], Value::from(2)).unwrap();
        assert_eq!(doc, yaml("{a: 1, b: {c: {d: 2}}}"));
        set_path(&mut doc, &["a"], Value::from("x")).unwrap();
        assert_eq!(doc["a"], Value::from("x"));
    }

    #[test]
    fn test_set_path_through_scalar_fails() {
        let mut doc = yaml("a: 1");
        let err = set_path(&mut doc, &["a", "b"], Value::from(2)).unwrap_err();
        assert!(matches!(err, ComposeError::NotAMapping { .. }));
    }

    #[test]
    fn test_remove_path_keeps_order() {
        let mut doc = yaml("{x: 1, y: 2, z: 3}");
        assert_eq!(remove_path(&mut doc, &["y"]), Some(Value::from(2)));
        let keys: Vec<&str> = doc
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["x", "z"]);
        assert_eq!(remove_path(&mut doc, &["nope"]), None);
    }

    #[test]
    fn test_nest_under() {
        assert_eq!(
            nest_under(&["a", "b"], Value::from(1)),
            yaml("a: {b: 1}")
        );
        assert_eq!(nest_under(&[], Value::from(1)), Value::from(1));
    }
}
