//! Purpose: Convert between nested JSON and flat slash-delimited path maps.
//! Exports: `FlatMap`, `flatten`, `flatten_reader`, `unflatten`, `MAX_ARRAY_INDEX`.
//! Role: Pure transform used by import/delete (flatten) and export (unflatten).
//! Invariants: Flat keys never start with `/` and never contain empty segments.
//! Invariants: A path depth used as both object and array is `PathConflict`, never coerced.
//! Invariants: Array slots no key addressed become `""` on output.
//! Invariants: Numeric segments above `MAX_ARRAY_INDEX` are rejected on both sides, so
//! every flattened map can be rebuilt.
//! Notes: Empty objects and arrays have no leaves, so they do not survive a round trip.
use std::collections::BTreeMap;
use std::io::Read;

use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::scalar::Scalar;
use crate::json::parse;

pub type FlatMap = BTreeMap<String, Scalar>;

pub const PATH_DELIMITER: char = '/';

/// Largest array index accepted while rebuilding arrays.
pub const MAX_ARRAY_INDEX: usize = 65_535;

const HOLE_PLACEHOLDER: &str = "";

pub fn flatten(value: &Value) -> Result<FlatMap, Error> {
    if !matches!(value, Value::Object(_) | Value::Array(_)) {
        return Err(Error::new(ErrorKind::Decode)
            .with_message("top-level JSON value must be an object or an array")
            .with_hint("Wrap the value in an object, e.g. {\"value\": ...}."));
    }
    let mut out = FlatMap::new();
    flatten_into(value, "", &mut out)?;
    Ok(out)
}

/// Reads a whole JSON document and flattens it.
pub fn flatten_reader<R: Read>(mut reader: R) -> Result<FlatMap, Error> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read json input")
            .with_source(err)
    })?;
    let value: Value =
        parse::from_slice(&bytes).map_err(|err| parse::decode_error(err, "json input"))?;
    flatten(&value)
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatMap) -> Result<(), Error> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.is_empty() || key.contains(PATH_DELIMITER) {
                    return Err(Error::new(ErrorKind::Decode)
                        .with_message("object keys must be non-empty and must not contain '/'")
                        .with_key(join_path(prefix, key)));
                }
                let path = join_path(prefix, key);
                parse_index(key, &path)?;
                flatten_into(child, &path, out)?;
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let segment = index.to_string();
                let path = join_path(prefix, &segment);
                parse_index(&segment, &path)?;
                flatten_into(child, &path, out)?;
            }
        }
        leaf => {
            if let Some(scalar) = Scalar::from_json(leaf) {
                out.insert(prefix.to_string(), scalar);
            }
        }
    }
    Ok(())
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}{PATH_DELIMITER}{segment}")
    }
}

/// Rebuilds a nested value from flat entries, merging them in key order.
pub fn unflatten(flat: &FlatMap) -> Result<Value, Error> {
    let mut tree: Option<Node> = None;
    for (key, scalar) in flat {
        let branch = branch_for(key, scalar.clone())?;
        tree = Some(match tree.take() {
            None => branch,
            Some(existing) => merge(existing, branch, key)?,
        });
    }
    Ok(tree
        .map(Node::into_value)
        .unwrap_or_else(|| Value::Object(Map::new())))
}

/// Intermediate tree that keeps array holes distinct from real values.
#[derive(Debug)]
enum Node {
    Leaf(Scalar),
    Object(BTreeMap<String, Node>),
    Array(Vec<Option<Node>>),
}

impl Node {
    fn into_value(self) -> Value {
        match self {
            Node::Leaf(scalar) => scalar.into_json(),
            Node::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, node)| (key, node.into_value()))
                    .collect(),
            ),
            Node::Array(slots) => Value::Array(
                slots
                    .into_iter()
                    .map(|slot| match slot {
                        Some(node) => node.into_value(),
                        None => Value::String(HOLE_PLACEHOLDER.to_string()),
                    })
                    .collect(),
            ),
        }
    }
}

fn split_key(key: &str) -> Result<Vec<&str>, Error> {
    let trimmed = key.strip_prefix(PATH_DELIMITER).unwrap_or(key);
    if trimmed.is_empty() {
        return Err(Error::new(ErrorKind::Decode)
            .with_message("empty parameter path")
            .with_key(key));
    }
    let segments: Vec<&str> = trimmed.split(PATH_DELIMITER).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(Error::new(ErrorKind::Decode)
            .with_message("parameter path has an empty segment")
            .with_key(key));
    }
    Ok(segments)
}

fn parse_index(segment: &str, key: &str) -> Result<Option<usize>, Error> {
    if !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(None);
    }
    match segment.parse::<usize>() {
        Ok(index) if index <= MAX_ARRAY_INDEX => Ok(Some(index)),
        _ => Err(Error::new(ErrorKind::Decode)
            .with_message(format!(
                "array index {segment} exceeds the maximum of {MAX_ARRAY_INDEX}"
            ))
            .with_key(key)),
    }
}

/// Wraps a leaf from the innermost segment outwards into a single-branch tree.
fn branch_for(key: &str, scalar: Scalar) -> Result<Node, Error> {
    let mut node = Node::Leaf(scalar);
    for segment in split_key(key)?.into_iter().rev() {
        node = match parse_index(segment, key)? {
            Some(index) => {
                let mut slots = Vec::with_capacity(index + 1);
                slots.resize_with(index, || None);
                slots.push(Some(node));
                Node::Array(slots)
            }
            None => Node::Object(BTreeMap::from([(segment.to_string(), node)])),
        };
    }
    Ok(node)
}

fn merge(existing: Node, incoming: Node, key: &str) -> Result<Node, Error> {
    match (existing, incoming) {
        (Node::Object(mut entries), Node::Object(incoming)) => {
            for (name, node) in incoming {
                let merged = match entries.remove(&name) {
                    Some(current) => merge(current, node, key)?,
                    None => node,
                };
                entries.insert(name, merged);
            }
            Ok(Node::Object(entries))
        }
        (Node::Array(mut slots), Node::Array(incoming)) => {
            if slots.len() < incoming.len() {
                slots.resize_with(incoming.len(), || None);
            }
            for (index, slot) in incoming.into_iter().enumerate() {
                let Some(node) = slot else {
                    continue;
                };
                slots[index] = Some(match slots[index].take() {
                    Some(current) => merge(current, node, key)?,
                    None => node,
                });
            }
            Ok(Node::Array(slots))
        }
        (Node::Object(_), Node::Array(_)) | (Node::Array(_), Node::Object(_)) => {
            Err(Error::new(ErrorKind::PathConflict)
                .with_message("path is used as both an object and an array")
                .with_key(key)
                .with_hint("Make every key agree on numeric vs named segments at each depth."))
        }
        (_, incoming) => Ok(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::{FlatMap, flatten, flatten_reader, unflatten};
    use crate::core::error::ErrorKind;
    use crate::core::scalar::Scalar;
    use serde_json::{Value, json};

    fn flat(entries: &[(&str, Scalar)]) -> FlatMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn flatten_nested_object() {
        let value = json!({
            "name": "bernard",
            "address": {
                "city": "melbourne",
                "code": 3000,
                "address": {"street": "flinders", "number": 1}
            }
        });
        let expected = flat(&[
            ("name", "bernard".into()),
            ("address/city", "melbourne".into()),
            ("address/code", 3000.0.into()),
            ("address/address/street", "flinders".into()),
            ("address/address/number", 1.0.into()),
        ]);
        assert_eq!(flatten(&value).unwrap(), expected);
    }

    #[test]
    fn flatten_objects_inside_arrays() {
        let value = json!([
            {"name": "bernard", "colors": ["red", "blue"]},
            {"name": "keith", "colors": ["black", "white"]}
        ]);
        let expected = flat(&[
            ("0/name", "bernard".into()),
            ("0/colors/0", "red".into()),
            ("0/colors/1", "blue".into()),
            ("1/name", "keith".into()),
            ("1/colors/0", "black".into()),
            ("1/colors/1", "white".into()),
        ]);
        assert_eq!(flatten(&value).unwrap(), expected);
    }

    #[test]
    fn flatten_keeps_bool_and_null_kinds() {
        let value = json!({"enabled": false, "owner": null});
        let expected = flat(&[("enabled", false.into()), ("owner", Scalar::Nil)]);
        assert_eq!(flatten(&value).unwrap(), expected);
    }

    #[test]
    fn flatten_rejects_top_level_scalar() {
        let err = flatten(&json!("just a string")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn flatten_rejects_keys_with_delimiter() {
        let err = flatten(&json!({"a/b": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.key(), Some("a/b"));
    }

    #[test]
    fn flatten_rejects_numeric_keys_unflatten_cannot_rebuild() {
        let value = json!({"zips": {"100000": "beijing"}});
        let err = flatten(&value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.key(), Some("zips/100000"));

        let value = json!({"zips": {"65535": "beijing"}});
        let map = flatten(&value).unwrap();
        let rebuilt = unflatten(&map).unwrap();
        assert_eq!(rebuilt["zips"][65_535], "beijing");
    }

    #[test]
    fn flatten_reader_reports_malformed_json() {
        let err = flatten_reader(&b"{\"name\": "[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let map = flatten_reader(&br#"{"name": "bernard"}"#[..]).unwrap();
        assert_eq!(map.get("name"), Some(&Scalar::from("bernard")));
    }

    #[test]
    fn unflatten_builds_array_of_objects() {
        let map = flat(&[
            ("0/name", "bernard".into()),
            ("0/address/work", "1 flinders".into()),
            ("0/address/home", "1 st kilda rd".into()),
        ]);
        let expected = json!([{
            "name": "bernard",
            "address": {"work": "1 flinders", "home": "1 st kilda rd"}
        }]);
        assert_eq!(unflatten(&map).unwrap(), expected);
    }

    #[test]
    fn unflatten_strips_one_leading_slash() {
        let map = flat(&[
            ("/users/0/name", "bernard".into()),
            ("/users/0/interests/0", "diy".into()),
            ("/users/0/interests/1", "gym".into()),
            ("/users/1/name", "keith".into()),
        ]);
        let expected = json!({"users": [
            {"name": "bernard", "interests": ["diy", "gym"]},
            {"name": "keith"}
        ]});
        assert_eq!(unflatten(&map).unwrap(), expected);
    }

    #[test]
    fn round_trip_restores_value() {
        let value = json!({
            "service": "billing",
            "replicas": 3,
            "ratio": 0.75,
            "debug": true,
            "owner": null,
            "hosts": [
                {"name": "a", "ports": [80, 443]},
                {"name": "b", "ports": [8080]}
            ]
        });
        let map = flatten(&value).unwrap();
        assert_eq!(unflatten(&map).unwrap(), value);
        assert_eq!(flatten(&unflatten(&map).unwrap()).unwrap(), map);
    }

    #[test]
    fn non_contiguous_indices_leave_placeholders() {
        let map = flat(&[("list/0", "x".into()), ("list/3", "y".into())]);
        assert_eq!(unflatten(&map).unwrap(), json!({"list": ["x", "", "", "y"]}));
    }

    #[test]
    fn holes_never_overwrite_filled_slots() {
        let map = flat(&[
            ("0/name", "bernard".into()),
            ("1/name", "keith".into()),
            ("2/name", "ruth".into()),
        ]);
        let value = unflatten(&map).unwrap();
        assert_eq!(value[0]["name"], "bernard");
        assert_eq!(value[1]["name"], "keith");
        assert_eq!(value[2]["name"], "ruth");
    }

    #[test]
    fn object_and_array_at_same_depth_conflict() {
        let map = flat(&[("items/0", "x".into()), ("items/name", "y".into())]);
        let err = unflatten(&map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathConflict);
        assert_eq!(err.key(), Some("items/name"));
    }

    #[test]
    fn container_replaces_scalar_in_key_order() {
        let map = flat(&[("a", "x".into()), ("a/b", "y".into())]);
        assert_eq!(unflatten(&map).unwrap(), json!({"a": {"b": "y"}}));
    }

    #[test]
    fn empty_map_is_empty_object() {
        assert_eq!(unflatten(&FlatMap::new()).unwrap(), json!({}));
    }

    #[test]
    fn malformed_keys_are_decode_errors() {
        for key in ["", "/", "a//b", "a/"] {
            let map = flat(&[(key, "x".into())]);
            let err = unflatten(&map).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decode, "key {key:?}");
        }
    }

    #[test]
    fn oversized_index_is_rejected() {
        let map = flat(&[("list/99999999", "x".into())]);
        let err = unflatten(&map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn scalar_leaves_are_typed_on_output() {
        let map = flat(&[
            ("code", 3000.0.into()),
            ("active", true.into()),
            ("none", Scalar::Nil),
        ]);
        let value = unflatten(&map).unwrap();
        assert_eq!(value, json!({"code": 3000, "active": true, "none": Value::Null}));
    }
}
