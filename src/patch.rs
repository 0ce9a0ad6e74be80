//! Structural patches between widget snapshots.
//!
//! A [`Patch`] is an ordered list of [`PatchOp`]s addressed with RFC 6901 JSON
//! pointers and serialized in the JSON Patch shape:
//!
//! ```json
//! [{"op": "replace", "path": "/props/value", "value": 2}]
//! ```
//!
//! [`diff`] keeps patches small for the common case of a subtree whose shape
//! is stable. Arrays are compared by position, so an insertion in the middle
//! shows up as replacements followed by a trailing add.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::PatchError;

/// One patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Inserts `value` at `path`.
    Add {
        /// Target location.
        path: String,
        /// Inserted value.
        value: Value,
    },
    /// Removes the value at `path`.
    Remove {
        /// Target location.
        path: String,
    },
    /// Replaces the value at `path`.
    Replace {
        /// Target location.
        path: String,
        /// New value.
        value: Value,
    },
}

impl PatchOp {
    /// The JSON pointer this operation targets.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }
}

/// An ordered sequence of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOp>);

impl Patch {
    /// The operations in application order.
    #[must_use]
    pub fn ops(&self) -> &[PatchOp] {
        &self.0
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the snapshots were equal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies every operation to `target` in order.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] when a pointer does not resolve. Operations
    /// before the failing one stay applied.
    pub fn apply(&self, target: &mut Value) -> Result<(), PatchError> {
        self.0.iter().try_for_each(|op| apply_op(target, op))
    }
}

impl From<Vec<PatchOp>> for Patch {
    fn from(ops: Vec<PatchOp>) -> Self {
        Self(ops)
    }
}

impl IntoIterator for Patch {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Computes the operations turning `before` into `after`.
#[must_use]
pub fn diff(before: &Value, after: &Value) -> Patch {
    let mut ops = Vec::new();
    diff_at(&mut String::new(), before, after, &mut ops);
    Patch(ops)
}

fn diff_at(path: &mut String, before: &Value, after: &Value, ops: &mut Vec<PatchOp>) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => diff_objects(path, old, new, ops),
        (Value::Array(old), Value::Array(new)) => diff_arrays(path, old, new, ops),
        _ if before == after => {}
        _ => ops.push(PatchOp::Replace {
            path: path.clone(),
            value: after.clone(),
        }),
    }
}

fn diff_objects(
    path: &mut String,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    ops: &mut Vec<PatchOp>,
) {
    for key in old.keys().filter(|key| !new.contains_key(*key)) {
        ops.push(PatchOp::Remove {
            path: child_path(path, key),
        });
    }
    for (key, value) in new {
        match old.get(key) {
            Some(previous) => {
                let len = path.len();
                push_token(path, key);
                diff_at(path, previous, value, ops);
                path.truncate(len);
            }
            None => ops.push(PatchOp::Add {
                path: child_path(path, key),
                value: value.clone(),
            }),
        }
    }
}

fn diff_arrays(path: &mut String, old: &[Value], new: &[Value], ops: &mut Vec<PatchOp>) {
    let common = old.len().min(new.len());
    for (index, (previous, value)) in old.iter().zip(new).enumerate() {
        let len = path.len();
        push_token(path, &index.to_string());
        diff_at(path, previous, value, ops);
        path.truncate(len);
    }
    for (index, value) in new.iter().enumerate().skip(common) {
        ops.push(PatchOp::Add {
            path: child_path(path, &index.to_string()),
            value: value.clone(),
        });
    }
    // Highest index first so earlier removals don't shift later ones.
    for index in (common..old.len()).rev() {
        ops.push(PatchOp::Remove {
            path: child_path(path, &index.to_string()),
        });
    }
}

fn push_token(path: &mut String, token: &str) {
    path.push('/');
    for c in token.chars() {
        match c {
            '~' => path.push_str("~0"),
            '/' => path.push_str("~1"),
            c => path.push(c),
        }
    }
}

fn child_path(path: &str, token: &str) -> String {
    let mut child = path.to_string();
    push_token(&mut child, token);
    child
}

fn parse_pointer(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PatchError::InvalidPointer(pointer.to_string()));
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn array_index(token: &str, len: usize, pointer: &str) -> Result<usize, PatchError> {
    if token.len() > 1 && token.starts_with('0') {
        return Err(PatchError::InvalidIndex(pointer.to_string()));
    }
    token
        .parse::<usize>()
        .ok()
        .filter(|index| *index < len)
        .ok_or_else(|| PatchError::InvalidIndex(pointer.to_string()))
}

fn apply_op(target: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    let pointer = op.path();
    let mut tokens = parse_pointer(pointer)?;
    let Some(last) = tokens.pop() else {
        match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => *target = value.clone(),
            PatchOp::Remove { .. } => *target = Value::Null,
        }
        return Ok(());
    };

    let mut parent = target;
    for token in &tokens {
        parent = match parent {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?,
            Value::Array(items) => {
                let index = array_index(token, items.len(), pointer)?;
                &mut items[index]
            }
            _ => return Err(PatchError::NotAContainer(pointer.to_string())),
        };
    }

    match (parent, op) {
        (Value::Object(map), PatchOp::Add { value, .. }) => {
            map.insert(last, value.clone());
        }
        (Value::Object(map), PatchOp::Replace { value, .. }) => {
            let slot = map
                .get_mut(&last)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
            *slot = value.clone();
        }
        (Value::Object(map), PatchOp::Remove { .. }) => {
            map.remove(&last)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
        }
        (Value::Array(items), PatchOp::Add { value, .. }) => {
            let index = if last == "-" {
                items.len()
            } else {
                array_index(&last, items.len() + 1, pointer)?
            };
            items.insert(index, value.clone());
        }
        (Value::Array(items), PatchOp::Replace { value, .. }) => {
            let index = array_index(&last, items.len(), pointer)?;
            items[index] = value.clone();
        }
        (Value::Array(items), PatchOp::Remove { .. }) => {
            let index = array_index(&last, items.len(), pointer)?;
            items.remove(index);
        }
        _ => return Err(PatchError::NotAContainer(pointer.to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_round_trip(before: &Value, after: &Value) -> Patch {
        let patch = diff(before, after);
        let mut patched = before.clone();
        patch.apply(&mut patched).unwrap();
        assert_eq!(&patched, after, "patch {patch:?} did not reproduce the target");
        patch
    }

    #[test]
    fn equal_values_produce_empty_patch() {
        let value = json!({"id": "a", "children": [1, 2]});
        assert!(diff(&value, &value).is_empty());
    }

    #[test]
    fn changed_prop_is_a_single_replace() {
        let before = json!({"id": "b", "type": "Text", "props": {"value": 1}, "children": []});
        let after = json!({"id": "b", "type": "Text", "props": {"value": 2}, "children": []});
        let patch = assert_round_trip(&before, &after);
        assert_eq!(
            patch.ops(),
            &[PatchOp::Replace {
                path: "/props/value".into(),
                value: json!(2)
            }]
        );
    }

    #[test]
    fn arrays_grow_and_shrink_at_the_end() {
        let grow = assert_round_trip(&json!([1, 2]), &json!([1, 2, 3, 4]));
        assert_eq!(grow.len(), 2);
        assert!(grow.ops().iter().all(|op| matches!(op, PatchOp::Add { .. })));

        let shrink = assert_round_trip(&json!([1, 2, 3, 4]), &json!([1]));
        assert_eq!(
            shrink.ops().iter().map(PatchOp::path).collect::<Vec<_>>(),
            vec!["/3", "/2", "/1"]
        );
    }

    #[test]
    fn keys_are_escaped() {
        let before = json!({"a/b": 1, "c~d": 1});
        let after = json!({"a/b": 2});
        let patch = assert_round_trip(&before, &after);
        let paths = patch.ops().iter().map(PatchOp::path).collect::<Vec<_>>();
        assert!(paths.contains(&"/a~1b"));
        assert!(paths.contains(&"/c~0d"));
    }

    #[test]
    fn type_change_replaces_the_root() {
        let patch = assert_round_trip(&json!({"a": 1}), &json!([1]));
        assert_eq!(patch.ops()[0].path(), "");
    }

    #[test]
    fn nested_structures_round_trip() {
        let before = json!({
            "id": "root", "type": "Stack", "props": {"gap": 4},
            "children": [
                {"id": "x", "type": "Text", "props": {"content": "a"}, "children": []},
                {"id": "y", "type": "Text", "props": {"content": "b"}, "children": []}
            ]
        });
        let after = json!({
            "id": "root", "type": "Stack", "props": {},
            "children": [
                {"id": "x", "type": "Card", "props": {"title": "a"}, "events": ["click"], "children": []}
            ]
        });
        assert_round_trip(&before, &after);
    }

    #[test]
    fn serializes_in_json_patch_shape() {
        let patch = Patch::from(vec![
            PatchOp::Add {
                path: "/children/1".into(),
                value: json!({"id": "z"}),
            },
            PatchOp::Remove {
                path: "/props/x".into(),
            },
        ]);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([
                {"op": "add", "path": "/children/1", "value": {"id": "z"}},
                {"op": "remove", "path": "/props/x"}
            ])
        );
    }

    #[test]
    fn apply_rejects_bad_pointers() {
        let mut value = json!({"a": [1]});
        let bad = Patch::from(vec![PatchOp::Remove { path: "a".into() }]);
        assert_eq!(
            bad.apply(&mut value),
            Err(PatchError::InvalidPointer("a".into()))
        );
        let missing = Patch::from(vec![PatchOp::Replace {
            path: "/b/c".into(),
            value: json!(1),
        }]);
        assert_eq!(
            missing.apply(&mut value),
            Err(PatchError::PathNotFound("/b/c".into()))
        );
        let out_of_range = Patch::from(vec![PatchOp::Remove { path: "/a/3".into() }]);
        assert_eq!(
            out_of_range.apply(&mut value),
            Err(PatchError::InvalidIndex("/a/3".into()))
        );
    }
}
