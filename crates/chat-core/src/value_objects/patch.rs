//! Partial updates applied to a single log entry
//!
//! A patch is an ordered list of slash-separated field paths, each either set
//! to a JSON value or removed. Setting `null` removes the field. Objects left
//! empty by a removal are pruned, so an empty reaction set disappears.

use serde_json::{Map, Value};

/// One field operation of a patch
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOp {
    pub path: Vec<String>,
    /// `None` removes the field
    pub value: Option<Value>,
}

/// Partial update of one entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    ops: Vec<PatchOp>,
}

impl Patch {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.ops.push(PatchOp {
            path: split_path(path),
            value: (!value.is_null()).then_some(value),
        });
        self
    }

    /// Remove a field
    #[must_use]
    pub fn remove(mut self, path: &str) -> Self {
        self.ops.push(PatchOp {
            path: split_path(path),
            value: None,
        });
        self
    }

    /// Operations in application order
    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Apply all operations to an entry value
    pub fn apply(&self, target: &mut Value) {
        for op in &self.ops {
            match &op.value {
                Some(value) => set_path(target, &op.path, value.clone()),
                None => remove_path(target, &op.path),
            }
        }
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was replaced with an object"),
    }
}

fn set_path(target: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *target = value;
        return;
    };

    let mut cursor = target;
    for segment in parents {
        cursor = ensure_object(cursor)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(cursor).insert(last.clone(), value);
}

fn remove_path(target: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.remove(first);
        return;
    }

    if let Some(child) = map.get_mut(first) {
        remove_path(child, rest);
        if child.as_object().is_some_and(Map::is_empty) {
            map.remove(first);
        }
    }
}
