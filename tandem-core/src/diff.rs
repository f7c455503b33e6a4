//! Structural diff between two snapshots.
//!
//! [`diff`] walks `current` and reports every leaf that differs from
//! `previous` as a [`Difference`] carrying the *current* value.
//!
//! ## Rules, applied at every node
//!
//! 1. Equal nodes produce nothing.
//! 2. Callable nodes in `current` are skipped.
//! 3. Two arrays of different length produce one replacement at the node;
//!    equal lengths recurse element-wise.
//! 4. Two records recurse over the keys of `current` only. A key missing
//!    from `previous` is reported as a replacement at that key.
//! 5. Anything else (kind mismatch, `null` against a container, two unequal
//!    primitives) produces one replacement at the node.
//!
//! A replacement at the root carries the empty path.
//!
//! Traversal is depth-first, records in key order, arrays in index order.
//! Reordered arrays of equal length are reported slot by slot; there is no
//! identity-based move detection.

use crate::error::PathError;
use crate::path::{FieldPath, Segment};
use crate::value::Value;

/// One detected change: the value `current` holds at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub path: FieldPath,
    pub value: Value,
}

impl Difference {
    pub fn new(path: FieldPath, value: Value) -> Self {
        Self { path, value }
    }

    /// Whether this difference replaces the whole snapshot.
    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }
}

/// Differences between `current` and `previous`, in traversal order.
pub fn diff(current: &Value, previous: &Value) -> Vec<Difference> {
    diff_at(&FieldPath::root(), current, previous)
}

/// Like [`diff`], with every reported path placed under `prefix`.
pub fn diff_at(prefix: &FieldPath, current: &Value, previous: &Value) -> Vec<Difference> {
    let mut out = Vec::new();
    let mut path = prefix.clone();
    walk(&mut path, current, Some(previous), &mut out);
    out
}

fn walk(path: &mut FieldPath, current: &Value, previous: Option<&Value>, out: &mut Vec<Difference>) {
    if current.is_callable() || previous.is_some_and(|p| std::ptr::eq(p, current)) {
        return;
    }

    match (current, previous) {
        (Value::Array(cur), Some(Value::Array(prev))) => {
            if cur.len() != prev.len() {
                out.push(Difference::new(path.clone(), current.clone()));
                return;
            }
            for (index, (c, p)) in cur.iter().zip(prev).enumerate() {
                path.push(Segment::Index(index));
                walk(path, c, Some(p), out);
                path.pop();
            }
        }
        (Value::Object(cur), Some(Value::Object(prev))) => {
            for (key, c) in cur {
                path.push(Segment::Key(key.clone()));
                walk(path, c, prev.get(key), out);
                path.pop();
            }
        }
        // Containers were handled above, so this compares leaves only.
        (_, Some(prev)) if prev == current => {}
        _ => out.push(Difference::new(path.clone(), current.clone())),
    }
}

/// Writes every difference into `target`, in order.
///
/// Applying `diff(current, previous)` onto a copy of `previous` makes that
/// copy agree with `current` on every path the diff visited.
pub fn apply(target: &mut Value, differences: &[Difference]) -> Result<(), PathError> {
    for difference in differences {
        target.set_path(&difference.path, difference.value.clone())?;
    }
    Ok(())
}
