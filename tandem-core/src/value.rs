//! Snapshot values.
//!
//! A [`Value`] is a nested tree of records and sequences with primitive
//! leaves. Records enumerate their keys in lexicographic order, which is the
//! traversal order the diff engine commits to. [`Value::Callable`] leaves are
//! opaque, non-data members: they never take part in diffing, cloning for
//! defaults, or JSON output.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

use crate::error::PathError;
use crate::path::{FieldPath, Segment};

/// Record storage: key → value, enumerated in key order.
pub type Record = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Callable
// ---------------------------------------------------------------------------

/// An opaque callable member of a snapshot (an action on a store, say).
///
/// Two callables are equal only when they share the same allocation.
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(&[Value]) -> Value>);

impl Callable {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A node of a state snapshot.
///
/// Numbers compare by numeric value, so `1` and `1.0` are equal.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(Record),
    Callable(Callable),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

/// Integers compare exactly; as soon as either side is a float both are
/// compared as `f64`.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        a.as_f64() == b.as_f64()
    } else {
        a == b
    }
}

impl Value {
    /// Wraps a closure as a callable member.
    pub fn callable(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Callable(Callable::new(f))
    }

    /// An empty record.
    pub fn object() -> Self {
        Value::Object(Record::new())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Callable(_) => "callable",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Record member lookup; `None` for non-records and missing keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }

    /// Converts to plain JSON.
    ///
    /// Callables are omitted from records and become `null` inside arrays,
    /// so sequence indices keep their meaning.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Callable(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(record) => serde_json::Value::Object(
                record
                    .iter()
                    .filter(|(_, v)| !v.is_callable())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Path access
    // -----------------------------------------------------------------------

    /// Reads the node at `path`. The root path returns `self`.
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| match node {
                Value::Object(record) => record.get(&segment.to_key()),
                Value::Array(items) => items.get(segment.as_index()?),
                _ => None,
            })
    }

    /// Writes `value` at `path`, creating missing record keys on the way.
    ///
    /// A missing or `null` intermediate becomes an array when the next
    /// segment is an index and a record otherwise. Writing one slot past the
    /// end of an array appends. The root path replaces `self` entirely.
    ///
    /// The whole path is checked before anything is written: on error
    /// `self` is left untouched.
    pub fn set_path(&mut self, path: &FieldPath, value: Value) -> Result<(), PathError> {
        self.check_writable(path)?;

        let Some((last, parents)) = path.segments().split_last() else {
            *self = value;
            return Ok(());
        };

        let mut node = self;
        for (depth, segment) in parents.iter().enumerate() {
            let next = &path.segments()[depth + 1];
            node = descend(node, segment, next, path)?;
        }

        if node.is_null() {
            *node = container_for(last);
        }
        match node {
            Value::Object(record) => {
                record.insert(last.to_key(), value);
                Ok(())
            }
            Value::Array(items) => {
                let index = last.as_index().ok_or_else(|| mismatch(path, last, "array"))?;
                let len = items.len();
                match index.cmp(&len) {
                    std::cmp::Ordering::Less => items[index] = value,
                    std::cmp::Ordering::Equal => items.push(value),
                    std::cmp::Ordering::Greater => {
                        return Err(PathError::OutOfBounds {
                            path: path.to_string(),
                            index,
                            len,
                        })
                    }
                }
                Ok(())
            }
            other => Err(mismatch(path, last, other.kind())),
        }
    }

    /// Read-only dry run of [`Value::set_path`].
    ///
    /// Walks the existing nodes; once the path leaves them, every container
    /// `set_path` would create is empty, so an index into it must be `0`.
    fn check_writable(&self, path: &FieldPath) -> Result<(), PathError> {
        let mut node = Some(self);
        for segment in path.segments() {
            node = match node {
                None | Some(Value::Null) => match segment {
                    Segment::Index(index) if *index > 0 => {
                        return Err(PathError::OutOfBounds {
                            path: path.to_string(),
                            index: *index,
                            len: 0,
                        })
                    }
                    _ => None,
                },
                Some(Value::Object(record)) => record.get(&segment.to_key()),
                Some(Value::Array(items)) => {
                    let index = segment
                        .as_index()
                        .ok_or_else(|| mismatch(path, segment, "array"))?;
                    if index > items.len() {
                        return Err(PathError::OutOfBounds {
                            path: path.to_string(),
                            index,
                            len: items.len(),
                        });
                    }
                    items.get(index)
                }
                Some(other) => return Err(mismatch(path, segment, other.kind())),
            };
        }
        Ok(())
    }

    /// Paths of every data leaf, in traversal order.
    ///
    /// Callables are skipped. Empty records and arrays contribute nothing; a
    /// primitive root yields the root path.
    pub fn leaf_paths(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        let mut path = FieldPath::root();
        collect_leaves(self, &mut path, &mut out);
        out
    }
}

fn descend<'a>(
    node: &'a mut Value,
    segment: &Segment,
    next: &Segment,
    path: &FieldPath,
) -> Result<&'a mut Value, PathError> {
    if node.is_null() {
        *node = container_for(segment);
    }
    match node {
        Value::Object(record) => Ok(record
            .entry(segment.to_key())
            .or_insert_with(|| container_for(next))),
        Value::Array(items) => {
            let index = segment
                .as_index()
                .ok_or_else(|| mismatch(path, segment, "array"))?;
            let len = items.len();
            if index == len {
                items.push(container_for(next));
            }
            items.get_mut(index).ok_or_else(|| PathError::OutOfBounds {
                path: path.to_string(),
                index,
                len,
            })
        }
        other => Err(mismatch(path, segment, other.kind())),
    }
}

fn container_for(segment: &Segment) -> Value {
    match segment {
        Segment::Index(_) => Value::Array(Vec::new()),
        Segment::Key(_) => Value::object(),
    }
}

fn mismatch(path: &FieldPath, segment: &Segment, kind: &'static str) -> PathError {
    PathError::Mismatch {
        path: path.to_string(),
        segment: segment.to_string(),
        kind,
    }
}

fn collect_leaves(node: &Value, path: &mut FieldPath, out: &mut Vec<FieldPath>) {
    match node {
        Value::Callable(_) => {}
        Value::Object(record) => {
            for (key, child) in record {
                path.push(key.as_str());
                collect_leaves(child, path, out);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(index);
                collect_leaves(child, path, out);
                path.pop();
            }
        }
        _ => out.push(path.clone()),
    }
}

/// Shallow record merge: `{...base, ...overlay}`.
///
/// Overlay keys win. When either side is not a record the overlay replaces
/// the base outright.
pub fn merge_shallow(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            base.extend(overlay);
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and map to `null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
