//! Callable-free deep copies of snapshots.

use crate::value::Value;

/// Deep-copies `value`, dropping every callable record member.
///
/// Arrays keep all of their slots: elements are copied one by one and a
/// callable element passes through as-is, so indices never shift. A callable
/// root is returned unchanged.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(record) => Value::Object(
            record
                .iter()
                .filter(|(_, member)| !member.is_callable())
                .map(|(key, member)| (key.clone(), sanitize(member)))
                .collect(),
        ),
        other => other.clone(),
    }
}
