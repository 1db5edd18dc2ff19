//! Resolution of reference nodes inside argument trees

use crate::error::Result;
use crate::scope::Scope;
use crate::types::Value;

/// Replace every reference node in `value` with what its path names in `scope`
///
/// Mappings keep their keys and order, sequences their order. Scalars and
/// host values come back unchanged.
pub fn dereference(value: &Value, scope: &Scope) -> Result<Value> {
    if let Some(path) = value.as_reference() {
        tracing::debug!("Dereferencing {}", path);
        return scope.lookup(path);
    }
    match value {
        Value::Object(mapping) => Ok(Value::Object(
            mapping
                .iter()
                .map(|(key, item)| Ok((key.clone(), dereference(item, scope)?)))
                .collect::<Result<_>>()?,
        )),
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| dereference(item, scope))
                .collect::<Result<_>>()?,
        )),
        other => Ok(other.clone()),
    }
}
