//! Raw-result value conventions and conversion to client wire form.
//!
//! Execution engines hand back plain JSON, with two reserved object
//! shapes: rich scalars (timestamps, enumerated atoms, decimals) arrive as
//! `{"$scalar": <kind>, "value": <v>}` wrappers, and a calculation the
//! engine never computed arrives as `{"$not_loaded": true}`. Wire form
//! unwraps scalar wrappers to their inner value; plain containers keep
//! their structure.

use serde_json::Value;

/// Key marking a scalar wrapper object in a raw result.
pub const SCALAR_WRAPPER_KEY: &str = "$scalar";

/// Key marking a "not computed" placeholder in a raw result.
pub const NOT_LOADED_KEY: &str = "$not_loaded";

/// True when the value is a scalar wrapper, which must never be recursed
/// into as if it were a plain map.
pub fn is_scalar_wrapper(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key(SCALAR_WRAPPER_KEY))
}

/// True when the value is the "not computed" placeholder.
pub fn is_not_loaded(value: &Value) -> bool {
    matches!(
        value,
        Value::Object(map) if map.get(NOT_LOADED_KEY).and_then(Value::as_bool) == Some(true)
    )
}

/// Convert a raw value to client wire form.
///
/// Scalar wrappers collapse to their inner value at any depth; objects and
/// arrays are otherwise preserved as-is.
pub fn to_wire(value: &Value) -> Value {
    match value {
        Value::Object(map) if map.contains_key(SCALAR_WRAPPER_KEY) => {
            map.get("value").cloned().unwrap_or(Value::Null)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), to_wire(child)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(to_wire).collect()),
        other => other.clone(),
    }
}
