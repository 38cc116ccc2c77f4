//! Argument validation against a tool's declared JSON schema.
//!
//! Supports the subset the built-in tools declare: an object with typed
//! `properties`, a `required` list, `enum`, `minLength`, and
//! `additionalProperties: false`.

use serde_json::Value;
use crate::error::ToolError;

/// Validate `arguments` for `tool_name` against `schema`.
///
/// `null` arguments are treated as an empty object, since models commonly
/// omit arguments for parameterless tools.
pub fn validate_arguments(tool_name: &str, schema: &Value, arguments: &Value) -> Result<(), ToolError> {
    let empty = serde_json::Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ToolError::invalid(
                tool_name,
                format!("expected an object, got {}", type_name(other)),
            ));
        }
    };

    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            match args.get(key) {
                None | Some(Value::Null) => {
                    return Err(ToolError::invalid(tool_name, format!("missing required argument '{key}'")));
                }
                Some(_) => {}
            }
        }
    }

    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in args {
        let Some(prop) = properties.and_then(|p| p.get(key)) else {
            if closed {
                return Err(ToolError::invalid(tool_name, format!("unexpected argument '{key}'")));
            }
            continue;
        };
        // Optional arguments explicitly set to null are the same as absent.
        if value.is_null() {
            continue;
        }
        check_property(tool_name, key, prop, value)?;
    }

    Ok(())
}

fn check_property(tool_name: &str, key: &str, prop: &Value, value: &Value) -> Result<(), ToolError> {
    if let Some(expected) = prop.get("type").and_then(Value::as_str) {
        let ok = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !ok {
            return Err(ToolError::invalid(
                tool_name,
                format!("argument '{key}' must be {expected}, got {}", type_name(value)),
            ));
        }
    }

    if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(ToolError::invalid(tool_name, format!("argument '{key}' has a value outside its enum")));
        }
    }

    if let (Some(min), Some(s)) = (prop.get("minLength").and_then(Value::as_u64), value.as_str()) {
        if (s.trim().chars().count() as u64) < min {
            return Err(ToolError::invalid(tool_name, format!("argument '{key}' is too short")));
        }
    }

    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
