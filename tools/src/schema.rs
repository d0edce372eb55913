//! Argument schemas: rendering, defaulting, and JSON Schema validation

use serde_json::{json, Map, Value};

use crate::error::ProbeError;
use crate::registry::ParamSpec;

/// JSON Schema object describing a tool's parameters.
pub fn parameters_schema(params: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| {
            let mut prop = json!({
                "type": p.kind.as_str(),
                "description": p.description,
            });
            if let Some(default) = &p.default {
                prop["default"] = default.clone();
            }
            if let Some(min) = p.minimum {
                prop["minimum"] = json!(min);
            }
            if let Some(max) = p.maximum {
                prop["maximum"] = json!(max);
            }
            (p.name.clone(), prop)
        })
        .collect();

    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.default.is_none())
        .map(|p| p.name.as_str())
        .collect();

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Parse raw argument text into a mapping.
///
/// Blank text is an empty mapping. Anything that is not a JSON object is
/// `MalformedArguments`; callers degrade that to an empty mapping.
pub fn parse_arguments(raw: &str) -> Result<Map<String, Value>, ProbeError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ProbeError::MalformedArguments(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(ProbeError::MalformedArguments(e.to_string())),
    }
}

/// Fill in declared defaults for parameters the caller left out.
pub fn apply_defaults(params: &[ParamSpec], arguments: &mut Map<String, Value>) {
    for p in params {
        if let Some(default) = &p.default {
            if !arguments.contains_key(&p.name) || arguments[&p.name].is_null() {
                arguments.insert(p.name.clone(), default.clone());
            }
        }
    }
}

/// Validate resolved arguments against a parameters schema
pub fn validate_arguments(arguments: &Map<String, Value>, schema: &Value) -> Result<(), String> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| format!("Invalid JSON schema: {e}"))?;

    let instance = Value::Object(arguments.clone());
    if let Err(error) = validator.validate(&instance) {
        return Err(error.to_string());
    }

    Ok(())
}
