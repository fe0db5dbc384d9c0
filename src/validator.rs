//! Validation of decoded arguments against an input schema.
//!
//! Every violation is collected before failing; the resulting input error
//! joins them with spaces.

use serde_json::{Map, Value};

use crate::schema::{JsonType, ParamSpec, Schema, Shape};
use crate::{Error, Result};

/// Check `input` against `schema`, failing with every violation found.
pub fn validate(input: &Map<String, Value>, schema: &Schema) -> Result<()> {
    let violations = violations(input, schema);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Input(violations.join(" ")))
    }
}

/// All violations of `schema` in `input`, in schema order.
pub fn violations(input: &Map<String, Value>, schema: &Schema) -> Vec<String> {
    let mut found = Vec::new();
    for spec in &schema.properties {
        check_property(spec, input.get(&spec.name), &spec.name, &mut found);
    }
    found
}

fn check_property(spec: &ParamSpec, value: Option<&Value>, path: &str, found: &mut Vec<String>) {
    match value {
        Some(value) => check_value(&spec.shape, value, path, found),
        None if spec.required && spec.default.is_none() => {
            found.push(format!("Parameter \"{path}\" is missing."));
        }
        None => {}
    }
}

fn check_value(shape: &Shape, value: &Value, path: &str, found: &mut Vec<String>) {
    if shape.ty == JsonType::Any || (value.is_null() && shape.nullable) {
        return;
    }
    if !shape.ty.accepts(value) {
        found.push(format!(
            "Invalid parameter \"{path}\". Must be of type \"{}\".",
            shape.ty.as_str()
        ));
        return;
    }
    match value {
        Value::Array(elements) => {
            if let Some(items) = &shape.items {
                for (i, element) in elements.iter().enumerate() {
                    check_value(items, element, &format!("{path}[{i}]"), found);
                }
            }
        }
        Value::Object(fields) => {
            if let Some(properties) = &shape.properties {
                for spec in properties {
                    let nested = format!("{path}.{}", spec.name);
                    check_property(spec, fields.get(&spec.name), &nested, found);
                }
            }
        }
        _ => {}
    }
}
