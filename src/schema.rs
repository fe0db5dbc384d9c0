//! Schema extraction from function signatures.
//!
//! Each parameter gets a JSON type. A JSON-compatible annotation wins; without
//! one, the literal default's runtime type is used; otherwise the parameter is
//! untyped (`any`). Variadic positional parameters become optional arrays
//! defaulting to `[]`, variadic keyword parameters optional objects defaulting
//! to `{}`.
//!
//! A record annotation with no fields cannot describe an object and raises a
//! schema error instead of degrading to `any`.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::signature::{Annotation, Function, Param, ParamKind};
use crate::{Error, Result};

/// JSON type of a parameter or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl JsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
            JsonType::Any => "any",
        }
    }

    /// Runtime type of a JSON value. Null has no type.
    pub fn of(value: &Value) -> JsonType {
        match value {
            Value::String(_) => JsonType::String,
            Value::Number(n) if n.is_f64() => JsonType::Number,
            Value::Number(_) => JsonType::Integer,
            Value::Bool(_) => JsonType::Boolean,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
            Value::Null => JsonType::Any,
        }
    }

    /// Whether `value` is an instance of this type. Integers count as numbers.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            JsonType::Any => true,
            JsonType::Number => value.is_number(),
            JsonType::Integer => value.is_i64() || value.is_u64(),
            other => JsonType::of(value) == *other,
        }
    }
}

/// Structural description of a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub ty: JsonType,
    pub nullable: bool,
    /// Element shape, only for arrays.
    pub items: Option<Box<Shape>>,
    /// Declared fields, only for structured objects.
    pub properties: Option<Vec<ParamSpec>>,
}

impl Shape {
    pub fn of_type(ty: JsonType) -> Self {
        Self {
            ty,
            nullable: false,
            items: None,
            properties: None,
        }
    }

    pub fn any() -> Self {
        Self::of_type(JsonType::Any)
    }

    /// Render as an OpenAPI schema object. The untyped marker renders as `{}`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if self.ty != JsonType::Any {
            obj.insert("type".into(), json!(self.ty.as_str()));
        }
        if self.nullable {
            obj.insert("nullable".into(), json!(true));
        }
        if let Some(items) = &self.items {
            obj.insert("items".into(), items.to_json());
        }
        if let Some(properties) = &self.properties {
            obj.insert("properties".into(), properties_json(properties));
            let required = required_names(properties);
            if !required.is_empty() {
                obj.insert("required".into(), json!(required));
            }
        }
        Value::Object(obj)
    }
}

/// One parameter (or record field) of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub required: bool,
    /// Present iff not required (record fields never carry one).
    pub default: Option<Value>,
    pub shape: Shape,
}

impl ParamSpec {
    pub fn to_json(&self) -> Value {
        let mut value = self.shape.to_json();
        if let (Some(default), Value::Object(obj)) = (&self.default, &mut value) {
            obj.insert("default".into(), default.clone());
        }
        value
    }
}

fn properties_json(properties: &[ParamSpec]) -> Value {
    let map: Map<String, Value> = properties
        .iter()
        .map(|p| (p.name.clone(), p.to_json()))
        .collect();
    Value::Object(map)
}

fn required_names(properties: &[ParamSpec]) -> Vec<&str> {
    properties
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect()
}

/// Input schema of one callable: an object of its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub properties: Vec<ParamSpec>,
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn required(&self) -> Vec<&str> {
        required_names(&self.properties)
    }

    /// Render as `{type: object, properties, required}`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), json!("object"));
        obj.insert("properties".into(), properties_json(&self.properties));
        let required = self.required();
        if !required.is_empty() {
            obj.insert("required".into(), json!(required));
        }
        Value::Object(obj)
    }
}

/// Derive the input schema of `func`, leaving out `exclude` parameters.
pub fn input_schema(func: &Function, exclude: &[String]) -> Result<Schema> {
    func.signature().check()?;
    let properties = func
        .signature()
        .params()
        .iter()
        .filter(|p| !exclude.contains(&p.name))
        .map(param_spec)
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema { properties })
}

/// Derive the output shape of `func` from its return annotation.
///
/// `None` means unconstrained: no annotation, `Any`, or a type with no JSON
/// counterpart.
pub fn output_shape(func: &Function) -> Result<Option<Shape>> {
    match func.signature().return_annotation() {
        None | Some(Annotation::Any) => Ok(None),
        Some(annotation) => shape_of(annotation),
    }
}

fn param_spec(param: &Param) -> Result<ParamSpec> {
    let annotated = match &param.annotation {
        Some(annotation) => shape_of(annotation)?,
        None => None,
    };
    let (shape, default) = match param.kind {
        ParamKind::VarPositional => {
            let mut shape = Shape::of_type(JsonType::Array);
            shape.items = annotated.map(Box::new);
            (shape, Some(json!([])))
        }
        ParamKind::VarKeyword => (Shape::of_type(JsonType::Object), Some(json!({}))),
        _ => {
            let shape = annotated
                .or_else(|| param.default.as_ref().map(shape_of_value))
                .unwrap_or_else(Shape::any);
            (shape, param.default.clone())
        }
    };
    Ok(ParamSpec {
        name: param.name.clone(),
        required: default.is_none(),
        default,
        shape,
    })
}

fn shape_of_value(value: &Value) -> Shape {
    Shape::of_type(JsonType::of(value))
}

fn shape_of(annotation: &Annotation) -> Result<Option<Shape>> {
    let shape = match annotation {
        Annotation::Str => Shape::of_type(JsonType::String),
        Annotation::Int => Shape::of_type(JsonType::Integer),
        Annotation::Float => Shape::of_type(JsonType::Number),
        Annotation::Bool => Shape::of_type(JsonType::Boolean),
        Annotation::List => Shape::of_type(JsonType::Array),
        Annotation::Dict => Shape::of_type(JsonType::Object),
        Annotation::Any => Shape::any(),
        Annotation::Sequence(inner) => {
            let mut shape = Shape::of_type(JsonType::Array);
            shape.items = Some(Box::new(shape_of(inner)?.unwrap_or_else(Shape::any)));
            shape
        }
        Annotation::Record(record) => {
            if record.fields.is_empty() {
                return Err(Error::Schema(format!(
                    "record {} declares no fields",
                    record.name
                )));
            }
            let mut properties: Vec<ParamSpec> = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                if properties.iter().any(|p| p.name == field.name) {
                    return Err(Error::Schema(format!(
                        "record {} declares field \"{}\" twice",
                        record.name, field.name
                    )));
                }
                properties.push(ParamSpec {
                    name: field.name.clone(),
                    required: record.total && !field.annotation.is_optional(),
                    default: None,
                    shape: shape_of(&field.annotation)?.unwrap_or_else(Shape::any),
                });
            }
            let mut shape = Shape::of_type(JsonType::Object);
            shape.properties = Some(properties);
            shape
        }
        Annotation::Optional(inner) => match shape_of(inner)? {
            Some(mut shape) => {
                shape.nullable = true;
                shape
            }
            None => return Ok(None),
        },
        Annotation::Opaque(_) => return Ok(None),
    };
    Ok(Some(shape))
}
