//! Input mappers, output mappers and error handlers.
//!
//! An input mapper turns a [`Request`] into call arguments; an output mapper
//! turns a return value into a [`Payload`]. Either may suspend by returning
//! [`Outcome::Pending`]. Bundled mappers:
//!
//! | name     | content type               | input                     | output          |
//! |----------|----------------------------|---------------------------|-----------------|
//! | `json`   | `application/json`         | object or array body      | JSON, ids plain |
//! | `binary` | `application/octet-stream` | bincode [`WireValue`]     | same codec      |
//! | `form`   | `multipart/form-data`      | `__fields` JSON + parts   | n/a             |
//! | `raw`    | `text/plain`               | body as one text argument | text            |

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::outcome::Outcome;
use crate::request::Request;
use crate::response::{HttpResponse, Payload, content_type};
use crate::{Error, Result};

/// Name of the multipart part holding JSON-encoded fields.
pub const FIELDS_PART: &str = "__fields";

/// What an input mapper decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Inputs {
    Keywords(Map<String, Value>),
    Positional(Vec<Value>),
    Both(Vec<Value>, Map<String, Value>),
}

impl Inputs {
    /// Normalize into `(args, kwargs)`.
    pub fn into_call(self) -> (Vec<Value>, Map<String, Value>) {
        match self {
            Inputs::Keywords(kwargs) => (Vec::new(), kwargs),
            Inputs::Positional(args) => (args, Map::new()),
            Inputs::Both(args, kwargs) => (args, kwargs),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(kwargs) => Ok(Inputs::Keywords(kwargs)),
            Value::Array(args) => Ok(Inputs::Positional(args)),
            other => Err(Error::Input(format!(
                "Request body must be an object or an array, got {other}"
            ))),
        }
    }
}

/// Decodes requests into call arguments.
pub trait InputMapper: Send + Sync {
    /// Media type the request body must declare.
    fn content_type(&self) -> &str;

    /// Hand-written request schema that replaces extraction.
    fn request_schema(&self) -> Option<Value> {
        None
    }

    fn decode(&self, req: &Request) -> Outcome<Inputs>;
}

/// Encodes return values into payloads.
pub trait OutputMapper: Send + Sync {
    fn content_type(&self) -> &str;

    /// Hand-written response schema that replaces extraction.
    fn response_schema(&self) -> Option<Value> {
        None
    }

    /// `inputs` are the keyword arguments the function was called with.
    fn encode(&self, output: Value, inputs: &Map<String, Value>) -> Outcome<Payload>;
}

/// Turns a failed request into a response.
pub trait ErrorHandler: Send + Sync {
    /// `debug` asks for internal error details to be exposed.
    fn handle(&self, error: Error, debug: bool) -> HttpResponse;
}

/// JSON body in.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInput;

impl InputMapper for JsonInput {
    fn content_type(&self) -> &str {
        content_type::JSON
    }

    fn decode(&self, req: &Request) -> Outcome<Inputs> {
        if req.body.iter().all(u8::is_ascii_whitespace) {
            return Outcome::ready(Inputs::Keywords(Map::new()));
        }
        req.json::<Value>().and_then(Inputs::from_value).into()
    }
}

/// JSON body out, with backend ids written as plain strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutput;

impl OutputMapper for JsonOutput {
    fn content_type(&self) -> &str {
        content_type::JSON
    }

    fn encode(&self, output: Value, _inputs: &Map<String, Value>) -> Outcome<Payload> {
        Outcome::ready(Payload::Json(encode_ids(output)))
    }
}

/// Replace `{"$oid": s}` and `{"$uuid": s}` wrappers with `s`, recursively.
pub fn encode_ids(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1
                && let Some((key, Value::String(id))) = map.iter().next()
                && (key == "$oid" || key == "$uuid")
            {
                return Value::String(id.clone());
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, encode_ids(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(encode_ids).collect()),
        other => other,
    }
}

/// A self-describing value tree for the binary codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<WireValue>),
    Map(Vec<(String, WireValue)>),
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => WireValue::Int(i),
                None => WireValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => WireValue::Str(s.clone()),
            Value::Array(items) => WireValue::List(items.iter().map(Into::into).collect()),
            Value::Object(map) => {
                WireValue::Map(map.iter().map(|(k, v)| (k.clone(), v.into())).collect())
            }
        }
    }
}

impl From<WireValue> for Value {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(i) => Value::from(i),
            WireValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            WireValue::Str(s) => Value::String(s),
            WireValue::List(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            WireValue::Map(entries) => {
                Value::Object(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Serialize a value with the binary codec.
pub fn encode_binary(value: &Value) -> Result<Bytes> {
    Ok(Bytes::from(bincode::serialize(&WireValue::from(value))?))
}

/// Deserialize a value written by [`encode_binary`].
pub fn decode_binary(bytes: &[u8]) -> Result<Value> {
    let wire: WireValue = bincode::deserialize(bytes)
        .map_err(|e| Error::Input(format!("Invalid binary body: {e}")))?;
    Ok(wire.into())
}

/// Binary body in.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryInput;

impl InputMapper for BinaryInput {
    fn content_type(&self) -> &str {
        content_type::BINARY
    }

    fn decode(&self, req: &Request) -> Outcome<Inputs> {
        decode_binary(req.bytes()).and_then(Inputs::from_value).into()
    }
}

/// Binary body out.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryOutput;

impl OutputMapper for BinaryOutput {
    fn content_type(&self) -> &str {
        content_type::BINARY
    }

    fn encode(&self, output: Value, _inputs: &Map<String, Value>) -> Outcome<Payload> {
        encode_binary(&output).map(Payload::Bytes).into()
    }
}

/// Multipart form in.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormInput;

impl InputMapper for FormInput {
    fn content_type(&self) -> &str {
        content_type::FORM
    }

    fn decode(&self, req: &Request) -> Outcome<Inputs> {
        let decode = || -> Result<Inputs> {
            let mut kwargs = Map::new();
            let mut raw = Vec::new();
            for part in req.parts()? {
                if part.name == FIELDS_PART {
                    let fields: Map<String, Value> = serde_json::from_slice(&part.data)
                        .map_err(|e| Error::Input(format!("Invalid {FIELDS_PART} part: {e}")))?;
                    kwargs.extend(fields);
                } else {
                    let value = match part.text() {
                        Some(text) => Value::String(text.to_string()),
                        None => Value::Array(part.data.iter().map(|b| Value::from(*b)).collect()),
                    };
                    raw.push((part.name, value));
                }
            }
            kwargs.extend(raw);
            Ok(Inputs::Keywords(kwargs))
        };
        decode().into()
    }
}

/// Plain text body in, passed as one keyword argument.
#[derive(Debug, Clone)]
pub struct RawInput {
    arg: String,
}

impl RawInput {
    pub fn new(arg: impl Into<String>) -> Self {
        Self { arg: arg.into() }
    }
}

impl Default for RawInput {
    fn default() -> Self {
        Self::new("text")
    }
}

impl InputMapper for RawInput {
    fn content_type(&self) -> &str {
        content_type::RAW
    }

    fn decode(&self, req: &Request) -> Outcome<Inputs> {
        req.text()
            .map(|text| {
                let mut kwargs = Map::new();
                kwargs.insert(self.arg.clone(), Value::String(text.to_string()));
                Inputs::Keywords(kwargs)
            })
            .into()
    }
}

/// Plain text out. Strings are written as-is, anything else as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawOutput;

impl OutputMapper for RawOutput {
    fn content_type(&self) -> &str {
        content_type::RAW
    }

    fn encode(&self, output: Value, _inputs: &Map<String, Value>) -> Outcome<Payload> {
        let text = match output {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Outcome::ready(Payload::Text(text))
    }
}

/// Look up a bundled input mapper by name.
pub fn input_by_name(name: &str) -> Option<Arc<dyn InputMapper>> {
    match name {
        "json" => Some(Arc::new(JsonInput)),
        "binary" => Some(Arc::new(BinaryInput)),
        "form" => Some(Arc::new(FormInput)),
        "raw" => Some(Arc::new(RawInput::default())),
        _ => None,
    }
}

/// Look up a bundled output mapper by name.
pub fn output_by_name(name: &str) -> Option<Arc<dyn OutputMapper>> {
    match name {
        "json" => Some(Arc::new(JsonOutput)),
        "binary" => Some(Arc::new(BinaryOutput)),
        "raw" => Some(Arc::new(RawOutput)),
        _ => None,
    }
}

/// Maps domain errors to 400/403/404, content type errors to 415 and the
/// rest to an opaque 500.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, error: Error, debug: bool) -> HttpResponse {
        let status = error.status_code();
        if debug && status.is_server_error() {
            return crate::response::error(status, error.kind(), &error.to_string());
        }
        error.into_response()
    }
}
