//! Callables and their call contracts.
//!
//! A [`Function`] pairs a body with an explicit [`Signature`]: ordered
//! parameters with kinds, literal defaults and type annotations, plus an
//! optional return annotation. The schema extractor reads the signature; the
//! route binder uses it to bind decoded `(args, kwargs)` before invoking the
//! body.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::outcome::{BoxFuture, Outcome};
use crate::{Error, Result};

/// Maximum `$ref` nesting followed when converting a schemars schema.
const MAX_REF_DEPTH: usize = 32;

/// A type annotation on a parameter or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
    Any,
    /// Homogeneous sequence of the inner type.
    Sequence(Box<Annotation>),
    /// Structured record with named, typed fields.
    Record(Record),
    /// The inner type or null.
    Optional(Box<Annotation>),
    /// A type with no JSON counterpart.
    Opaque(String),
}

impl Annotation {
    pub fn sequence(inner: Annotation) -> Self {
        Annotation::Sequence(Box::new(inner))
    }

    pub fn optional(inner: Annotation) -> Self {
        Annotation::Optional(Box::new(inner))
    }

    pub fn opaque(name: impl Into<String>) -> Self {
        Annotation::Opaque(name.into())
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Annotation::Optional(_))
    }

    /// Derive an annotation from a type's JSON schema.
    ///
    /// Structs become records, `Vec<T>` becomes a sequence and `Option<T>`
    /// becomes optional. Unresolvable references are a schema error.
    pub fn of<T: JsonSchema>() -> Result<Self> {
        let schema = schemars::schema_for!(T);
        let root = schema.as_value();
        let empty = Map::new();
        let defs = root
            .get("$defs")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let name = T::schema_name();
        from_json_schema(root, defs, &name, 0)
    }
}

fn from_json_schema(
    node: &Value,
    defs: &Map<String, Value>,
    name: &str,
    depth: usize,
) -> Result<Annotation> {
    if depth > MAX_REF_DEPTH {
        return Err(Error::Schema(format!(
            "schema for {name} nests deeper than {MAX_REF_DEPTH} levels"
        )));
    }
    let Some(obj) = node.as_object() else {
        return Ok(Annotation::Any);
    };

    if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
        let target = reference
            .strip_prefix("#/$defs/")
            .and_then(|key| defs.get(key).map(|def| (key, def)));
        let Some((key, def)) = target else {
            return Err(Error::Schema(format!(
                "unresolvable reference {reference} in {name}"
            )));
        };
        return from_json_schema(def, defs, key, depth + 1);
    }

    for combinator in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = obj.get(combinator) {
            let non_null: Vec<&Value> = branches
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) != Some("null"))
                .collect();
            if non_null.len() == 1 && branches.len() == 2 {
                let inner = from_json_schema(non_null[0], defs, name, depth + 1)?;
                return Ok(Annotation::optional(inner));
            }
            return Ok(Annotation::Any);
        }
    }

    let (type_name, nullable) = match obj.get("type") {
        Some(Value::String(t)) => (t.as_str(), false),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "null")
                .collect();
            match names.as_slice() {
                [single] => (*single, names.len() < types.len()),
                _ => return Ok(Annotation::Any),
            }
        }
        _ => return Ok(Annotation::Any),
    };

    let annotation = match type_name {
        "string" => Annotation::Str,
        "integer" => Annotation::Int,
        "number" => Annotation::Float,
        "boolean" => Annotation::Bool,
        "array" => match obj.get("items") {
            Some(items @ Value::Object(_)) => {
                Annotation::sequence(from_json_schema(items, defs, name, depth + 1)?)
            }
            _ => Annotation::List,
        },
        "object" => match obj.get("properties").and_then(Value::as_object) {
            Some(properties) => {
                let required: Vec<&str> = obj
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|r| r.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let title = obj.get("title").and_then(Value::as_str).unwrap_or(name);
                let mut record = Record::new(title);
                for (field, schema) in properties {
                    let mut annotation = from_json_schema(schema, defs, field, depth + 1)?;
                    if !required.contains(&field.as_str()) && !annotation.is_optional() {
                        annotation = Annotation::optional(annotation);
                    }
                    record = record.field(field, annotation);
                }
                Annotation::Record(record)
            }
            None => Annotation::Dict,
        },
        _ => Annotation::Any,
    };

    Ok(if nullable {
        Annotation::optional(annotation)
    } else {
        annotation
    })
}

/// A structured record annotation, the analogue of a typed dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    /// Whether every non-optional field must be present.
    pub total: bool,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub annotation: Annotation,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total: true,
            fields: Vec::new(),
        }
    }

    pub fn total(mut self, total: bool) -> Self {
        self.total = total;
        self
    }

    pub fn field(mut self, name: impl Into<String>, annotation: Annotation) -> Self {
        self.fields.push(Field {
            name: name.into(),
            annotation,
        });
        self
    }
}

/// How a parameter receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub annotation: Option<Annotation>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::PositionalOrKeyword)
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::PositionalOnly)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::KeywordOnly)
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::VarPositional)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::VarKeyword)
    }

    fn with_kind(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            annotation: None,
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.is_variadic()
    }

    fn takes_positional(&self) -> bool {
        matches!(
            self.kind,
            ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword
        )
    }

    fn takes_keyword(&self) -> bool {
        matches!(
            self.kind,
            ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly
        )
    }
}

/// Ordered parameters plus an optional return annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    returns: Option<Annotation>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, annotation: Annotation) -> Self {
        self.returns = Some(annotation);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn return_annotation(&self) -> Option<&Annotation> {
        self.returns.as_ref()
    }

    /// Check that names are unique and kinds appear in call order.
    pub fn check(&self) -> Result<()> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.params.len());
        let mut last_kind = ParamKind::PositionalOnly;
        for param in &self.params {
            if seen.contains(&param.name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate parameter \"{}\"",
                    param.name
                )));
            }
            seen.push(&param.name);
            let out_of_order = param.kind < last_kind
                || (param.is_variadic() && param.kind == last_kind && seen.len() > 1);
            if out_of_order {
                return Err(Error::Schema(format!(
                    "parameter \"{}\" ({:?}) is out of order",
                    param.name, param.kind
                )));
            }
            last_kind = param.kind;
        }
        Ok(())
    }

    fn var_positional(&self) -> Option<&Param> {
        self.params
            .iter()
            .find(|p| p.kind == ParamKind::VarPositional)
    }

    fn var_keyword(&self) -> Option<&Param> {
        self.params.iter().find(|p| p.kind == ParamKind::VarKeyword)
    }

    /// Name positional arguments after the parameters they would fill.
    ///
    /// Extra positionals land under the variadic positional parameter. Unlike
    /// [`bind`](Self::bind) this never fails; conflicts are left to binding.
    pub fn arguments_view(&self, args: &[Value], kwargs: &Map<String, Value>) -> Map<String, Value> {
        let mut view = Map::new();
        let mut args = args.iter();
        for param in self.params.iter().filter(|p| p.takes_positional()) {
            match args.next() {
                Some(value) => {
                    view.insert(param.name.clone(), value.clone());
                }
                None => break,
            }
        }
        let rest: Vec<Value> = args.cloned().collect();
        if let Some(param) = self.var_positional()
            && !rest.is_empty()
        {
            view.insert(param.name.clone(), Value::Array(rest));
        }
        for (key, value) in kwargs {
            view.entry(key.clone()).or_insert_with(|| value.clone());
        }
        view
    }

    /// Bind call arguments to parameters the way a call would.
    pub fn bind(&self, func: &str, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Bound> {
        let mut values = Map::new();
        let positional: Vec<&Param> = self.params.iter().filter(|p| p.takes_positional()).collect();

        let given = args.len();
        let mut args = args.into_iter();
        for param in &positional {
            match args.next() {
                Some(value) => {
                    values.insert(param.name.clone(), value);
                }
                None => break,
            }
        }
        let rest: Vec<Value> = args.collect();
        if !rest.is_empty() && self.var_positional().is_none() {
            return Err(Error::Input(format!(
                "{func}() takes {} positional arguments but {given} were given",
                positional.len()
            )));
        }

        let mut extra = Map::new();
        for (key, value) in kwargs {
            match self.params.iter().find(|p| p.name == key && p.takes_keyword()) {
                Some(_) if values.contains_key(&key) => {
                    return Err(Error::Input(format!(
                        "{func}() got multiple values for argument '{key}'"
                    )));
                }
                Some(_) => {
                    values.insert(key, value);
                }
                None if self.var_keyword().is_some() => {
                    extra.insert(key, value);
                }
                None => {
                    return Err(Error::Input(format!(
                        "{func}() got an unexpected keyword argument '{key}'"
                    )));
                }
            }
        }

        let mut missing = Vec::new();
        for param in self.params.iter().filter(|p| !p.is_variadic()) {
            if values.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    values.insert(param.name.clone(), default.clone());
                }
                None => missing.push(format!("'{}'", param.name)),
            }
        }
        if !missing.is_empty() {
            return Err(Error::Input(format!(
                "{func}() missing {} required argument(s): {}",
                missing.len(),
                missing.join(", ")
            )));
        }

        let var_positional = self.var_positional().map(|p| p.name.clone());
        if let Some(name) = &var_positional {
            values.insert(name.clone(), Value::Array(rest));
        }
        let var_keyword = self.var_keyword().map(|p| p.name.clone());
        if let Some(name) = &var_keyword {
            values.insert(name.clone(), Value::Object(extra));
        }

        Ok(Bound {
            values,
            var_positional,
            var_keyword,
        })
    }
}

/// Arguments bound to a signature, handed to a function body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bound {
    values: Map<String, Value>,
    var_positional: Option<String>,
    var_keyword: Option<String>,
}

impl Bound {
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Deserialize one argument, reporting mismatches as input errors.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.values.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| Error::Input(format!("Invalid parameter \"{name}\": {e}")))
    }

    /// Values collected by the variadic positional parameter.
    pub fn rest(&self) -> &[Value] {
        self.var_positional
            .as_ref()
            .and_then(|name| self.values.get(name))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Values collected by the variadic keyword parameter.
    pub fn extra(&self) -> Option<&Map<String, Value>> {
        self.var_keyword
            .as_ref()
            .and_then(|name| self.values.get(name))
            .and_then(Value::as_object)
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

/// Process-unique identity of a [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type BlockingBody = Arc<dyn Fn(Bound) -> Result<Value> + Send + Sync>;
type SuspendingBody = Arc<dyn Fn(Bound) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone)]
enum Body {
    Blocking(BlockingBody),
    Suspending(SuspendingBody),
}

/// An exposable callable.
///
/// # Example
/// ```ignore
/// let add = Function::new(
///     "add",
///     Signature::new()
///         .param(Param::new("a"))
///         .param(Param::new("b").annotated(Annotation::Int).default(0))
///         .returns(Annotation::Int),
///     |args| Ok(json!(args.get::<i64>("a")? + args.get::<i64>("b")?)),
/// );
/// ```
#[derive(Clone)]
pub struct Function {
    id: FunctionId,
    name: String,
    doc: String,
    signature: Signature,
    body: Body,
}

impl Function {
    /// A function whose body runs to completion on the calling thread.
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Bound) -> Result<Value> + Send + Sync + 'static,
    {
        Self::with_body(name.into(), signature, Body::Blocking(Arc::new(body)))
    }

    /// A function whose body returns a future.
    pub fn suspending<F, Fut>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Bound) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let boxed: SuspendingBody = Arc::new(move |bound| Box::pin(body(bound)));
        Self::with_body(name.into(), signature, Body::Suspending(boxed))
    }

    /// A method bound to a shared instance.
    pub fn method<T, F>(
        instance: Arc<T>,
        name: impl Into<String>,
        signature: Signature,
        body: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, Bound) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, signature, move |bound| body(&instance, bound))
    }

    fn with_body(name: String, signature: Signature, body: Body) -> Self {
        Self {
            id: FunctionId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            name,
            doc: String::new(),
            signature,
            body,
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn docstring(&self) -> &str {
        &self.doc
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_suspending(&self) -> bool {
        matches!(self.body, Body::Suspending(_))
    }

    /// Bind the arguments and run the body.
    pub fn call(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Outcome<Value> {
        let bound = match self.signature.bind(&self.name, args, kwargs) {
            Ok(bound) => bound,
            Err(e) => return Outcome::Ready(Err(e)),
        };
        match &self.body {
            Body::Blocking(body) => Outcome::Ready(body(bound)),
            Body::Suspending(body) => Outcome::Pending(body(bound)),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("suspending", &self.is_suspending())
            .finish()
    }
}
