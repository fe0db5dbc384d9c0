//! Route binding: one function becomes one request handler plus its OpenAPI
//! path fragment.
//!
//! Every request goes through the same phases:
//!
//! ```text
//! Received -> ContentTypeChecked -> Decoded -> Validated -> Invoked -> Encoded -> Responded
//!        \___________________ any failure ________________________/
//!                              -> ErrorHandled -> Responded
//! ```
//!
//! The handler comes in two flavors chosen at bind time by [`Scheduling`]:
//! [`Route::respond`] awaits each step, [`Route::respond_blocking`] drives
//! suspending steps on a throwaway runtime.

use std::sync::Arc;

use hyper::{Method, StatusCode};
use serde_json::{Map, Value, json};
use tracing::{debug, error, info};

use crate::config::{ConfigValue, Hook, Resolver};
use crate::mapper::{ErrorHandler, Inputs, InputMapper, OutputMapper};
use crate::request::Request;
use crate::response::HttpResponse;
use crate::schema::{self, Schema};
use crate::signature::Function;
use crate::validator;
use crate::{Error, Result};

/// HTTP methods a route may be bound to.
pub const HTTP_METHODS: [&str; 4] = ["get", "put", "post", "delete"];

/// How a route's handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// Awaited on the server's event loop.
    Suspending,
    /// Run to completion on a blocking thread.
    Blocking,
}

impl Scheduling {
    /// Scheduling used by a framework name.
    pub fn for_framework(framework: &str) -> Result<Self> {
        match framework {
            "hyper" => Ok(Scheduling::Suspending),
            "hyper_blocking" => Ok(Scheduling::Blocking),
            other => Err(Error::Config(format!(
                "Unsupported framework \"{other}\": expected hyper or hyper_blocking"
            ))),
        }
    }
}

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    ContentTypeChecked,
    Decoded,
    Validated,
    Invoked,
    Encoded,
    ErrorHandled,
    Responded,
}

/// A bound function.
#[derive(Clone)]
pub struct Route {
    pub name: String,
    pub path: String,
    pub method: Method,
    pub scheduling: Scheduling,
    /// Body schema used for validation.
    pub input_schema: Schema,
    /// Document schema of the request body.
    pub request_schema: Value,
    /// Document schema of the response, `None` when unconstrained.
    pub response_schema: Option<Value>,
    binding: Arc<Binding>,
}

struct Binding {
    func: Function,
    input_mapper: Arc<dyn InputMapper>,
    output_mapper: Arc<dyn OutputMapper>,
    error_handler: Arc<dyn ErrorHandler>,
    header_inputs: Vec<(String, String)>,
    schema: Schema,
    debug: bool,
    logger: Option<String>,
    label: String,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("scheduling", &self.scheduling)
            .finish_non_exhaustive()
    }
}

/// Bind `func` with settings from `resolver`.
pub fn bind(func: &Function, resolver: &Resolver<'_>, scheduling: Scheduling) -> Result<Route> {
    let config = |key: &str| resolver.resolve(key, Some(func), None);

    let input_mapper = match config("input_mapper")? {
        ConfigValue::Hook(Hook::Input(mapper)) => mapper,
        _ => return Err(hook_mismatch("input_mapper", "input mapper")),
    };
    let output_mapper = match config("output_mapper")? {
        ConfigValue::Hook(Hook::Output(mapper)) => mapper,
        _ => return Err(hook_mismatch("output_mapper", "output mapper")),
    };
    let error_handler = match config("error_handler")? {
        ConfigValue::Hook(Hook::Error(handler)) => handler,
        _ => return Err(hook_mismatch("error_handler", "error handler")),
    };
    let header_inputs = resolver
        .map("header_inputs", Some(func))?
        .into_iter()
        .map(|(arg, header)| match header {
            ConfigValue::Str(header) => Ok((arg, header)),
            _ => Err(hook_mismatch("header_inputs", "map of header names")),
        })
        .collect::<Result<Vec<_>>>()?;
    let logger = config("logger")?.as_str().map(str::to_string);
    let debug = resolver.flag("debug", Some(func))?;

    let http_method = resolver
        .string("http_method", Some(func))?
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !HTTP_METHODS.contains(&http_method.as_str()) {
        return Err(Error::Config(format!(
            "HTTP method must be one of GET, PUT, POST, DELETE, got \"{http_method}\""
        )));
    }
    let method = Method::from_bytes(http_method.to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::Config(e.to_string()))?;

    let name = resolver
        .string("name", Some(func))?
        .unwrap_or_else(|| func.name().to_string());
    let path = resolver
        .string("route", Some(func))?
        .unwrap_or_else(|| format!("/{name}"));

    let excluded: Vec<String> = header_inputs.iter().map(|(arg, _)| arg.clone()).collect();
    let input_schema = schema::input_schema(func, &excluded)?;
    let request_schema = input_mapper
        .request_schema()
        .unwrap_or_else(|| input_schema.to_json());
    let response_schema = match output_mapper.response_schema() {
        Some(declared) => Some(declared),
        None => schema::output_shape(func)?.map(|shape| shape.to_json()),
    };

    debug!(route = %path, method = %method, function = func.name(), "Bound route");

    Ok(Route {
        binding: Arc::new(Binding {
            func: func.clone(),
            input_mapper,
            output_mapper,
            error_handler,
            header_inputs,
            schema: input_schema.clone(),
            debug,
            logger,
            label: format!("{} {path}", method.as_str()),
        }),
        name,
        path,
        method,
        scheduling,
        input_schema,
        request_schema,
        response_schema,
    })
}

fn hook_mismatch(key: &str, expected: &str) -> Error {
    Error::ConfigType {
        key: key.to_string(),
        expected: expected.to_string(),
    }
}

impl Route {
    /// The function behind this route.
    pub fn function(&self) -> &Function {
        &self.binding.func
    }

    /// Media type the route accepts.
    pub fn request_content_type(&self) -> &str {
        self.binding.input_mapper.content_type()
    }

    /// Media type the route answers with.
    pub fn response_content_type(&self) -> &str {
        self.binding.output_mapper.content_type()
    }

    /// Handle a request, awaiting suspending steps.
    pub async fn respond(&self, req: &Request) -> HttpResponse {
        let binding = &self.binding;
        binding.log_received();
        let mut phase = Phase::Received;
        let result = binding.pipeline(req, &mut phase).await;
        binding.finish(result, phase)
    }

    /// Handle a request on the calling thread.
    ///
    /// Must not be called from inside an async task.
    pub fn respond_blocking(&self, req: &Request) -> HttpResponse {
        let binding = &self.binding;
        binding.log_received();
        let mut phase = Phase::Received;
        let result = binding.pipeline_blocking(req, &mut phase);
        binding.finish(result, phase)
    }

    /// The route's entry for the `paths` object of a document.
    pub fn openapi_fragment(&self) -> Value {
        let mut operation = Map::new();
        operation.insert("x-method_name".into(), json!(self.name));
        operation.insert("description".into(), json!(self.function().docstring()));

        operation.insert(
            "requestBody".into(),
            json!({
                "required": true,
                "content": {
                    self.request_content_type(): { "schema": self.request_schema }
                }
            }),
        );

        let schema = self.response_schema.clone().unwrap_or_else(|| json!({}));
        operation.insert(
            "responses".into(),
            json!({
                "200": {
                    "description": "",
                    "content": { self.response_content_type(): { "schema": schema } }
                }
            }),
        );

        json!({ self.path.clone(): { self.method.as_str().to_ascii_lowercase(): operation } })
    }
}

impl Binding {
    fn log_received(&self) {
        match &self.logger {
            Some(logger) => debug!(logger = %logger, "Handling {}", self.label),
            None => debug!("Handling {}", self.label),
        }
    }

    async fn pipeline(&self, req: &Request, phase: &mut Phase) -> Result<HttpResponse> {
        self.check_content_type(req)?;
        *phase = Phase::ContentTypeChecked;
        let inputs = self.input_mapper.decode(req).resolve().await?;
        *phase = Phase::Decoded;
        let (args, kwargs) = self.prepare(inputs, req)?;
        *phase = Phase::Validated;
        let output = self.func.call(args, kwargs.clone()).resolve().await?;
        *phase = Phase::Invoked;
        let payload = self.output_mapper.encode(output, &kwargs).resolve().await?;
        *phase = Phase::Encoded;
        payload.into_response(StatusCode::OK)
    }

    fn pipeline_blocking(&self, req: &Request, phase: &mut Phase) -> Result<HttpResponse> {
        self.check_content_type(req)?;
        *phase = Phase::ContentTypeChecked;
        let inputs = self.input_mapper.decode(req).resolve_blocking()?;
        *phase = Phase::Decoded;
        let (args, kwargs) = self.prepare(inputs, req)?;
        *phase = Phase::Validated;
        let output = self.func.call(args, kwargs.clone()).resolve_blocking()?;
        *phase = Phase::Invoked;
        let payload = self.output_mapper.encode(output, &kwargs).resolve_blocking()?;
        *phase = Phase::Encoded;
        payload.into_response(StatusCode::OK)
    }

    /// A request without a content type is accepted only when it has no body.
    fn check_content_type(&self, req: &Request) -> Result<()> {
        let expected = self.input_mapper.content_type();
        match req.content_type() {
            Some(actual) if !actual.eq_ignore_ascii_case(expected) => {
                Err(Error::ContentTypeMismatch {
                    expected: expected.to_string(),
                    actual,
                })
            }
            None if !req.body.is_empty() => Err(Error::ContentTypeMismatch {
                expected: expected.to_string(),
                actual: String::new(),
            }),
            _ => Ok(()),
        }
    }

    /// Merge header-bound arguments and validate.
    fn prepare(&self, inputs: Inputs, req: &Request) -> Result<(Vec<Value>, Map<String, Value>)> {
        let (args, mut kwargs) = inputs.into_call();
        for (arg, header) in &self.header_inputs {
            if let Some(value) = req.header(header) {
                kwargs.insert(arg.clone(), Value::String(value.to_string()));
            }
        }
        let view = self.func.signature().arguments_view(&args, &kwargs);
        validator::validate(&view, &self.schema)?;
        Ok((args, kwargs))
    }

    fn finish(&self, result: Result<HttpResponse>, phase: Phase) -> HttpResponse {
        let (response, last) = match result {
            Ok(response) => (response, phase),
            Err(e) => {
                if e.is_client_error() {
                    info!(route = %self.label, phase = ?phase, kind = e.kind(), "{e}");
                } else {
                    error!(route = %self.label, phase = ?phase, "Unexpected error: {e:?}");
                }
                (self.error_handler.handle(e, self.debug), Phase::ErrorHandled)
            }
        };
        debug!(route = %self.label, status = %response.status(), from = ?last, "{:?}", Phase::Responded);
        response
    }
}
