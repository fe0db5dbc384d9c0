//! Application composer.
//!
//! Binds a set of functions, assembles their document and registers every
//! endpoint on one [`Router`]: the bound routes, `/ping`, and optionally
//! `/openapi`, a Swagger page and CORS preflights. Several services can be
//! mounted under their own prefixes.

use std::collections::BTreeMap;
use std::sync::Arc;

use hyper::Method;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{ConfigValue, Defaults, ELSE_KEY, Hook, Overrides, Resolver};
use crate::mapper::{InputMapper, OutputMapper};
use crate::metadata::Metadata;
use crate::openapi::{self, Info};
use crate::plugin::{Cors, Plugin};
use crate::request::Request;
use crate::response::HttpResponse;
use crate::route::{self, Route, Scheduling};
use crate::router::{Endpoint, Entry, Router};
use crate::signature::Function;
use crate::{Error, Result};

/// A function to expose, with optional per-endpoint settings.
#[derive(Clone)]
pub struct Handler {
    pub function: Function,
    pub name: Option<String>,
    pub input_mapper: Option<Arc<dyn InputMapper>>,
    pub output_mapper: Option<Arc<dyn OutputMapper>>,
}

impl Handler {
    pub fn new(function: Function) -> Self {
        Self {
            function,
            name: None,
            input_mapper: None,
            output_mapper: None,
        }
    }

    /// Endpoint name, used for the default route.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn input_mapper(mut self, mapper: impl InputMapper + 'static) -> Self {
        self.input_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn output_mapper(mut self, mapper: impl OutputMapper + 'static) -> Self {
        self.output_mapper = Some(Arc::new(mapper));
        self
    }
}

impl From<Function> for Handler {
    fn from(function: Function) -> Self {
        Handler::new(function)
    }
}

/// Handlers mounted under a prefix, with their own settings on top of the
/// parent's.
#[derive(Clone, Default)]
pub struct SubService {
    pub handlers: Vec<Handler>,
    pub config: Option<Overrides>,
}

impl SubService {
    pub fn new<I, H>(handlers: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Handler>,
    {
        Self {
            handlers: handlers.into_iter().map(Into::into).collect(),
            config: None,
        }
    }

    pub fn config(mut self, config: Overrides) -> Self {
        self.config = Some(config);
        self
    }
}

/// What an application serves.
#[derive(Clone)]
pub enum AppSpec {
    Handlers(Vec<Handler>),
    /// Sub-services by mount prefix, in order.
    Services(Vec<(String, SubService)>),
}

impl From<Vec<Handler>> for AppSpec {
    fn from(handlers: Vec<Handler>) -> Self {
        AppSpec::Handlers(handlers)
    }
}

impl From<Vec<Function>> for AppSpec {
    fn from(functions: Vec<Function>) -> Self {
        AppSpec::Handlers(functions.into_iter().map(Handler::new).collect())
    }
}

impl From<Vec<(String, SubService)>> for AppSpec {
    fn from(services: Vec<(String, SubService)>) -> Self {
        AppSpec::Services(services)
    }
}

/// A composed application, ready to serve.
pub struct App {
    router: Router,
    routes: Vec<Route>,
    /// Documents by mount prefix; `""` is the root service.
    documents: BTreeMap<String, Arc<Value>>,
    overrides: Overrides,
    host: String,
    port: u16,
}

/// One service's router, routes and document.
struct Built {
    router: Router,
    routes: Vec<Route>,
    document: Arc<Value>,
}

impl App {
    /// Bind `spec` with function-level `metadata` and call-level `overrides`.
    pub fn build(
        spec: impl Into<AppSpec>,
        metadata: &Metadata,
        overrides: &Overrides,
    ) -> Result<Self> {
        let defaults = Defaults::system();
        let resolver = Resolver::new(metadata, overrides, &defaults);
        let host = resolver.string("host", None)?.unwrap_or_default();
        let port = resolver.resolve("port", None, None)?.as_i64().unwrap_or_default();
        let port = u16::try_from(port)
            .map_err(|_| Error::Config(format!("Port out of range: {port}")))?;

        let mut documents = BTreeMap::new();
        let (router, routes) = match spec.into() {
            AppSpec::Handlers(handlers) => {
                let built = build_service(&handlers, metadata, overrides, "", true)?;
                documents.insert(String::new(), built.document);
                (built.router, built.routes)
            }
            AppSpec::Services(services) => {
                let mut router = Router::new();
                let middleware = resolver.plugins("middleware")?;
                router.add(Method::GET, "/ping", ping_entry(middleware))?;

                let mut routes = Vec::new();
                for (prefix, service) in services {
                    let prefix = normalize_prefix(&prefix);
                    let names_file = service.config.as_ref().is_some_and(names_document_file);
                    let config = match service.config {
                        Some(own) => overrides.clone().merge(own),
                        None => overrides.clone(),
                    };
                    let built =
                        build_service(&service.handlers, metadata, &config, &prefix, names_file)?;
                    router.mount(&prefix, built.router)?;
                    routes.extend(built.routes);
                    documents.insert(prefix, built.document);
                }
                (router, routes)
            }
        };

        info!(routes = routes.len(), "Application built");
        Ok(Self {
            router,
            routes,
            documents,
            overrides: overrides.clone(),
            host,
            port,
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Every bound route, in binding order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Document of the root service, absent when only sub-services exist.
    pub fn openapi(&self) -> Option<&Value> {
        self.document("")
    }

    /// Document of the service mounted at `prefix`.
    pub fn document(&self, prefix: &str) -> Option<&Value> {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            normalize_prefix(prefix)
        };
        self.documents.get(&prefix).map(|doc| &**doc)
    }

    /// Path of the endpoint named `name`.
    pub fn url_of(&self, name: &str) -> Option<&str> {
        self.router.url_for(name)
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve one request without a transport.
    pub async fn handle(&self, req: Request) -> HttpResponse {
        self.router.dispatch(req).await
    }
}

/// Whether `config` sets `openapi.filename` itself.
fn names_document_file(config: &Overrides) -> bool {
    match config.get("openapi") {
        Some(ConfigValue::Map(openapi)) => {
            !matches!(openapi.get("filename"), None | Some(ConfigValue::Null))
        }
        _ => false,
    }
}

fn normalize_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim_matches('/'))
}

fn ping_entry(plugins: Vec<Arc<dyn Plugin>>) -> Entry {
    Entry::new(
        "ping",
        Endpoint::Json(Arc::new(json!({"ping": "pong"}))),
        plugins,
    )
}

/// Route `value` to one endpoint through a per-function override map.
///
/// A direct value already set for `key` keeps applying to the other
/// endpoints as the `$else` entry.
fn set_for_endpoint(overrides: &mut Overrides, key: &str, endpoint: &str, value: ConfigValue) {
    let mut by_name = match overrides.get(key) {
        Some(ConfigValue::Map(map)) => map.clone(),
        Some(direct) => BTreeMap::from([(ELSE_KEY.to_string(), direct.clone())]),
        None => BTreeMap::new(),
    };
    by_name.insert(endpoint.to_string(), value);
    overrides.insert(key, ConfigValue::Map(by_name));
}

fn build_service(
    handlers: &[Handler],
    metadata: &Metadata,
    overrides: &Overrides,
    prefix: &str,
    write_document: bool,
) -> Result<Built> {
    let mut metadata_local = Metadata::new();
    metadata_local.extend(metadata);
    let mut overrides_local = overrides.clone();
    for handler in handlers {
        if let Some(name) = &handler.name {
            metadata_local.name(&handler.function, name.clone());
        }
        let endpoint = metadata_local.effective_name(&handler.function).to_string();
        if let Some(mapper) = &handler.input_mapper {
            let hook = ConfigValue::Hook(Hook::Input(Arc::clone(mapper)));
            set_for_endpoint(&mut overrides_local, "input_mapper", &endpoint, hook);
        }
        if let Some(mapper) = &handler.output_mapper {
            let hook = ConfigValue::Hook(Hook::Output(Arc::clone(mapper)));
            set_for_endpoint(&mut overrides_local, "output_mapper", &endpoint, hook);
        }
    }

    let defaults = Defaults::system();
    let resolver = Resolver::new(&metadata_local, &overrides_local, &defaults);

    let framework = resolver.string("framework", None)?.unwrap_or_default();
    let scheduling = Scheduling::for_framework(&framework)?;
    let routes = handlers
        .iter()
        .map(|h| route::bind(&h.function, &resolver, scheduling))
        .collect::<Result<Vec<_>>>()?;

    let info = Info::from_config(&resolver)?;
    let info = if prefix.is_empty() {
        info
    } else {
        info.mounted_at(prefix)
    };
    let document = openapi::assemble(&routes, &info)?;
    match &info.filename {
        Some(path) if write_document => openapi::write(&document, path)?,
        // Sibling services would overwrite one another's file.
        Some(path) => warn!(
            prefix,
            path = %path.display(),
            "Inherited openapi.filename ignored; set it in the service's own config"
        ),
        None => {}
    }
    let document = Arc::new(document);

    // Outer plugins wrap every endpoint; `plugins` only the guarded ones.
    let mut outer: Vec<Arc<dyn Plugin>> = Vec::new();
    let enable_cors = resolver.flag("enable_cors", None)?;
    if enable_cors {
        let origins = resolver
            .string("cors_allowed_origins", None)?
            .unwrap_or_else(|| "*".to_string());
        outer.push(Arc::new(Cors::new(origins)));
    }
    outer.extend(resolver.plugins("middleware")?);
    let mut guarded = outer.clone();
    guarded.extend(resolver.plugins("plugins")?);

    let mut router = Router::new();
    router.add(Method::GET, "/ping", ping_entry(outer.clone()))?;

    for route in &routes {
        let entry = Entry::new(
            route.name.clone(),
            Endpoint::Bound(route.clone()),
            guarded.clone(),
        );
        router.add(route.method.clone(), &route.path, entry)?;
        if enable_cors && !router.has(&Method::OPTIONS, &route.path) {
            let preflight = Entry::new(route.name.clone(), Endpoint::Preflight, outer.clone());
            router.add(Method::OPTIONS, &route.path, preflight)?;
        }
    }

    if resolver.flag("publish_openapi", None)? {
        let plugins = if resolver.flag("openapi_insecure", None)? {
            outer.clone()
        } else {
            guarded.clone()
        };
        let entry = Entry::new("openapi", Endpoint::Json(Arc::clone(&document)), plugins);
        router.add(Method::GET, "/openapi", entry)?;
    }

    if resolver.flag("publish_swagger", None)? {
        let url = resolver
            .string("swagger_url", None)?
            .unwrap_or_else(|| "/swagger".to_string());
        let title = resolver
            .string("swagger_title", None)?
            .unwrap_or_else(|| "Swagger".to_string());
        let page = swagger_page(&title, &format!("{prefix}/openapi"));
        let entry = Entry::new("swagger", Endpoint::Html(Arc::new(page)), outer.clone());
        router.add(Method::GET, &url, entry)?;
    }

    debug!(prefix, routes = routes.len(), ?scheduling, "Service built");
    Ok(Built {
        router,
        routes,
        document,
    })
}

fn swagger_page(title: &str, openapi_url: &str) -> String {
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>
window.onload = () => {{
  window.ui = SwaggerUIBundle({{ url: "{openapi_url}", dom_id: "#swagger-ui" }});
}};
</script>
</body>
</html>
"##
    )
}
