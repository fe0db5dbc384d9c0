//! HTTP routing with matchit.
//!
//! Maps `(method, path)` to an [`Endpoint`] and the plugins wrapping it.

use std::collections::HashMap;
use std::sync::Arc;

use hyper::{Method, StatusCode};
use serde_json::Value;

use crate::plugin::Plugin;
use crate::request::Request;
use crate::response::{self, HttpResponse};
use crate::route::{Route, Scheduling};
use crate::{Error, Result};

/// What answers a request.
#[derive(Clone)]
pub enum Endpoint {
    /// A bound function.
    Bound(Route),
    /// A fixed JSON document, such as `/ping` or `/openapi`.
    Json(Arc<Value>),
    /// A fixed HTML page.
    Html(Arc<String>),
    /// An empty answer to a CORS preflight.
    Preflight,
}

/// An endpoint and the plugins wrapping it.
#[derive(Clone)]
pub struct Entry {
    pub name: String,
    pub endpoint: Endpoint,
    pub plugins: Vec<Arc<dyn Plugin>>,
}

impl Entry {
    pub fn new(name: impl Into<String>, endpoint: Endpoint, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            name: name.into(),
            endpoint,
            plugins,
        }
    }

    /// Run plugins around the endpoint.
    pub async fn serve(&self, req: Request) -> HttpResponse {
        let mut passed = 0;
        let mut rejection = None;
        for plugin in &self.plugins {
            if let Err(e) = plugin.before(&req) {
                tracing::info!(plugin = plugin.name(), "Request rejected: {e}");
                rejection = Some(e.into_response());
                break;
            }
            passed += 1;
        }

        let mut resp = match rejection {
            Some(resp) => resp,
            None => self.call(&req).await,
        };
        for plugin in self.plugins[..passed].iter().rev() {
            plugin.after(&req, &mut resp);
        }
        resp
    }

    async fn call(&self, req: &Request) -> HttpResponse {
        match &self.endpoint {
            Endpoint::Bound(route) => match route.scheduling {
                Scheduling::Suspending => route.respond(req).await,
                Scheduling::Blocking => {
                    let route = route.clone();
                    let req = req.clone();
                    tokio::task::spawn_blocking(move || route.respond_blocking(&req))
                        .await
                        .unwrap_or_else(|e| {
                            Error::Internal(format!("Handler task failed: {e}")).into_response()
                        })
                }
            },
            Endpoint::Json(value) => response::ok(value.as_ref()).unwrap_or_else(Error::into_response),
            Endpoint::Html(page) => response::html(page.to_string()),
            Endpoint::Preflight => response::no_content(),
        }
    }
}

/// HTTP router for registering and dispatching requests.
#[derive(Default)]
pub struct Router {
    routes: matchit::Router<usize>,
    /// Registered paths, in order, with their handlers by method.
    entries: Vec<(String, HashMap<Method, Entry>)>,
}

/// Result of matching a request to a route.
pub enum RouteMatch<'a> {
    /// Route matched with handler.
    Matched {
        entry: &'a Entry,
        params: HashMap<String, String>,
    },
    /// Path matched but method not allowed.
    MethodNotAllowed,
    /// Path not found.
    NotFound,
}

impl Router {
    /// Create a new router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` for a method and path.
    ///
    /// Registering the same pair twice fails.
    pub fn add(&mut self, method: Method, path: &str, entry: Entry) -> Result<()> {
        let existing = self.routes.at(path).ok().map(|matched| *matched.value);
        let idx = match existing.filter(|&idx| self.entries[idx].0 == path) {
            Some(idx) => idx,
            None => {
                let idx = self.entries.len();
                self.routes
                    .insert(path, idx)
                    .map_err(|e| Error::Config(format!("Cannot route {path}: {e}")))?;
                self.entries.push((path.to_string(), HashMap::new()));
                idx
            }
        };

        let handlers = &mut self.entries[idx].1;
        if handlers.contains_key(&method) {
            return Err(Error::DuplicatePathMethod {
                path: path.to_string(),
                method: method.as_str().to_ascii_lowercase(),
            });
        }
        handlers.insert(method, entry);
        Ok(())
    }

    /// Whether `path` already answers `method`.
    pub fn has(&self, method: &Method, path: &str) -> bool {
        self.entries
            .iter()
            .any(|(p, handlers)| p == path && handlers.contains_key(method))
    }

    /// Move every route of `other` under `prefix`.
    pub fn mount(&mut self, prefix: &str, other: Router) -> Result<()> {
        let prefix = prefix.trim_end_matches('/');
        for (path, handlers) in other.entries {
            let full = format!("{prefix}{path}");
            for (method, entry) in handlers {
                self.add(method, &full, entry)?;
            }
        }
        Ok(())
    }

    /// Path of the first entry named `name`.
    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, handlers)| handlers.values().any(|entry| entry.name == name))
            .map(|(path, _)| path.as_str())
    }

    /// Every registered `(path, method)` pair.
    pub fn endpoints(&self) -> Vec<(&str, &Method)> {
        let mut all: Vec<(&str, &Method)> = self
            .entries
            .iter()
            .flat_map(|(path, handlers)| handlers.keys().map(move |m| (path.as_str(), m)))
            .collect();
        all.sort_by(|a, b| (a.0, a.1.as_str()).cmp(&(b.0, b.1.as_str())));
        all
    }

    /// Match a request to a route.
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        match self.routes.at(path) {
            Ok(matched) => {
                let (_, handlers) = &self.entries[*matched.value];

                // Convert params to owned HashMap
                let params: HashMap<String, String> = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();

                match handlers.get(method) {
                    Some(entry) => RouteMatch::Matched { entry, params },
                    None => RouteMatch::MethodNotAllowed,
                }
            }
            Err(_) => RouteMatch::NotFound,
        }
    }

    /// Route and serve one request.
    pub async fn dispatch(&self, mut req: Request) -> HttpResponse {
        match self.match_route(&req.method, req.uri.path()) {
            RouteMatch::Matched { entry, params } => {
                req.params = params;
                entry.serve(req).await
            }
            RouteMatch::MethodNotAllowed => response::error(
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowed",
                "Method not allowed",
            ),
            RouteMatch::NotFound => {
                response::error(StatusCode::NOT_FOUND, "NotFoundError", "Not found")
            }
        }
    }
}
