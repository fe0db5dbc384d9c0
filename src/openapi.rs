//! OpenAPI 3.0 document assembly from bound routes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value, json};

use crate::config::{ConfigValue, Resolver};
use crate::route::Route;
use crate::{Error, Result};

/// OpenAPI version written into every document.
pub const OPENAPI_VERSION: &str = "3.0.2";

/// Authentication advertised by a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    /// Bearer JWT, optionally with login and refresh endpoint metadata.
    Jwt {
        login_details: Option<Value>,
        refresh_details: Option<Value>,
    },
    /// API key in the `Authorization` header.
    ApiKey,
}

impl Auth {
    fn from_config(auth: &BTreeMap<String, ConfigValue>) -> Result<Self> {
        let detail = |key: &str| auth.get(key).and_then(ConfigValue::to_json);
        match auth.get("auth_type").and_then(ConfigValue::as_str) {
            Some("jwt") | None => Ok(Auth::Jwt {
                login_details: detail("login_details"),
                refresh_details: detail("refresh_details"),
            }),
            Some("api_key") => Ok(Auth::ApiKey),
            Some(other) => Err(Error::Config(format!(
                "Unknown auth_type \"{other}\": expected jwt or api_key"
            ))),
        }
    }

    fn scheme(&self) -> (&'static str, Value) {
        match self {
            Auth::Jwt {
                login_details,
                refresh_details,
            } => {
                let mut scheme = json!({
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT",
                });
                if let Some(login) = login_details {
                    scheme["x-login"] = login.clone();
                }
                if let Some(refresh) = refresh_details {
                    scheme["x-refresh"] = refresh.clone();
                }
                ("bearerAuth", scheme)
            }
            Auth::ApiKey => (
                "apiKey",
                json!({"type": "apiKey", "in": "header", "name": "Authorization"}),
            ),
        }
    }
}

/// Service-level document settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub title: String,
    pub version: String,
    pub base_url: String,
    /// Where to write the document, if anywhere.
    pub filename: Option<PathBuf>,
    pub auth: Option<Auth>,
    /// Service-wide header bindings, advertised as `x-header-inputs`.
    pub header_inputs: Option<Value>,
}

impl Info {
    /// Read the `openapi`, `host`, `port` and `header_inputs` settings.
    ///
    /// Without an explicit `base_url`, the URL is built from host and port;
    /// the protocol is `https` iff the port is 443.
    pub fn from_config(resolver: &Resolver<'_>) -> Result<Self> {
        let openapi = resolver.map("openapi", None)?;
        let text = |key: &str| openapi.get(key).and_then(ConfigValue::as_str).map(str::to_string);

        let base_url = match text("base_url") {
            Some(url) => url,
            None => {
                let host = resolver.string("host", None)?.unwrap_or_default();
                let port = resolver.resolve("port", None, None)?.as_i64().unwrap_or_default();
                let protocol = if port == 443 { "https" } else { "http" };
                format!("{protocol}://{host}:{port}")
            }
        };
        let auth = match openapi.get("auth") {
            Some(ConfigValue::Map(auth)) => Some(Auth::from_config(auth)?),
            Some(ConfigValue::Null) | None => None,
            Some(_) => {
                return Err(Error::ConfigType {
                    key: "openapi.auth".to_string(),
                    expected: "map".to_string(),
                });
            }
        };
        let header_inputs = resolver
            .map("header_inputs", None)?
            .into_iter()
            .filter_map(|(k, v)| v.to_json().map(|v| (k, v)))
            .collect::<Map<String, Value>>();

        Ok(Self {
            title: text("title").unwrap_or_else(|| "default".to_string()),
            version: text("version").unwrap_or_else(|| "0.1".to_string()),
            base_url,
            filename: text("filename").map(PathBuf::from),
            auth,
            header_inputs: (!header_inputs.is_empty()).then_some(Value::Object(header_inputs)),
        })
    }

    /// Same settings served under `base_url + prefix`.
    pub fn mounted_at(&self, prefix: &str) -> Self {
        Self {
            base_url: format!("{}{prefix}", self.base_url.trim_end_matches('/')),
            ..self.clone()
        }
    }
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "default".to_string(),
            version: "0.1".to_string(),
            base_url: "http://localhost:3030".to_string(),
            filename: None,
            auth: None,
            header_inputs: None,
        }
    }
}

/// The empty document for `info`.
pub fn template(info: &Info) -> Value {
    json!({
        "openapi": OPENAPI_VERSION,
        "info": {
            "title": info.title,
            "version": info.version,
        },
        "servers": [{ "url": info.base_url }],
        "paths": {},
    })
}

/// Merge one `{path: {method: operation}}` fragment into `paths`.
///
/// Methods of one path accumulate; a repeated `(path, method)` pair fails.
pub fn add_paths(paths: &mut Map<String, Value>, fragment: &Value) -> Result<()> {
    let Some(fragment) = fragment.as_object() else {
        return Ok(());
    };
    for (path, operations) in fragment {
        let existing = paths
            .entry(path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let (Value::Object(existing), Some(operations)) = (existing, operations.as_object()) else {
            continue;
        };
        for (method, operation) in operations {
            if existing.contains_key(method) {
                return Err(Error::DuplicatePathMethod {
                    path: path.clone(),
                    method: method.clone(),
                });
            }
            existing.insert(method.clone(), operation.clone());
        }
    }
    Ok(())
}

/// Build the document for `routes`, in order.
pub fn assemble(routes: &[Route], info: &Info) -> Result<Value> {
    let mut paths = Map::new();
    for route in routes {
        add_paths(&mut paths, &route.openapi_fragment())?;
    }

    let mut document = template(info);
    document["paths"] = Value::Object(paths);

    if let Some(auth) = &info.auth {
        let (name, scheme) = auth.scheme();
        document["components"] = json!({ "securitySchemes": { name: scheme } });
        document["security"] = json!([{ name: [] }]);
    }
    if let Some(header_inputs) = &info.header_inputs {
        document["x-header-inputs"] = header_inputs.clone();
    }
    Ok(document)
}

/// Write `document` as JSON to `path`.
pub fn write(document: &Value, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(document)?;
    std::fs::write(path, json)?;
    tracing::info!("Wrote OpenAPI document to {}", path.display());
    Ok(())
}
