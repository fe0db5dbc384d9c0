//! Configuration values and the three-tier resolver.
//!
//! A setting is looked up, in order:
//! 1. Per-function attributes in the [`Metadata`] side table
//! 2. Call-level [`Overrides`]
//! 3. System [`Defaults`]
//!
//! A map found at tier 1 or 2 may be keyed by function name, with `$else` as
//! a fallback for functions it does not name. File and environment settings
//! are read into [`Overrides`] by [`Loader`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::mapper::{self, DefaultErrorHandler, ErrorHandler, InputMapper, OutputMapper};
use crate::metadata::Metadata;
use crate::plugin::Plugin;
use crate::signature::Function;
use crate::{Error, Result};

/// Key of the fallback entry in a per-function map.
pub const ELSE_KEY: &str = "$else";

/// A callable configuration value.
#[derive(Clone)]
pub enum Hook {
    Input(Arc<dyn InputMapper>),
    Output(Arc<dyn OutputMapper>),
    Error(Arc<dyn ErrorHandler>),
    Plugin(Arc<dyn Plugin>),
}

impl Hook {
    pub fn input(mapper: impl InputMapper + 'static) -> Self {
        Hook::Input(Arc::new(mapper))
    }

    pub fn output(mapper: impl OutputMapper + 'static) -> Self {
        Hook::Output(Arc::new(mapper))
    }

    pub fn error(handler: impl ErrorHandler + 'static) -> Self {
        Hook::Error(Arc::new(handler))
    }

    pub fn plugin(plugin: impl Plugin + 'static) -> Self {
        Hook::Plugin(Arc::new(plugin))
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Input(m) => write!(f, "Input({})", m.content_type()),
            Hook::Output(m) => write!(f, "Output({})", m.content_type()),
            Hook::Error(_) => f.write_str("Error(..)"),
            Hook::Plugin(p) => write!(f, "Plugin({})", p.name()),
        }
    }
}

/// Runtime type of a [`ConfigValue`], used for type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Callable,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "integer",
            Kind::Float => "float",
            Kind::Str => "string",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Callable => "callable",
        };
        f.write_str(name)
    }
}

/// A configuration value.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
    Hook(Hook),
}

impl ConfigValue {
    pub fn kind(&self) -> Kind {
        match self {
            ConfigValue::Null => Kind::Null,
            ConfigValue::Bool(_) => Kind::Bool,
            ConfigValue::Int(_) => Kind::Int,
            ConfigValue::Float(_) => Kind::Float,
            ConfigValue::Str(_) => Kind::Str,
            ConfigValue::List(_) => Kind::List,
            ConfigValue::Map(_) => Kind::Map,
            ConfigValue::Hook(_) => Kind::Callable,
        }
    }

    /// Null always matches, and so does anything when null is expected.
    pub fn matches(&self, expected: Kind) -> bool {
        expected == Kind::Null || self.kind() == Kind::Null || self.kind() == expected
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// JSON form of data values. Hooks have none.
    pub fn to_json(&self) -> Option<Value> {
        Some(match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Int(i) => Value::from(*i),
            ConfigValue::Float(f) => Value::from(*f),
            ConfigValue::Str(s) => Value::String(s.clone()),
            ConfigValue::List(items) => {
                Value::Array(items.iter().map(|i| i.to_json()).collect::<Option<_>>()?)
            }
            ConfigValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<_>>()?,
            ),
            ConfigValue::Hook(_) => return None,
        })
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Int(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ConfigValue::Str(s),
            Value::Array(items) => ConfigValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ConfigValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<Hook> for ConfigValue {
    fn from(value: Hook) -> Self {
        ConfigValue::Hook(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::List(value)
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigValue {
    fn from(value: BTreeMap<String, ConfigValue>) -> Self {
        ConfigValue::Map(value)
    }
}

/// A raw setting found at tier 1 or 2, before function selection.
#[derive(Debug)]
pub enum Setting<'a> {
    Direct(&'a ConfigValue),
    PerFunction {
        by_name: BTreeMap<String, ConfigValue>,
        fallback: Option<&'a ConfigValue>,
    },
}

impl<'a> Setting<'a> {
    pub fn classify(value: &'a ConfigValue) -> Self {
        match value {
            ConfigValue::Map(map) => Setting::PerFunction {
                by_name: map
                    .iter()
                    .filter(|(k, _)| k.as_str() != ELSE_KEY)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                fallback: map.get(ELSE_KEY),
            },
            other => Setting::Direct(other),
        }
    }

    /// Pick the value for `func_name`. A map is kept whole only when a map
    /// was explicitly expected and neither the name nor `$else` matched.
    pub fn select(self, func_name: Option<&str>, expected: Option<Kind>) -> Option<ConfigValue> {
        match self {
            Setting::Direct(value) => Some(value.clone()),
            Setting::PerFunction { by_name, fallback } => {
                if let Some(value) = func_name.and_then(|name| by_name.get(name)) {
                    return Some(value.clone());
                }
                if let Some(value) = fallback {
                    return Some(value.clone());
                }
                if expected == Some(Kind::Map) {
                    return Some(ConfigValue::Map(by_name));
                }
                None
            }
        }
    }
}

/// Call-level configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    values: BTreeMap<String, ConfigValue>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(mut self, other: Overrides) -> Self {
        self.values.extend(other.values);
        self
    }
}

/// System-level defaults, one per recognized key.
#[derive(Debug, Clone)]
pub struct Defaults {
    values: BTreeMap<&'static str, ConfigValue>,
}

impl Defaults {
    /// The built-in defaults.
    pub fn system() -> Self {
        let values: BTreeMap<&'static str, ConfigValue> = [
            ("app_name", "HTTP Service".into()),
            ("framework", "hyper".into()),
            ("input_mapper", Hook::input(mapper::JsonInput).into()),
            ("output_mapper", Hook::output(mapper::JsonOutput).into()),
            ("error_handler", Hook::error(DefaultErrorHandler::default()).into()),
            ("header_inputs", ConfigValue::Map(BTreeMap::new())),
            ("middleware", ConfigValue::List(Vec::new())),
            ("host", "localhost".into()),
            ("port", 3030u16.into()),
            ("http_method", "post".into()),
            ("openapi", ConfigValue::Map(BTreeMap::new())),
            ("logger", ConfigValue::Null),
            ("plugins", ConfigValue::List(Vec::new())),
            ("enable_cors", false.into()),
            ("cors_allowed_origins", "*".into()),
            ("publish_openapi", false.into()),
            ("openapi_insecure", false.into()),
            ("publish_swagger", false.into()),
            ("swagger_url", "/swagger".into()),
            ("swagger_title", "Swagger".into()),
            ("ssl_certfile", ConfigValue::Null),
            ("ssl_keyfile", ConfigValue::Null),
            ("name", ConfigValue::Null),
            ("route", ConfigValue::Null),
            ("debug", false.into()),
        ]
        .into_iter()
        .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::system()
    }
}

/// Resolves settings for one function (or for the whole service).
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    pub metadata: &'a Metadata,
    pub overrides: &'a Overrides,
    pub defaults: &'a Defaults,
}

impl<'a> Resolver<'a> {
    pub fn new(metadata: &'a Metadata, overrides: &'a Overrides, defaults: &'a Defaults) -> Self {
        Self {
            metadata,
            overrides,
            defaults,
        }
    }

    /// Resolve `key` for `func` (or service-wide when `None`).
    ///
    /// Without an `expected` kind, the kind of the default is required.
    pub fn resolve(
        &self,
        key: &str,
        func: Option<&Function>,
        expected: Option<Kind>,
    ) -> Result<ConfigValue> {
        let found = func
            .and_then(|f| self.metadata.get(f.id(), key))
            .or_else(|| self.overrides.get(key));
        let func_name = func.map(|f| self.metadata.effective_name(f));
        let chosen = found.and_then(|value| Setting::classify(value).select(func_name, expected));

        let Some(value) = chosen else {
            return Ok(self.defaults.get(key).cloned().unwrap_or(ConfigValue::Null));
        };
        let expected = match expected {
            Some(kind) => kind,
            None => self
                .defaults
                .get(key)
                .map(ConfigValue::kind)
                .ok_or_else(|| Error::Config(format!("Missing default value for key \"{key}\"")))?,
        };
        if !value.matches(expected) {
            return Err(Error::ConfigType {
                key: key.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(value)
    }

    pub fn string(&self, key: &str, func: Option<&Function>) -> Result<Option<String>> {
        Ok(self
            .resolve(key, func, Some(Kind::Str))?
            .as_str()
            .map(str::to_string))
    }

    pub fn flag(&self, key: &str, func: Option<&Function>) -> Result<bool> {
        Ok(self
            .resolve(key, func, Some(Kind::Bool))?
            .as_bool()
            .unwrap_or(false))
    }

    pub fn map(&self, key: &str, func: Option<&Function>) -> Result<BTreeMap<String, ConfigValue>> {
        Ok(self
            .resolve(key, func, Some(Kind::Map))?
            .as_map()
            .cloned()
            .unwrap_or_default())
    }

    /// Resolve a list of plugins.
    pub fn plugins(&self, key: &str) -> Result<Vec<Arc<dyn Plugin>>> {
        let value = self.resolve(key, None, Some(Kind::List))?;
        value
            .as_list()
            .unwrap_or_default()
            .iter()
            .map(|item| match item {
                ConfigValue::Hook(Hook::Plugin(plugin)) => Ok(Arc::clone(plugin)),
                _ => Err(Error::ConfigType {
                    key: key.to_string(),
                    expected: "list of plugins".to_string(),
                }),
            })
            .collect()
    }
}

/// Loads call-level overrides from a file, the environment and CLI flags.
///
/// Layers, each overriding the previous:
/// 1. Config file (TOML)
/// 2. Environment variables (`<PREFIX>_HOST`, `<PREFIX>_PORT`,
///    `<PREFIX>_FRAMEWORK`, `<PREFIX>_DEBUG`)
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct Loader {
    /// Environment variable prefix (e.g., "MYAPP" -> MYAPP_HOST, MYAPP_PORT)
    pub env_prefix: String,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            env_prefix: "GANGWAY".to_string(),
        }
    }
}

impl Loader {
    pub fn new(env_prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: env_prefix.into(),
        }
    }

    /// Load overrides.
    ///
    /// Mapper settings may name a bundled mapper (`"json"`, `"binary"`,
    /// `"form"`, `"raw"`), directly or per function.
    pub fn load(
        &self,
        config_path: Option<&Path>,
        cli_host: Option<&str>,
        cli_port: Option<u16>,
        cli_framework: Option<&str>,
    ) -> Result<Overrides> {
        let mut overrides = Overrides::new();

        if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
            let table: toml::Table = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
            for (key, value) in table {
                let value = from_toml(value);
                let value = match key.as_str() {
                    "input_mapper" | "output_mapper" => named_mappers(&key, value)?,
                    _ => value,
                };
                overrides.insert(key, value);
            }
        }

        let prefix = &self.env_prefix;
        if let Ok(host) = std::env::var(format!("{prefix}_HOST")) {
            overrides.insert("host", host);
        }
        if let Ok(port) = std::env::var(format!("{prefix}_PORT"))
            && let Ok(p) = port.parse::<u16>()
        {
            overrides.insert("port", p);
        }
        if let Ok(framework) = std::env::var(format!("{prefix}_FRAMEWORK")) {
            overrides.insert("framework", framework);
        }
        if let Ok(debug) = std::env::var(format!("{prefix}_DEBUG")) {
            overrides.insert("debug", matches!(debug.as_str(), "1" | "true" | "yes"));
        }

        if let Some(host) = cli_host {
            overrides.insert("host", host);
        }
        if let Some(port) = cli_port {
            overrides.insert("port", port);
        }
        if let Some(framework) = cli_framework {
            overrides.insert("framework", framework);
        }

        Ok(overrides)
    }
}

fn from_toml(value: toml::Value) -> ConfigValue {
    match value {
        toml::Value::String(s) => ConfigValue::Str(s),
        toml::Value::Integer(i) => ConfigValue::Int(i),
        toml::Value::Float(f) => ConfigValue::Float(f),
        toml::Value::Boolean(b) => ConfigValue::Bool(b),
        toml::Value::Datetime(d) => ConfigValue::Str(d.to_string()),
        toml::Value::Array(items) => ConfigValue::List(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => {
            ConfigValue::Map(table.into_iter().map(|(k, v)| (k, from_toml(v))).collect())
        }
    }
}

fn named_mappers(key: &str, value: ConfigValue) -> Result<ConfigValue> {
    match value {
        ConfigValue::Str(name) => {
            let hook = if key == "input_mapper" {
                mapper::input_by_name(&name).map(Hook::Input)
            } else {
                mapper::output_by_name(&name).map(Hook::Output)
            };
            hook.map(ConfigValue::Hook)
                .ok_or_else(|| Error::Config(format!("Unknown {key} \"{name}\"")))
        }
        ConfigValue::Map(map) => Ok(ConfigValue::Map(
            map.into_iter()
                .map(|(k, v)| named_mappers(key, v).map(|v| (k, v)))
                .collect::<Result<_>>()?,
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_something() -> Function {
        Function::new("create_something", Signature::new(), |_| Ok(Value::Null))
    }

    #[test]
    fn precedence_function_then_overrides_then_defaults() {
        let func = create_something();
        let defaults = Defaults::system();
        let mut metadata = Metadata::new();
        metadata.set(&func, "http_method", "get");
        let overrides = Overrides::new().set("http_method", "put");

        let resolver = Resolver::new(&metadata, &overrides, &defaults);
        let value = resolver.resolve("http_method", Some(&func), None).unwrap();
        assert_eq!(value.as_str(), Some("get"));

        let bare = Metadata::new();
        let resolver = Resolver::new(&bare, &overrides, &defaults);
        let value = resolver.resolve("http_method", Some(&func), None).unwrap();
        assert_eq!(value.as_str(), Some("put"));

        let empty = Overrides::new();
        let resolver = Resolver::new(&bare, &empty, &defaults);
        let value = resolver.resolve("http_method", Some(&func), None).unwrap();
        assert_eq!(value.as_str(), Some("post"));
    }

    #[test]
    fn per_function_maps_select_by_name() {
        let func = create_something();
        let other = Function::new("other", Signature::new(), |_| Ok(Value::Null));
        let defaults = Defaults::system();
        let metadata = Metadata::new();
        let overrides = Overrides::new().set(
            "http_method",
            serde_json::json!({"create_something": "put", "get_something": "get"}),
        );
        let resolver = Resolver::new(&metadata, &overrides, &defaults);

        let value = resolver.resolve("http_method", Some(&func), None).unwrap();
        assert_eq!(value.as_str(), Some("put"));
        // Not named, no $else: falls through to the default.
        let value = resolver.resolve("http_method", Some(&other), None).unwrap();
        assert_eq!(value.as_str(), Some("post"));
    }

    #[test]
    fn else_key_is_the_fallback() {
        let func = create_something();
        let defaults = Defaults::system();
        let metadata = Metadata::new();
        let overrides = Overrides::new().set(
            "http_method",
            serde_json::json!({"get_something": "get", "$else": "delete"}),
        );
        let resolver = Resolver::new(&metadata, &overrides, &defaults);
        let value = resolver.resolve("http_method", Some(&func), None).unwrap();
        assert_eq!(value.as_str(), Some("delete"));
    }

    #[test]
    fn expected_map_keeps_whole_map() {
        let func = create_something();
        let defaults = Defaults::system();
        let metadata = Metadata::new();
        let overrides =
            Overrides::new().set("header_inputs", serde_json::json!({"token": "X-Token"}));
        let resolver = Resolver::new(&metadata, &overrides, &defaults);
        let map = resolver.map("header_inputs", Some(&func)).unwrap();
        assert_eq!(map["token"].as_str(), Some("X-Token"));
    }

    #[test]
    fn type_mismatch_is_config_type_error() {
        let defaults = Defaults::system();
        let metadata = Metadata::new();
        let overrides = Overrides::new().set("port", "eighty");
        let resolver = Resolver::new(&metadata, &overrides, &defaults);
        let err = resolver.resolve("port", None, None).unwrap_err();
        assert!(matches!(err, Error::ConfigType { .. }));

        let overrides = Overrides::new().set("input_mapper", 3i64);
        let resolver = Resolver::new(&metadata, &overrides, &defaults);
        assert!(resolver.resolve("input_mapper", None, None).is_err());
    }

    #[test]
    fn explicit_null_is_kept() {
        let defaults = Defaults::system();
        let metadata = Metadata::new();
        let overrides = Overrides::new().set("host", ConfigValue::Null);
        let resolver = Resolver::new(&metadata, &overrides, &defaults);
        assert!(resolver.resolve("host", None, None).unwrap().is_null());
    }

    #[test]
    fn unknown_key_without_expected_kind_fails() {
        let defaults = Defaults::system();
        let metadata = Metadata::new();
        let overrides = Overrides::new().set("mystery", 1i64);
        let resolver = Resolver::new(&metadata, &overrides, &defaults);
        assert!(matches!(
            resolver.resolve("mystery", None, None),
            Err(Error::Config(_))
        ));
        assert!(resolver.resolve("mystery", None, Some(Kind::Int)).is_ok());
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
host = "127.0.0.1"
port = 3000
publish_openapi = true

[input_mapper]
upload = "binary"

[openapi]
title = "Math"
"#
        )
        .unwrap();

        let loader = Loader::new("LOADTEST");
        let overrides = loader.load(Some(file.path()), None, None, None).unwrap();

        assert_eq!(overrides.get("host").unwrap().as_str(), Some("127.0.0.1"));
        assert_eq!(overrides.get("port").unwrap().as_i64(), Some(3000));
        assert_eq!(overrides.get("publish_openapi").unwrap().as_bool(), Some(true));
        let mappers = overrides.get("input_mapper").unwrap().as_map().unwrap();
        assert!(matches!(mappers["upload"], ConfigValue::Hook(Hook::Input(_))));
    }

    #[test]
    fn cli_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "host = \"127.0.0.1\"\nport = 3000").unwrap();

        let loader = Loader::new("CLITEST");
        let overrides = loader
            .load(Some(file.path()), Some("0.0.0.0"), Some(8080), Some("hyper_blocking"))
            .unwrap();

        assert_eq!(overrides.get("host").unwrap().as_str(), Some("0.0.0.0"));
        assert_eq!(overrides.get("port").unwrap().as_i64(), Some(8080));
        assert_eq!(
            overrides.get("framework").unwrap().as_str(),
            Some("hyper_blocking")
        );
    }

    #[test]
    fn unknown_mapper_name_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "output_mapper = \"pickle\"").unwrap();
        let err = Loader::new("BADMAPPER")
            .load(Some(file.path()), None, None, None)
            .unwrap_err();
        assert!(err.to_string().contains("pickle"));
    }

    #[test]
    fn env_override() {
        // SAFETY: This is test code; the variables use a prefix no other test reads
        unsafe {
            std::env::set_var("ENVTEST_HOST", "env-host");
            std::env::set_var("ENVTEST_PORT", "9999");
        }

        let overrides = Loader::new("ENVTEST").load(None, None, None, None).unwrap();

        // SAFETY: see above
        unsafe {
            std::env::remove_var("ENVTEST_HOST");
            std::env::remove_var("ENVTEST_PORT");
        }

        assert_eq!(overrides.get("host").unwrap().as_str(), Some("env-host"));
        assert_eq!(overrides.get("port").unwrap().as_i64(), Some(9999));
    }
}
