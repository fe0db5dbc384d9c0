//! Per-function route attributes.
//!
//! Attributes live in a side table keyed by [`FunctionId`]; functions are never
//! mutated. The helpers here are the equivalents of route decorators.
//!
//! ```ignore
//! let mut metadata = Metadata::new();
//! metadata.http_get(&add).route(&add, "/math/add");
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::config::{ConfigValue, Hook};
use crate::mapper::{InputMapper, OutputMapper};
use crate::signature::{Function, FunctionId};

/// Settings attached to one function.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    values: BTreeMap<String, ConfigValue>,
}

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Side table of function attributes.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    table: HashMap<FunctionId, Attributes>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `key = value` to `func`.
    pub fn set(
        &mut self,
        func: &Function,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> &mut Self {
        self.table.entry(func.id()).or_default().insert(key, value);
        self
    }

    pub fn get(&self, id: FunctionId, key: &str) -> Option<&ConfigValue> {
        self.table.get(&id).and_then(|attrs| attrs.get(key))
    }

    pub fn attributes(&self, id: FunctionId) -> Option<&Attributes> {
        self.table.get(&id)
    }

    /// Copy every attribute of `other` into this table, overwriting on conflict.
    pub fn extend(&mut self, other: &Metadata) {
        for (id, attrs) in &other.table {
            let entry = self.table.entry(*id).or_default();
            for (key, value) in &attrs.values {
                entry.insert(key.clone(), value.clone());
            }
        }
    }

    /// The configured endpoint name, else the function's own name.
    pub fn effective_name<'a>(&'a self, func: &'a Function) -> &'a str {
        self.get(func.id(), "name")
            .and_then(ConfigValue::as_str)
            .unwrap_or_else(|| func.name())
    }

    pub fn http_get(&mut self, func: &Function) -> &mut Self {
        self.set(func, "http_method", "get")
    }

    pub fn http_post(&mut self, func: &Function) -> &mut Self {
        self.set(func, "http_method", "post")
    }

    pub fn http_put(&mut self, func: &Function) -> &mut Self {
        self.set(func, "http_method", "put")
    }

    pub fn http_delete(&mut self, func: &Function) -> &mut Self {
        self.set(func, "http_method", "delete")
    }

    pub fn route(&mut self, func: &Function, path: impl Into<String>) -> &mut Self {
        self.set(func, "route", path.into())
    }

    pub fn name(&mut self, func: &Function, name: impl Into<String>) -> &mut Self {
        self.set(func, "name", name.into())
    }

    pub fn input_mapper(&mut self, func: &Function, mapper: impl InputMapper + 'static) -> &mut Self {
        self.set(func, "input_mapper", Hook::input(mapper))
    }

    pub fn output_mapper(
        &mut self,
        func: &Function,
        mapper: impl OutputMapper + 'static,
    ) -> &mut Self {
        self.set(func, "output_mapper", Hook::output(mapper))
    }

    /// Bind arguments to request headers (argument name -> header name).
    pub fn header_inputs<I, K, V>(&mut self, func: &Function, bindings: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: BTreeMap<String, ConfigValue> = bindings
            .into_iter()
            .map(|(k, v)| (k.into(), ConfigValue::Str(v.into())))
            .collect();
        self.set(func, "header_inputs", map)
    }
}
