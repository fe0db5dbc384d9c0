//! Expose objects instead of single functions.
//!
//! A dispatcher turns an object into one function whose `_attr_name` argument
//! selects the attribute to call; the remaining keyword arguments go to that
//! attribute. A factory additionally constructs objects: called without
//! `_obj_id` it builds one from the keyword arguments and returns its id,
//! called with `_obj_id` it dispatches to the stored object.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::signature::{Function, Param, Signature};
use crate::{Error, Result};

pub const ATTR_NAME: &str = "_attr_name";
pub const OBJ_ID: &str = "_obj_id";

/// An object with named, callable attributes.
pub trait Dispatch: Send + Sync {
    /// Call attribute `attr`. `None` when there is no such attribute.
    fn dispatch(&self, attr: &str, kwargs: Map<String, Value>) -> Option<Result<Value>>;
}

/// Which attributes may be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exposed {
    All,
    Only(Vec<String>),
}

impl Exposed {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Exposed::Only(names.into_iter().map(Into::into).collect())
    }

    fn allows(&self, attr: &str) -> bool {
        match self {
            Exposed::All => true,
            Exposed::Only(names) => names.iter().any(|n| n == attr),
        }
    }
}

fn call_attr(
    object: &dyn Dispatch,
    attr: &str,
    exposed: &Exposed,
    kwargs: Map<String, Value>,
) -> Result<Value> {
    let not_found = || {
        Error::Input(format!(
            "No attribute found with name {attr} or it is not dispatched"
        ))
    };
    if !exposed.allows(attr) {
        return Err(not_found());
    }
    object.dispatch(attr, kwargs).ok_or_else(not_found)?
}

/// One function exposing `object`'s attributes.
pub fn dispatcher<T>(name: impl Into<String>, object: Arc<T>, exposed: Exposed) -> Function
where
    T: Dispatch + 'static,
{
    let signature = Signature::new()
        .param(Param::keyword_only(ATTR_NAME).default(Value::Null))
        .param(Param::var_keyword("kwargs"));
    Function::new(name, signature, move |args| {
        let attr: Option<String> = args.get(ATTR_NAME)?;
        let attr = attr.ok_or_else(|| Error::Input(format!("{ATTR_NAME} is required")))?;
        let kwargs = args.extra().cloned().unwrap_or_default();
        call_attr(object.as_ref(), &attr, &exposed, kwargs)
    })
}

/// Objects created by factories, by id.
///
/// An object stays alive until [`ObjectStore::remove`] drops it.
#[derive(Default)]
pub struct ObjectStore {
    objects: RwLock<HashMap<String, Arc<dyn Dispatch>>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `object` under a fresh id.
    pub fn insert(&self, object: Arc<dyn Dispatch>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.objects
            .write()
            .map_err(|_| Error::Internal("object store lock poisoned".to_string()))?
            .insert(id.clone(), object);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<Arc<dyn Dispatch>>> {
        Ok(self
            .objects
            .read()
            .map_err(|_| Error::Internal("object store lock poisoned".to_string()))?
            .get(id)
            .cloned())
    }

    /// Forget `id`, returning the object it held.
    pub fn remove(&self, id: &str) -> Result<Option<Arc<dyn Dispatch>>> {
        Ok(self
            .objects
            .write()
            .map_err(|_| Error::Internal("object store lock poisoned".to_string()))?
            .remove(id))
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One function constructing objects with `construct` and dispatching to them.
pub fn factory<T, F>(
    name: impl Into<String>,
    store: Arc<ObjectStore>,
    construct: F,
    exposed: Exposed,
) -> Function
where
    T: Dispatch + 'static,
    F: Fn(Map<String, Value>) -> Result<T> + Send + Sync + 'static,
{
    let signature = Signature::new()
        .param(Param::keyword_only(OBJ_ID).default(Value::Null))
        .param(Param::keyword_only(ATTR_NAME).default(Value::Null))
        .param(Param::var_keyword("kwargs"));
    Function::new(name, signature, move |args| {
        let obj_id: Option<String> = args.get(OBJ_ID)?;
        let attr: Option<String> = args.get(ATTR_NAME)?;
        let kwargs = args.extra().cloned().unwrap_or_default();
        match (obj_id, attr) {
            (None, Some(_)) => Err(Error::Input(format!(
                "{ATTR_NAME} must be None when {OBJ_ID} is None"
            ))),
            (None, None) => {
                let object = construct(kwargs)?;
                store.insert(Arc::new(object)).map(Value::String)
            }
            (Some(id), attr) => {
                let object = store
                    .get(&id)?
                    .ok_or_else(|| Error::Input(format!("No object found with id {id}")))?;
                let attr = attr.ok_or_else(|| {
                    Error::Input(format!(
                        "{ATTR_NAME} must be provided when {OBJ_ID} is not None"
                    ))
                })?;
                call_attr(object.as_ref(), &attr, &exposed, kwargs)
            }
        }
    })
}
