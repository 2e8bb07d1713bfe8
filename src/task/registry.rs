//! Name-keyed table of task handlers.
//!
//! Populated by the embedding application. The same registry must be built in
//! every process role, since worker processes resolve names against their own copy.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::scheduler::Device;

/// Arguments handed to a task handler.
#[derive(Debug, Clone)]
pub struct TaskCall {
    /// Device the task was scheduled on.
    pub device: Device,
    pub working_dir: PathBuf,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl TaskCall {
    /// Deserialize positional argument `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        let value = self
            .args
            .get(index)
            .with_context(|| format!("missing positional argument {index}"))?;
        serde_json::from_value(value.clone())
            .with_context(|| format!("invalid positional argument {index}"))
    }

    /// Deserialize keyword argument `key`, `None` when absent.
    pub fn kwarg<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.kwargs.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("invalid keyword argument `{key}`")),
        }
    }
}

/// Handler signature. `Ok(None)` means "no return value".
pub type TaskFn = dyn Fn(TaskCall) -> anyhow::Result<Option<Value>> + Send + Sync;

/// Registry of task handlers keyed by `(module_name, function_name)`.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<(String, String), Arc<TaskFn>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `module::function`, replacing any previous one.
    pub fn register<F>(
        &mut self,
        module_name: impl Into<String>,
        function_name: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(TaskCall) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        self.handlers
            .insert((module_name.into(), function_name.into()), Arc::new(handler));
        self
    }

    pub fn get(&self, module_name: &str, function_name: &str) -> Option<Arc<TaskFn>> {
        self.handlers
            .get(&(module_name.to_string(), function_name.to_string()))
            .cloned()
    }

    pub fn contains(&self, module_name: &str, function_name: &str) -> bool {
        self.get(module_name, function_name).is_some()
    }

    /// Sorted `module::function` names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .map(|(m, f)| format!("{m}::{f}"))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tasks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(args: Vec<Value>, kwargs: Map<String, Value>) -> TaskCall {
        TaskCall {
            device: Device(1),
            working_dir: PathBuf::from("."),
            args,
            kwargs,
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = Registry::new();
        registry
            .register("math", "add", |c| {
                let a: i64 = c.arg(0)?;
                let b: i64 = c.arg(1)?;
                Ok(Some(json!(a + b)))
            })
            .register("math", "nothing", |_| Ok(None));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["math::add", "math::nothing"]);

        let add = registry.get("math", "add").unwrap();
        let out = add(call(vec![json!(2), json!(3)], Map::new())).unwrap();
        assert_eq!(out, Some(json!(5)));

        assert!(registry.get("math", "sub").is_none());
        assert!(!registry.contains("other", "add"));
    }

    #[test]
    fn missing_argument_is_an_error() {
        let c = call(vec![], Map::new());
        let err = c.arg::<i64>(0).unwrap_err();
        assert!(err.to_string().contains("missing positional argument 0"));
    }

    #[test]
    fn kwarg_absent_is_none() {
        let mut kwargs = Map::new();
        kwargs.insert("ms".into(), json!(25));
        let c = call(vec![], kwargs);
        assert_eq!(c.kwarg::<u64>("ms").unwrap(), Some(25));
        assert_eq!(c.kwarg::<u64>("other").unwrap(), None);
        assert!(c.kwarg::<String>("ms").is_err());
    }
}
