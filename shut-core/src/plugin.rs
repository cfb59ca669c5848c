//! Plugins populate a graph with a named set of groups and tasks.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::TaskGraph;

/// Key in [`TaskGraph::custom_data`] listing the plugins already applied to the graph.
pub const APPLIED_PLUGINS: &str = "applied_plugins";

/// Information about the project a plugin is applied for.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Directory containing the project's `shut.toml`.
    pub root: PathBuf,
}

pub trait Plugin {
    fn name(&self) -> &str;
    fn register(&self, graph: &mut TaskGraph, ctx: &PluginContext) -> Result<()>;
}

/// Returns whether the plugin named `name` was already applied to `graph`.
pub fn is_applied(graph: &TaskGraph, name: &str) -> bool {
    graph
        .custom_data()
        .get(APPLIED_PLUGINS)
        .and_then(Value::as_array)
        .is_some_and(|applied| applied.iter().any(|v| v.as_str() == Some(name)))
}

/// Applies `plugin` to `graph` unless it was applied before.
///
/// Returns `true` if the plugin registered its tasks now.
pub fn apply(graph: &mut TaskGraph, plugin: &dyn Plugin, ctx: &PluginContext) -> Result<bool> {
    let name = plugin.name().to_string();
    if is_applied(graph, &name) {
        debug!(plugin = %name, "plugin already applied");
        return Ok(false);
    }

    plugin.register(graph, ctx)?;

    let applied = graph
        .custom_data_mut()
        .entry(APPLIED_PLUGINS)
        .or_insert_with(|| Value::Array(Vec::new()));
    match applied {
        Value::Array(list) => list.push(Value::String(name.clone())),
        _ => {
            return Err(Error::Plugin {
                plugin: name,
                message: format!("custom data key '{}' is not a list", APPLIED_PLUGINS),
            })
        }
    }

    debug!(plugin = %name, "applied plugin");
    Ok(true)
}

type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Registry of plugins available by name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin factory under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.plugins.insert(name.to_string(), Box::new(factory));
    }

    /// Creates the plugin registered under `name`.
    pub fn get(&self, name: &str) -> Option<Box<dyn Plugin>> {
        self.plugins.get(name).map(|factory| factory())
    }

    /// Lists registered plugin names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Applies the plugin registered under `name` to `graph`.
    ///
    /// # Errors
    ///
    /// Returns an error if no plugin is registered under `name`.
    pub fn apply(&self, graph: &mut TaskGraph, name: &str, ctx: &PluginContext) -> Result<bool> {
        let plugin = self.get(name).ok_or_else(|| Error::Plugin {
            plugin: name.to_string(),
            message: format!("unknown plugin. Available plugins: {}", self.names().join(", ")),
        })?;
        apply(graph, plugin.as_ref(), ctx)
    }
}
