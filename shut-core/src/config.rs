//! TOML configuration parsing for task definitions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::command::CommandAction;
use crate::error::{Error, Result};
use crate::graph::{GroupKey, Member, TaskGraph, TaskKey};
use crate::plugin::{PluginContext, PluginRegistry};
use crate::task::Task;

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE: &str = "shut.toml";

type Deps = SmallVec<[String; 4]>;

/// A task is either a bare command string or a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskValue {
    Simple(String),
    Complex(TaskConfig),
}

impl TaskValue {
    pub fn to_config(&self) -> TaskConfig {
        match self {
            TaskValue::Simple(command) => TaskConfig {
                command: command.clone(),
                ..TaskConfig::default()
            },
            TaskValue::Complex(config) => config.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub command: String,
    /// Identifiers of tasks or groups this task depends on.
    #[serde(
        default,
        deserialize_with = "deserialize_deps",
        serialize_with = "serialize_deps"
    )]
    pub depends_on: Deps,
    /// Working directory, relative to the project root.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Skip the task when this path (relative to the working directory) is missing.
    #[serde(default)]
    pub skip_if_missing: Option<PathBuf>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Dependencies shared by every task nested in the group.
    #[serde(
        default,
        deserialize_with = "deserialize_deps",
        serialize_with = "serialize_deps"
    )]
    pub depends_on: Deps,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskValue>,
    #[serde(default)]
    pub groups: IndexMap<String, GroupConfig>,
}

fn deserialize_deps<'de, D>(deserializer: D) -> std::result::Result<Deps, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let vec: Vec<String> = Vec::deserialize(deserializer)?;
    Ok(SmallVec::from_vec(vec))
}

fn serialize_deps<S>(deps: &Deps, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    deps.as_slice().serialize(serializer)
}

/// Project configuration as defined in `shut.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Plugins applied after the configured tasks are registered.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Environment variables passed to every command.
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskValue>,
    #[serde(default)]
    pub groups: IndexMap<String, GroupConfig>,
    /// Directory the configuration was loaded from.
    #[serde(skip)]
    pub root: PathBuf,
}

struct PendingDeps {
    key: TaskKey,
    id: String,
    deps: Deps,
}

impl Config {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::parse(&content, root).map_err(|e| match e {
            Error::Toml { error, .. } => Error::Toml {
                error,
                context: path.display().to_string(),
            },
            other => other,
        })
    }

    pub fn parse(content: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.root = root.into();
        Ok(config)
    }

    /// Registers the configured tasks, groups, plugins and dependency edges into `graph`.
    ///
    /// Dependencies are resolved after plugins are applied, so tasks may depend on plugin tasks.
    pub fn populate(&self, graph: &mut TaskGraph, registry: &PluginRegistry) -> Result<()> {
        let mut pending = Vec::new();

        for (name, value) in &self.tasks {
            let task = value.to_config();
            let key = graph.add_task(self.build_task(name, &task)?)?;
            pending.push(PendingDeps {
                key,
                id: name.clone(),
                deps: task.depends_on,
            });
        }

        for (name, group) in &self.groups {
            let key = graph.create_group(name, None)?;
            self.populate_group(graph, key, group, &Deps::new(), &mut pending)?;
        }

        let ctx = PluginContext {
            root: self.root.clone(),
        };
        for plugin in &self.plugins {
            registry.apply(graph, plugin, &ctx)?;
        }

        for PendingDeps { key, id, deps } in pending {
            for dep in &deps {
                let member = graph.lookup(dep).map_err(|_| {
                    Error::InvalidConfig(format!("task '{}' depends on unknown '{}'", id, dep))
                })?;
                match member {
                    Member::Task(dependency) => graph.add_edge(dependency, key)?,
                    Member::Group(_) => {
                        for dependency in graph.select(&[dep])? {
                            if dependency != key {
                                graph.add_edge(dependency, key)?;
                            }
                        }
                    }
                }
            }
        }

        debug!(tasks = graph.len(), "populated graph from config");
        Ok(())
    }

    fn populate_group(
        &self,
        graph: &mut TaskGraph,
        key: GroupKey,
        group: &GroupConfig,
        inherited: &Deps,
        pending: &mut Vec<PendingDeps>,
    ) -> Result<()> {
        let mut shared = inherited.clone();
        shared.extend(group.depends_on.iter().cloned());

        for (name, value) in &group.tasks {
            let task = value.to_config();
            let built = self.build_task(name, &task)?;
            let task_key = graph.group_mut(key)?.add_task(built)?;

            let mut deps = shared.clone();
            deps.extend(task.depends_on);
            pending.push(PendingDeps {
                key: task_key,
                id: graph.identifier(task_key)?,
                deps,
            });
        }

        for (name, child) in &group.groups {
            let child_key = graph.group_mut(key)?.create_group(name)?;
            self.populate_group(graph, child_key, child, &shared, pending)?;
        }

        Ok(())
    }

    fn build_task(&self, name: &str, config: &TaskConfig) -> Result<Task> {
        if config.command.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "task '{}' has an empty command",
                name
            )));
        }

        let cwd = match &config.cwd {
            Some(cwd) => self.root.join(cwd),
            None => self.root.clone(),
        };
        let mut env = self.env.clone();
        env.extend(config.env.clone());

        let mut action = CommandAction::new(config.command.clone(), cwd).with_env(env);
        if let Some(path) = &config.skip_if_missing {
            action = action.skip_if_missing(path.clone());
        }
        Ok(Task::new(name, action))
    }
}
