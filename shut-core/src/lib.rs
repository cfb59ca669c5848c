//! Dependency-aware task graph and scheduler.
//!
//! Collaborators build a [`TaskGraph`], organize [`Task`]s into [`TaskGroup`]s, declare
//! dependency edges, then execute the tasks one at a time in the order returned by
//! [`TaskGraph::ordered_tasks`] or [`TaskGraph::ordered_selection`].

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod group;
pub mod ident;
pub mod plugin;
pub mod runner;
pub mod task;

pub use command::CommandAction;
pub use config::{Config, CONFIG_FILE};
pub use error::{Error, Result};
pub use events::{EventSink, TaskRef, TASK_BEGIN, TASK_END};
pub use graph::{GroupKey, Member, TaskGraph, TaskKey};
pub use group::{GroupMut, GroupView, TaskGroup};
pub use plugin::{Plugin, PluginContext, PluginRegistry};
pub use runner::{OnFailure, RunReport, TaskResult, TaskRunner};
pub use task::{ActionContext, FailureKind, Outcome, Task, TaskAction, TaskFailure, TaskStatus};
