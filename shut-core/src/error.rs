//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

/// Structural and configuration errors.
///
/// These indicate misuse of the graph API by whoever builds it. Failures raised by a task's
/// action are never reported through this type; they are recorded on the task instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Cannot add {kind} {name:?} to {parent}: name already used")]
    DuplicateName {
        kind: &'static str,
        name: String,
        parent: String,
    },

    #[error("Not found: {id}. Available: {available}")]
    NotFound { id: String, available: String },

    #[error("Handle does not belong to this graph: {0}")]
    ForeignHandle(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Task \"{id}\" was already executed (status: {status})")]
    AlreadyExecuted { id: String, status: String },

    #[error("Graph is frozen: cannot {0} after execution has started")]
    GraphFrozen(&'static str),

    #[error("Config file not found: {}. Expected 'shut.toml' in the project directory.", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Plugin error for {plugin}: {message}")]
    Plugin { plugin: String, message: String },
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "shut.toml".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
