//! Command implementations for the CLI.

mod execution;
mod info;

use std::path::Path;

use anyhow::{Context, Result};
use shut_core::{Config, TaskGraph};

pub use execution::cmd_run;
pub use info::{cmd_list, cmd_plan, cmd_plugins};

/// Loads the configuration and registers its tasks and plugins into `graph`.
fn populate_graph(config_path: &Path, graph: &mut TaskGraph) -> Result<()> {
    let config = Config::load(config_path)?;
    let registry = shut_plugins::builtin_registry();
    config
        .populate(graph, &registry)
        .with_context(|| format!("failed to build task graph from {}", config_path.display()))?;
    Ok(())
}

fn load_graph(config_path: &Path) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();
    populate_graph(config_path, &mut graph)?;
    Ok(graph)
}
