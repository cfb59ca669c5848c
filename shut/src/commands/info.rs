//! Commands that inspect the task graph without running it.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use shut_core::TaskGraph;

use crate::formatting::{
    print_plan, print_plugin_list, print_section_header, print_task_table, print_warning,
    SectionStyle,
};

use super::load_graph;

#[derive(Serialize)]
struct TaskRow {
    id: String,
    group: Option<String>,
    dependencies: Vec<String>,
}

fn task_rows(graph: &TaskGraph) -> Result<Vec<TaskRow>> {
    let mut rows = Vec::with_capacity(graph.len());
    for (key, id, _) in graph.tasks() {
        let group = graph
            .task_parent(key)?
            .map(|parent| graph.group_identifier(parent))
            .transpose()?;
        let dependencies = graph
            .dependencies(key)?
            .into_iter()
            .map(|dep| graph.identifier(dep))
            .collect::<shut_core::Result<Vec<_>>>()?;
        rows.push(TaskRow {
            id: id.to_string(),
            group,
            dependencies,
        });
    }
    Ok(rows)
}

pub fn cmd_list(config: &Path, json: bool) -> Result<()> {
    let graph = load_graph(config)?;
    let rows = task_rows(&graph)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    print_section_header("Tasks", SectionStyle::Primary);
    if rows.is_empty() {
        print_warning("No tasks configured");
        return Ok(());
    }

    let table_rows: Vec<(String, String, Vec<String>)> = rows
        .into_iter()
        .map(|row| (row.id, row.group.unwrap_or_default(), row.dependencies))
        .collect();
    print_task_table(&table_rows);
    Ok(())
}

pub fn cmd_plan(config: &Path, select: Vec<String>, json: bool) -> Result<()> {
    let graph = load_graph(config)?;
    let order = if select.is_empty() {
        graph.ordered_tasks()?
    } else {
        graph.ordered_selection(&select)?
    };
    let ids = order
        .into_iter()
        .map(|key| graph.identifier(key))
        .collect::<shut_core::Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
        return Ok(());
    }

    print_section_header("Execution order", SectionStyle::Primary);
    print_plan(&ids);
    Ok(())
}

pub fn cmd_plugins() {
    let registry = shut_plugins::builtin_registry();
    print_section_header("Built-in plugins", SectionStyle::Primary);
    print_plugin_list(&registry.names());
}
