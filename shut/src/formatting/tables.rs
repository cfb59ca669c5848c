//! Table and list output built on comfy-table.

use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(comfy_table::Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

/// Prints `(id, group, dependencies)` rows.
pub fn print_task_table(tasks: &[(String, String, Vec<String>)]) {
    let mut table = styled_table(&["Task", "Group", "Depends on"]);

    for (id, group, deps) in tasks {
        let deps_str = if deps.is_empty() {
            "-".bright_black().to_string()
        } else {
            deps.join(", ")
        };
        table.add_row(vec![
            Cell::new(id).fg(comfy_table::Color::White),
            Cell::new(group).fg(comfy_table::Color::DarkGrey),
            Cell::new(deps_str),
        ]);
    }

    println!("{}", table);
}

/// Prints an execution order as a numbered list.
pub fn print_plan(ids: &[String]) {
    if ids.is_empty() {
        println!("  {} {}", "→".cyan(), "(nothing to run)".bright_black());
        return;
    }

    let width = ids.len().to_string().len();
    for (pos, id) in ids.iter().enumerate() {
        println!(
            "  {} {}",
            format!("{:>width$}.", pos + 1, width = width).bright_black(),
            id.bold().white()
        );
    }
}

pub fn print_plugin_list(names: &[&str]) {
    if names.is_empty() {
        println!("  {} {}", "→".cyan(), "(none)".bright_black());
        return;
    }

    for name in names {
        println!("  {} {}", "→".cyan(), name.bold().white());
    }
}
