//! Task execution command.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use comfy_table::{Cell, Table};
use indicatif::ProgressBar;

use shut_core::{OnFailure, RunReport, TaskGraph, TaskRunner, TaskStatus, TASK_BEGIN, TASK_END};

use crate::formatting::{
    create_progress_bar, format_duration, print_error, print_section_header,
    print_separator_with_spacing, print_success, print_summary_box, print_warning, SectionStyle,
    Status,
};

use super::populate_graph;

fn print_run_results(report: &RunReport) -> bool {
    print_section_header("Results", SectionStyle::Secondary);

    let mut table = Table::new();
    table
        .set_header(vec![
            Cell::new("Status").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Task").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Time").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Details").add_attribute(comfy_table::Attribute::Bold),
        ])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);

    for result in &report.results {
        let status = Status::from(result.status);
        let details = match (&result.error, result.status) {
            (Some(failure), _) => failure.to_string(),
            (None, TaskStatus::Skipped) if result.blocked => "dependency failed".to_string(),
            (None, TaskStatus::Skipped) => "skipped".to_string(),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(status.symbol()).fg(status.table_color()),
            Cell::new(&result.id).fg(comfy_table::Color::White),
            Cell::new(format_duration(result.duration.as_secs_f64()))
                .fg(comfy_table::Color::DarkGrey),
            Cell::new(details).fg(status.table_color()),
        ]);
    }
    for id in &report.not_run {
        table.add_row(vec![
            Cell::new(Status::Info.symbol()).fg(Status::Info.table_color()),
            Cell::new(id).fg(comfy_table::Color::DarkGrey),
            Cell::new(""),
            Cell::new("not run").fg(comfy_table::Color::DarkGrey),
        ]);
    }

    println!("{}", table);
    println!();

    let failed = report.count(TaskStatus::Error);
    if failed > 0 {
        print_warning(&format!(
            "{} succeeded, {} failed",
            report.count(TaskStatus::Success),
            failed
        ));
        for result in report.failures() {
            if let Some(backtrace) = result.error.as_ref().and_then(|f| f.backtrace.as_ref()) {
                tracing::debug!(id = %result.id, "backtrace:\n{}", backtrace);
            }
        }
    } else {
        print_success(&format!(
            "All {} tasks completed",
            report.count(TaskStatus::Success) + report.count(TaskStatus::Skipped)
        ));
    }

    failed > 0
}

pub fn cmd_run(
    config: &Path,
    select: Vec<String>,
    on_failure: OnFailure,
    no_progress: bool,
) -> Result<()> {
    let start = Instant::now();

    let pb = if no_progress {
        ProgressBar::hidden()
    } else {
        create_progress_bar(0)
    };
    let sink_pb = pb.clone();
    let mut graph = TaskGraph::with_event_sink(move |event, task| match event {
        TASK_BEGIN => sink_pb.set_message(task.id.to_string()),
        TASK_END => sink_pb.inc(1),
        _ => {}
    });
    populate_graph(config, &mut graph)?;

    let planned = if select.is_empty() {
        graph.ordered_tasks()?.len()
    } else {
        graph.ordered_selection(&select)?.len()
    };
    pb.set_length(planned as u64);

    print_section_header("Running tasks", SectionStyle::Primary);

    let report = TaskRunner::new()
        .with_on_failure(on_failure)
        .run_with(&mut graph, &select, |result| {
            if result.status == TaskStatus::Error {
                pb.suspend(|| print_error(&format!("{} failed", result.id)));
            }
        })?;
    pb.finish_and_clear();

    let failed = print_run_results(&report);

    print_separator_with_spacing();

    let duration_str = format_duration(start.elapsed().as_secs_f64());
    let succeeded = report.count(TaskStatus::Success).to_string();
    let skipped = report.count(TaskStatus::Skipped).to_string();
    let errors = report.count(TaskStatus::Error).to_string();
    let not_run = report.not_run.len().to_string();
    print_summary_box(
        "Summary",
        &[
            ("Duration", &duration_str),
            ("Succeeded", &succeeded),
            ("Skipped", &skipped),
            ("Failed", &errors),
            ("Not run", &not_run),
        ],
    );
    println!();

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
