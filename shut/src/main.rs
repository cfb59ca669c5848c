mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shut_core::OnFailure;
use tracing::Level;

#[derive(Parser)]
#[command(name = "shut")]
#[command(about = "Dependency-aware task runner for project maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = shut_core::CONFIG_FILE)]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every task with its group and dependencies.
    List {
        #[arg(long, action)]
        json: bool,
    },
    /// Print the execution order for a selection without running anything.
    Plan {
        select: Vec<String>,
        #[arg(long, action)]
        json: bool,
    },
    /// Run the selected tasks (all if none) and their dependencies.
    Run {
        select: Vec<String>,
        #[arg(long, value_enum, default_value = "continue")]
        on_failure: OnFailureArg,
        #[arg(long, action)]
        no_progress: bool,
    },
    /// List the built-in plugins.
    Plugins,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum OnFailureArg {
    Continue,
    SkipDependents,
    Halt,
}

impl From<OnFailureArg> for OnFailure {
    fn from(arg: OnFailureArg) -> Self {
        match arg {
            OnFailureArg::Continue => OnFailure::Continue,
            OnFailureArg::SkipDependents => OnFailure::SkipDependents,
            OnFailureArg::Halt => OnFailure::Halt,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List { json } => commands::cmd_list(&cli.config, json)?,
        Commands::Plan { select, json } => commands::cmd_plan(&cli.config, select, json)?,
        Commands::Run {
            select,
            on_failure,
            no_progress,
        } => commands::cmd_run(&cli.config, select, on_failure.into(), no_progress)?,
        Commands::Plugins => commands::cmd_plugins(),
    }

    Ok(())
}
