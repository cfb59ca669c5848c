//! Status indicators and message formatting.

use owo_colors::OwoColorize;
use shut_core::TaskStatus;

#[derive(Debug, Clone, Copy)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
}

impl Status {
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Error => "✗",
            Status::Warning => "⚠",
            Status::Info => "→",
        }
    }

    fn colored_symbol(&self) -> String {
        match self {
            Status::Success => self.symbol().green().to_string(),
            Status::Error => self.symbol().red().to_string(),
            Status::Warning => self.symbol().yellow().to_string(),
            Status::Info => self.symbol().cyan().to_string(),
        }
    }

    /// Color used for this status inside result tables.
    pub fn table_color(&self) -> comfy_table::Color {
        match self {
            Status::Success => comfy_table::Color::Green,
            Status::Error => comfy_table::Color::Red,
            Status::Warning => comfy_table::Color::Yellow,
            Status::Info => comfy_table::Color::Cyan,
        }
    }

    /// Formats a status message with symbol and color.
    pub fn format(&self, message: &str) -> String {
        let text = match self {
            Status::Success => message.green().bold().to_string(),
            Status::Error => message.red().bold().to_string(),
            Status::Warning => message.yellow().bold().to_string(),
            Status::Info => message.cyan().to_string(),
        };
        format!("{} {}", self.colored_symbol(), text)
    }
}

impl From<TaskStatus> for Status {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Success => Status::Success,
            TaskStatus::Error => Status::Error,
            TaskStatus::Skipped => Status::Warning,
            TaskStatus::Pending | TaskStatus::Running => Status::Info,
        }
    }
}

pub fn print_success(message: &str) {
    println!("  {}", Status::Success.format(message));
}

pub fn print_error(message: &str) {
    println!("  {}", Status::Error.format(message));
}

pub fn print_warning(message: &str) {
    println!("  {}", Status::Warning.format(message));
}
