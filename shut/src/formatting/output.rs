use owo_colors::OwoColorize;

const RULE_WIDTH: usize = 60;

pub fn print_separator_with_spacing() {
    println!();
    println!("{}", "─".repeat(RULE_WIDTH).bright_black());
    println!();
}

/// Prints a boxed list of `key value` lines under `title`.
pub fn print_summary_box(title: &str, items: &[(&str, &str)]) {
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    println!(
        "┌─ {} {}",
        title.cyan().bold(),
        "─".repeat(RULE_WIDTH.saturating_sub(title.len() + 4)).bright_black()
    );
    for (key, value) in items {
        println!(
            "│ {} {}",
            format!("{:<width$}", key, width = width).bright_black().bold(),
            value.bold().white()
        );
    }
    println!("└{}", "─".repeat(RULE_WIDTH).bright_black());
}

/// Formats a duration given in seconds: `350ms`, `2.40s` or `3m 12.5s`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.2}s", seconds)
    } else {
        let mins = (seconds / 60.0) as u64;
        format!("{}m {:.1}s", mins, seconds % 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::format_duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.35), "350ms");
        assert_eq!(format_duration(2.4), "2.40s");
        assert_eq!(format_duration(192.5), "3m 12.5s");
    }
}
