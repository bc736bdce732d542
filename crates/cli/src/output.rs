//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use predictor_lib::models::{Direction, PredictionResult};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a rounded table, or a warning when there is nothing to show
pub fn print_table<T: Tabled>(rows: Vec<T>, empty_message: &str) {
    if rows.is_empty() {
        print_warning(empty_message);
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as a percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Format a SHAP impact with an explicit sign
pub fn format_impact(impact: f64) -> String {
    format!("{:+.4}", impact)
}

/// Color the predicted label
pub fn color_label(result: &PredictionResult) -> String {
    if result.is_delayed() {
        result.label.red().bold().to_string()
    } else {
        result.label.green().bold().to_string()
    }
}

/// Color a factor's direction
pub fn color_direction(direction: Direction) -> String {
    match direction {
        Direction::IncreaseDelay => direction.as_str().red().to_string(),
        Direction::DecreaseDelay => direction.as_str().green().to_string(),
    }
}

/// Color the delay probability by how close it is to the threshold
pub fn color_probability(probability: f64, threshold: f64) -> String {
    let formatted = format_probability(probability);
    if probability >= threshold {
        formatted.red().to_string()
    } else if probability >= threshold * 0.75 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_probability() {
        assert_eq!(format_probability(0.72), "72.0%");
        assert_eq!(format_probability(0.0), "0.0%");
        assert_eq!(format_probability(1.0), "100.0%");
    }

    #[test]
    fn test_format_impact() {
        assert_eq!(format_impact(0.12345), "+0.1235");
        assert_eq!(format_impact(-0.5), "-0.5000");
    }
}
