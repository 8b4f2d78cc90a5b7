//! Plain terminal output: labels, JSON, and the spinner used while waiting.

use crate::completion::ProgressSink;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// Spinner on stderr. Hidden when `quiet` so `--json` output stays parseable.
pub fn spinner(message: impl Into<String>, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.into());
    pb.enable_steady_tick(TICK);
    Ok(pb)
}

impl ProgressSink for ProgressBar {
    fn set_text(&self, text: String) {
        self.set_message(text);
    }
}

pub fn format_label(label: &str, value: impl std::fmt::Display) -> String {
    format!("  {label}: {value}")
}

pub fn format_success(message: &str) -> String {
    format!("✓ {message}")
}

pub fn format_warning(message: &str) -> String {
    format!("⚠ {message}")
}

/// Percent with no decimals.
pub fn format_progress(progress: f64) -> String {
    format!("{progress:.0}%")
}

pub fn print_label(label: &str, value: impl std::fmt::Display) {
    println!("{}", format_label(label, value));
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("Name", "John"), "  Name: John");
        assert!(format_label("Status", "Active").starts_with("  "));
        assert_eq!(format_label("Images", 12), "  Images: 12");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(format_success("Logged out"), "✓ Logged out");
        assert_eq!(format_warning("No brands found"), "⚠ No brands found");
    }

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0.0), "0%");
        assert_eq!(format_progress(42.4), "42%");
        assert_eq!(format_progress(99.6), "100%");
    }

    #[test]
    fn test_hidden_spinner_accepts_progress() {
        let pb = spinner("Waiting...", true).unwrap();
        assert!(pb.is_hidden());
        pb.set_text("Generating... (1.0s)".to_owned());
        assert_eq!(pb.message(), "Generating... (1.0s)");
    }
}
