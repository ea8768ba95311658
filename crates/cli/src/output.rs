//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output: colored status
//! messages, JSON output and the rendering of build records.

use anyhow::Context;
use clap::ValueEnum;
use osiris_lib::build::{BuildRecord, ValidationErrors};
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// One warning per field that failed validation.
pub fn print_validation_warnings(errors: &ValidationErrors) {
  for (field, message) in errors.iter() {
    print_warning(&format!("{}: {}", field, message));
  }
}

/// Colored status: green when complete, red when failed, plain otherwise.
pub fn format_status(status: &str) -> String {
  let lower = status.to_ascii_lowercase();
  if lower.contains("fail") {
    status.if_supports_color(Stream::Stdout, |s| s.red()).to_string()
  } else if lower.contains("complete") {
    status.if_supports_color(Stream::Stdout, |s| s.green()).to_string()
  } else {
    status.to_string()
  }
}

pub fn print_record(record: &BuildRecord) {
  println!("{}", record.build_id);
  print_stat("Status", &format_status(&record.build_status));
  if let Some(info) = &record.ocp_info {
    print_stat("Kind", &info.kind);
    print_stat("Namespace", &info.namespace);
  }
  if let Some(url) = &record.build_url {
    print_stat("Build URL", url);
  }
  if let Some(url) = &record.build_log_url {
    print_stat("Log URL", url);
  }
  if let Some(ts) = record.first_timestamp {
    print_stat("Started", &ts.to_rfc3339());
  }
  if let Some(ts) = record.last_timestamp {
    print_stat("Finished", &ts.to_rfc3339());
  }
  print_stat("Log level", &record.log_level.to_string());
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_output_format_is_json() {
    assert!(OutputFormat::Json.is_json());
    assert!(!OutputFormat::Text.is_json());
    assert!(!OutputFormat::default().is_json());
  }

  #[test]
  fn test_format_status_keeps_text() {
    // colors are only applied on a terminal
    assert!(format_status("BuildCompleted").contains("BuildCompleted"));
    assert!(format_status("BuildFailed").contains("BuildFailed"));
    assert_eq!(format_status("BuildStarted"), "BuildStarted");
  }
}
