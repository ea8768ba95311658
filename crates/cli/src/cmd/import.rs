//! Implementation of the `osiris import` command.
//!
//! Each file becomes a build of its own, named after the file without the
//! `.log` extension.

use std::path::PathBuf;

use anyhow::{Context, Result};
use osiris_lib::service::build_id_from_log_file;

use super::{load_config, open_service, service_error};
use crate::output::{OutputFormat, print_json, print_success};

pub fn cmd_import(files: &[PathBuf], output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  let mut imported = Vec::with_capacity(files.len());
  for file in files {
    let file_name = file
      .file_name()
      .and_then(|name| name.to_str())
      .with_context(|| format!("Invalid log file name: {}", file.display()))?;
    let build_id = build_id_from_log_file(file_name);

    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let document_id = service.import_build_log(build_id, text).map_err(service_error)?;

    if !output.is_json() {
      print_success(&format!("Imported {} as {}", file.display(), build_id));
    }
    imported.push(serde_json::json!({ "build_id": build_id, "document_id": document_id }));
  }

  if output.is_json() {
    print_json(&imported)?;
  }

  Ok(())
}
