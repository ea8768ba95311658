use std::path::Path;

use anyhow::Result;
use osiris_lib::build::BuildLog;

use super::{load_config, open_service, read_input, service_error};
use crate::output::{OutputFormat, print_json, print_success};

pub fn cmd_attach(build_id: &str, file: &Path, force: bool, output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  let text = read_input(file)?;
  let document_id = service
    .put_build_log(build_id, BuildLog::for_build(build_id, text), force)
    .map_err(service_error)?;

  if output.is_json() {
    print_json(&serde_json::json!({ "build_id": build_id, "document_id": document_id }))?;
  } else {
    print_success(&format!("Attached log to {}", build_id));
  }

  Ok(())
}
