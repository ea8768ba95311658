//! Implementation of the `osiris purge` command.
//!
//! Deletes every build under the configured prefix.

use anyhow::Result;

use super::{load_config, open_service, service_error};
use crate::output::{OutputFormat, print_info, print_json, print_success};
use crate::prompts::confirm_purge;

pub fn cmd_purge(yes: bool, output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  let count = if yes { 0 } else { service.count().map_err(service_error)? };
  if !confirm_purge(&config.prefix, count, yes)? {
    print_info("Aborted.");
    return Ok(());
  }

  let removed = service.purge().map_err(service_error)?;
  if output.is_json() {
    print_json(&serde_json::json!({ "prefix": config.prefix, "removed": removed }))?;
  } else {
    print_success(&format!("Purged {} build(s)", removed));
  }

  Ok(())
}
