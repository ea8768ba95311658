//! Implementation of the `osiris log` command.
//!
//! Prints a stored log, or with `--remote` asks the cluster for it directly.

use anyhow::{Result, bail};

use super::{load_config, open_service, runtime, service_error};
use crate::output::{OutputFormat, print_json};

pub fn cmd_log(
  build_id: &str,
  remote: bool,
  namespace: Option<&str>,
  log_level: Option<u32>,
  output: OutputFormat,
) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  if remote {
    let rt = runtime()?;
    let text = rt
      .block_on(service.get_remote_log(build_id, namespace, log_level))
      .map_err(service_error)?;
    if output.is_json() {
      print_json(&serde_json::json!({ "build_id": build_id, "data": text }))?;
    } else {
      print!("{}", text);
    }
    return Ok(());
  }

  let Some(log) = service.build_log(build_id).map_err(service_error)? else {
    bail!("Build {} has no log attached", build_id);
  };

  if output.is_json() {
    print_json(&log)?;
  } else {
    print!("{}", log.data());
  }

  Ok(())
}
