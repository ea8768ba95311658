use anyhow::Result;

use super::{load_config, open_service, service_error};
use crate::output::{OutputFormat, print_json, print_record};

pub fn cmd_get(build_id: &str, status_only: bool, output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  if status_only {
    let status = service.build_status(build_id).map_err(service_error)?;
    if output.is_json() {
      print_json(&serde_json::json!({ "build_id": build_id, "build_status": status }))?;
    } else {
      println!("{}", status);
    }
    return Ok(());
  }

  let record = service.build_info(build_id).map_err(service_error)?;
  if output.is_json() {
    print_json(&record)?;
  } else {
    print_record(&record);
  }

  Ok(())
}
