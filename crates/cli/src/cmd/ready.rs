use anyhow::Result;

use super::{load_config, open_service, service_error};
use crate::output::{OutputFormat, print_json, print_stat, print_success};

pub fn cmd_ready(output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  service.readiness().map_err(service_error)?;

  if output.is_json() {
    print_json(&serde_json::json!({ "ready": true, "store": config.store_dir, "prefix": config.prefix }))?;
  } else {
    print_success("Store is ready");
    print_stat("Store", &config.store_dir.display().to_string());
    print_stat("Prefix", &config.prefix);
  }

  Ok(())
}
