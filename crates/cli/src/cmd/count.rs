use anyhow::Result;

use super::{load_config, open_service, service_error};
use crate::output::{OutputFormat, print_json};

pub fn cmd_count(output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  let count = service.count().map_err(service_error)?;
  if output.is_json() {
    print_json(&serde_json::json!({ "count": count }))?;
  } else {
    println!("{}", count);
  }

  Ok(())
}
