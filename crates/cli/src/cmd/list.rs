//! Implementation of the `osiris list` command.

use anyhow::Result;

use super::{load_config, open_service, service_error};
use crate::output::{self, OutputFormat, format_status, print_info, print_json, print_stat, print_warning};

pub fn cmd_list(page: usize, cursor: Option<&str>, verbose: bool, output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  let result = service.list(page, cursor).map_err(service_error)?;

  if output.is_json() {
    return print_json(&result);
  }

  if result.build_info.is_empty() {
    print_info("No builds found.");
    return Ok(());
  }

  for record in &result.build_info {
    println!(
      "  {} {} {}",
      output::symbols::INFO,
      record.build_id,
      format_status(&record.build_status)
    );
    if verbose {
      if let Some(url) = &record.build_url {
        println!("      {}", url);
      }
    }
  }

  for (key, errors) in &result.errors {
    print_warning(&format!("{} has invalid fields: {}", key, errors));
  }

  println!();
  print_stat("Page", &result.page.to_string());
  print_stat("Total", &result.total.to_string());
  if let Some(next) = &result.next_cursor {
    print_stat("Next", &format!("osiris list --page {} --cursor {}", result.page + 1, next));
  }

  Ok(())
}
