//! Implementation of the `osiris forward` command.
//!
//! Reads platform events as JSON lines and forwards the build transitions
//! among them to the ingestion hooks, one at a time.

use std::path::Path;

use anyhow::{Context, Result};
use osiris_lib::delivery::DeliveryClient;
use osiris_lib::delivery::watch::{WatchOptions, forward_events};
use osiris_lib::hook::LogMode;
use tokio::io::BufReader;

use super::{load_config, runtime};
use crate::output::{OutputFormat, print_json, print_stat, print_success, print_warning};

pub fn cmd_forward(file: Option<&Path>, mode: Option<LogMode>, log_level: Option<u32>, output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let client = DeliveryClient::new(config.osiris_host.as_str(), config.retry_policy(), config.timeout)
    .context("Failed to create delivery client")?;
  let options = WatchOptions { mode, log_level };

  let rt = runtime()?;
  let stats = rt.block_on(async {
    let result = match file {
      Some(path) => {
        let file = tokio::fs::File::open(path)
          .await
          .with_context(|| format!("Failed to open {}", path.display()))?;
        forward_events(BufReader::new(file), &client, options).await
      }
      None => forward_events(BufReader::new(tokio::io::stdin()), &client, options).await,
    };
    result.context("Failed to read events")
  })?;

  if output.is_json() {
    print_json(&stats)?;
  } else {
    if stats.failed > 0 {
      print_warning(&format!("{} notification(s) could not be delivered", stats.failed));
    } else {
      print_success("Forwarding complete");
    }
    print_stat("Events read", &stats.read.to_string());
    print_stat("Delivered", &stats.delivered.to_string());
    print_stat("Failed", &stats.failed.to_string());
    print_stat("Skipped", &stats.skipped.to_string());
    print_stat("Invalid", &stats.invalid.to_string());
  }

  Ok(())
}
