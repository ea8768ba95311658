//! Implementation of the `osiris send` command.
//!
//! Delivers one notification to the ingestion hooks at `OSIRIS_HOST`, with
//! the same retry policy as `osiris forward`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use osiris_lib::delivery::{DeliveryClient, DeliveryOutcome};
use osiris_lib::hook::{Hook, HookRequest, LogMode, Schema};

use super::{load_config, read_json, runtime};
use crate::output::{OutputFormat, print_json, print_stat, print_success};

pub fn cmd_send(
  hook: Hook,
  build_id: &str,
  file: &Path,
  schema: Schema,
  mode: Option<LogMode>,
  log_level: Option<u32>,
  output: OutputFormat,
) -> Result<()> {
  let config = load_config()?;
  let client = DeliveryClient::new(config.osiris_host.as_str(), config.retry_policy(), config.timeout)
    .context("Failed to create delivery client")?;

  let body = read_json(file)?;
  let request = match hook {
    Hook::Started => HookRequest::started(build_id, schema, body),
    Hook::Completed => {
      let mut request = HookRequest::completed(build_id, schema, body);
      request.mode = mode;
      request.log_level = log_level;
      request
    }
  };

  let rt = runtime()?;
  let outcome = rt.block_on(client.send(&request));

  if output.is_json() {
    print_json(&outcome)?;
  }

  match outcome {
    DeliveryOutcome::Delivered { retries } => {
      if !output.is_json() {
        print_success(&format!("Delivered {} notification for {}", hook.as_str(), build_id));
        print_stat("Retries", &retries.to_string());
      }
      Ok(())
    }
    DeliveryOutcome::Failed { status, reason, retries } => match status {
      Some(status) => bail!("Delivery failed with HTTP {} after {} retries: {}", status, retries, reason),
      None => bail!("Delivery failed after {} retries: {}", retries, reason),
    },
  }
}
