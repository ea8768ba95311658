//! Implementation of the `osiris store` command.
//!
//! Normalizes one input document and upserts the resulting record.

use std::path::Path;

use anyhow::{Result, anyhow, bail};
use osiris_lib::hook::Schema;
use osiris_lib::normalize::BuildEvent;
use osiris_lib::service::Accepted;

use super::{load_config, open_service, read_json, service_error};
use crate::output::{OutputFormat, print_json, print_stat, print_success, print_validation_warnings};

pub fn cmd_store(file: &Path, schema: Schema, output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let service = open_service(&config);

  let body = read_json(file)?;
  let event = BuildEvent::parse(schema, body).map_err(|errors| anyhow!("Invalid {} input: {}", schema.as_str(), errors))?;
  let normalized = config.normalizer().normalize(&event, None);
  if normalized.record.build_id.is_empty() {
    bail!("Cannot store a build without a build id: {}", normalized.errors);
  }

  let document_id = service.store_record(&normalized.record).map_err(service_error)?;
  let accepted = Accepted {
    build_id: normalized.record.build_id,
    document_id,
    errors: normalized.errors,
  };

  if output.is_json() {
    print_json(&accepted)?;
  } else {
    print_validation_warnings(&accepted.errors);
    print_success(&format!("Stored {}", accepted.build_id));
    print_stat("Document", accepted.document_id.as_str());
  }

  Ok(())
}
