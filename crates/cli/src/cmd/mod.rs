mod attach;
mod count;
mod forward;
mod get;
mod import;
mod list;
mod log;
mod purge;
mod ready;
mod send;
mod store;

pub use attach::cmd_attach;
pub use count::cmd_count;
pub use forward::cmd_forward;
pub use get::cmd_get;
pub use import::cmd_import;
pub use list::cmd_list;
pub use log::cmd_log;
pub use purge::cmd_purge;
pub use ready::cmd_ready;
pub use send::cmd_send;
pub use store::cmd_store;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use osiris_lib::cluster::OcCli;
use osiris_lib::config::Config;
use osiris_lib::service::{BuildService, ServiceError};
use osiris_lib::store::FsObjectStore;
use tracing::debug;

pub(crate) type Service = BuildService<FsObjectStore, OcCli>;

pub(crate) fn load_config() -> Result<Config> {
  Config::from_env().context("Invalid configuration")
}

pub(crate) fn open_service(config: &Config) -> Service {
  debug!(store = %config.store_dir.display(), prefix = %config.prefix, "opening build store");
  BuildService::new(config.build_store(), config.normalizer(), OcCli::default())
    .with_log_url_base(config.log_url_base().clone())
}

/// Turn a service failure into the message a client of the API would get.
pub(crate) fn service_error(err: ServiceError) -> anyhow::Error {
  let response = err.to_response();
  if response.errors.is_empty() {
    anyhow!("{} ({})", response.message, response.error)
  } else {
    anyhow!("{} ({}): {}", response.message, response.error, response.errors)
  }
}

/// Read a file, or stdin for `-`.
pub(crate) fn read_input(path: &Path) -> Result<String> {
  if path == Path::new("-") {
    let mut buf = String::new();
    std::io::stdin()
      .read_to_string(&mut buf)
      .context("Failed to read stdin")?;
    return Ok(buf);
  }
  std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub(crate) fn read_json(path: &Path) -> Result<serde_json::Value> {
  let text = read_input(path)?;
  serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
