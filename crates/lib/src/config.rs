//! Runtime configuration from the environment.
//!
//! | Variable                | Default                                   |
//! |-------------------------|-------------------------------------------|
//! | `OSIRIS_STORE_DIR`      | `$XDG_DATA_HOME/osiris/store`             |
//! | `THOTH_DEPLOYMENT_NAME` | `multipurpose`                            |
//! | `OSIRIS_PREFIX`         | `<deployment>/build_aggregator`           |
//! | `OC_LOG_LEVEL`          | `6`                                       |
//! | `OSIRIS_HOST`           | `http://0.0.0.0:5000`                     |
//! | `OSIRIS_PUBLIC_URL`     | `OSIRIS_HOST`                             |
//! | `OSIRIS_CLUSTER_HOST`   | unset                                     |
//! | `OSIRIS_RETRIES`        | `10`                                      |
//! | `OSIRIS_BACKOFF_FACTOR` | `5s`                                      |
//! | `OSIRIS_TIMEOUT`        | `60s`                                     |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::consts::{DEFAULT_DEPLOYMENT_NAME, DEFAULT_OC_LOG_LEVEL, DEFAULT_OSIRIS_HOST};
use crate::delivery::RetryPolicy;
use crate::normalize::Normalizer;
use crate::platform::paths;
use crate::store::{BuildStore, FsObjectStore, default_prefix};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid value '{value}' for {var}: {reason}")]
  Invalid {
    var: &'static str,
    value: String,
    reason: String,
  },

  #[error("cannot determine a data directory; set OSIRIS_STORE_DIR")]
  NoStoreDir,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub store_dir: PathBuf,
  pub deployment_name: String,
  pub prefix: String,
  pub oc_log_level: u32,
  /// Where the ingestion hooks are served.
  pub osiris_host: Url,
  /// Base of links handed out to clients, such as `build_log_url`.
  pub public_url: Option<Url>,
  /// Cluster API host that event `self_link`s are relative to.
  pub cluster_host: Option<Url>,
  pub retries: u32,
  pub backoff_factor: Duration,
  pub timeout: Duration,
}

impl Config {
  pub fn from_env() -> Result<Self, ConfigError> {
    let store_dir = match var("OSIRIS_STORE_DIR") {
      Some(dir) => PathBuf::from(dir),
      None => paths::store_dir().ok_or(ConfigError::NoStoreDir)?,
    };
    let deployment_name = var("THOTH_DEPLOYMENT_NAME").unwrap_or_else(|| DEFAULT_DEPLOYMENT_NAME.to_string());
    let prefix = var("OSIRIS_PREFIX").unwrap_or_else(|| default_prefix(&deployment_name));
    let defaults = RetryPolicy::default();

    Ok(Self {
      store_dir,
      prefix,
      deployment_name,
      oc_log_level: parse_var("OC_LOG_LEVEL", |v| v.parse::<u32>().map_err(|e| e.to_string()))?
        .unwrap_or(DEFAULT_OC_LOG_LEVEL),
      osiris_host: parse_value(
        "OSIRIS_HOST",
        var("OSIRIS_HOST").unwrap_or_else(|| DEFAULT_OSIRIS_HOST.to_string()),
        parse_url,
      )?,
      public_url: parse_var("OSIRIS_PUBLIC_URL", parse_url)?,
      cluster_host: parse_var("OSIRIS_CLUSTER_HOST", parse_url)?,
      retries: parse_var("OSIRIS_RETRIES", |v| v.parse::<u32>().map_err(|e| e.to_string()))?
        .unwrap_or(defaults.connect_retries),
      backoff_factor: parse_var("OSIRIS_BACKOFF_FACTOR", parse_duration)?.unwrap_or(defaults.backoff_factor),
      timeout: parse_var("OSIRIS_TIMEOUT", parse_duration)?.unwrap_or(Duration::from_secs(60)),
    })
  }

  /// Retry policy of the delivery client.
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      connect_retries: self.retries,
      status_retries: self.retries,
      backoff_factor: self.backoff_factor,
      ..RetryPolicy::default()
    }
  }

  pub fn normalizer(&self) -> Normalizer {
    let normalizer = Normalizer::new(self.oc_log_level);
    match &self.cluster_host {
      Some(host) => normalizer.with_cluster_host(host.clone()),
      None => normalizer,
    }
  }

  pub fn build_store(&self) -> BuildStore<FsObjectStore> {
    BuildStore::new(FsObjectStore::new(&self.store_dir), self.prefix.clone()).with_log_level(self.oc_log_level)
  }

  /// Base URL for links to stored logs.
  pub fn log_url_base(&self) -> &Url {
    self.public_url.as_ref().unwrap_or(&self.osiris_host)
  }
}

fn var(name: &str) -> Option<String> {
  env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &'static str, parse: impl Fn(&str) -> Result<T, String>) -> Result<Option<T>, ConfigError> {
  var(name).map(|value| parse_value(name, value, parse)).transpose()
}

fn parse_value<T>(
  name: &'static str,
  value: String,
  parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
  parse(&value).map_err(|reason| ConfigError::Invalid {
    var: name,
    value,
    reason,
  })
}

fn parse_url(value: &str) -> Result<Url, String> {
  let url = Url::parse(value).map_err(|e| e.to_string())?;
  if url.cannot_be_a_base() {
    return Err("not a base URL".to_string());
  }
  Ok(url)
}

fn parse_duration(value: &str) -> Result<Duration, String> {
  // bare numbers are seconds
  if let Ok(secs) = value.parse::<u64>() {
    return Ok(Duration::from_secs(secs));
  }
  humantime::parse_duration(value).map_err(|e| e.to_string())
}
