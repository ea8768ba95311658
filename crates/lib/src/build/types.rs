use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::build::lifecycle::{BuildState, build_complete};
use crate::consts::DEFAULT_OC_LOG_LEVEL;

/// Descriptor of the platform object a build record originates from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcpInfo {
  pub kind: String,
  pub name: String,
  pub namespace: String,
  #[serde(default)]
  pub self_link: Option<String>,
}

/// A build log as stored alongside its record.
///
/// Older documents hold the log as a bare string, newer ones as
/// `{data, metadata}`. Both forms are read back as they were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildLog {
  Structured {
    data: String,
    #[serde(default)]
    metadata: Map<String, Value>,
  },
  Raw(String),
}

impl BuildLog {
  /// Create a structured log tagged with its build id.
  pub fn for_build(build_id: &str, data: impl Into<String>) -> Self {
    let mut metadata = Map::new();
    metadata.insert("build_id".to_string(), Value::String(build_id.to_string()));
    BuildLog::Structured {
      data: data.into(),
      metadata,
    }
  }

  /// The log text.
  pub fn data(&self) -> &str {
    match self {
      BuildLog::Structured { data, .. } => data,
      BuildLog::Raw(data) => data,
    }
  }

  pub fn metadata(&self) -> Option<&Map<String, Value>> {
    match self {
      BuildLog::Structured { metadata, .. } => Some(metadata),
      BuildLog::Raw(_) => None,
    }
  }

  /// Fill in `metadata.build_id` unless the caller already set one.
  ///
  /// Raw logs carry no metadata and are returned unchanged.
  pub fn with_default_build_id(mut self, build_id: &str) -> Self {
    if let BuildLog::Structured { metadata, .. } = &mut self {
      metadata
        .entry("build_id")
        .or_insert_with(|| Value::String(build_id.to_string()));
    }
    self
  }
}

/// The canonical, normalized representation of one build.
///
/// Serializes to the storage document layout; `build_log` is split out again
/// on retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
  pub build_id: String,
  pub build_status: String,
  #[serde(default)]
  pub build_url: Option<String>,
  #[serde(default)]
  pub build_log_url: Option<String>,
  #[serde(default)]
  pub ocp_info: Option<OcpInfo>,
  #[serde(default)]
  pub first_timestamp: Option<DateTime<Utc>>,
  #[serde(default)]
  pub last_timestamp: Option<DateTime<Utc>>,
  #[serde(default = "default_log_level")]
  pub log_level: u32,
  #[serde(default)]
  pub build_log: Option<BuildLog>,
}

fn default_log_level() -> u32 {
  DEFAULT_OC_LOG_LEVEL
}

impl BuildRecord {
  pub fn new(build_id: impl Into<String>, build_status: impl Into<String>, log_level: u32) -> Self {
    Self {
      build_id: build_id.into(),
      build_status: build_status.into(),
      build_url: None,
      build_log_url: None,
      ocp_info: None,
      first_timestamp: None,
      last_timestamp: None,
      log_level,
      build_log: None,
    }
  }

  /// Whether the build reached a terminal status.
  pub fn is_complete(&self) -> bool {
    build_complete(&self.build_status)
  }

  pub fn state(&self) -> BuildState {
    BuildState::from_status(&self.build_status)
  }

  /// Namespace of the originating platform object, if known.
  pub fn namespace(&self) -> Option<&str> {
    self.ocp_info.as_ref().map(|ocp| ocp.namespace.as_str())
  }
}
