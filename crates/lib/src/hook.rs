//! Parameters of the ingestion hooks.
//!
//! The watcher calls `PUT /build/started/{id}?schema=...` and
//! `PUT /build/completed/{id}?schema=...&mode=...&log_level=...`; these types
//! describe such a call on both ends of the wire.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which ingestion hook to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hook {
  Started,
  Completed,
}

impl Hook {
  pub fn as_str(self) -> &'static str {
    match self {
      Hook::Started => "started",
      Hook::Completed => "completed",
    }
  }
}

/// Shape of a hook request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
  /// Already a canonical build document.
  #[default]
  Default,
  /// A raw platform event.
  Event,
  /// A build resource snapshot.
  Resource,
}

impl Schema {
  pub fn as_str(self) -> &'static str {
    match self {
      Schema::Default => "default",
      Schema::Event => "event",
      Schema::Resource => "resource",
    }
  }
}

impl FromStr for Schema {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "default" => Ok(Schema::Default),
      "event" => Ok(Schema::Event),
      "resource" => Ok(Schema::Resource),
      other => Err(format!("unknown schema '{other}' (expected default, event or resource)")),
    }
  }
}

/// Where the completion hook gets the build log from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
  /// Logs are pushed later by the caller.
  #[default]
  Remote,
  /// Logs are pulled from the cluster on completion.
  Cluster,
}

impl LogMode {
  pub fn as_str(self) -> &'static str {
    match self {
      LogMode::Remote => "remote",
      LogMode::Cluster => "cluster",
    }
  }
}

impl FromStr for LogMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "remote" => Ok(LogMode::Remote),
      "cluster" => Ok(LogMode::Cluster),
      other => Err(format!("unknown mode '{other}' (expected remote or cluster)")),
    }
  }
}

/// One call to an ingestion hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRequest {
  pub hook: Hook,
  pub build_id: String,
  pub schema: Schema,
  pub mode: Option<LogMode>,
  pub log_level: Option<u32>,
  pub body: Value,
}

impl HookRequest {
  pub fn started(build_id: impl Into<String>, schema: Schema, body: Value) -> Self {
    Self {
      hook: Hook::Started,
      build_id: build_id.into(),
      schema,
      mode: None,
      log_level: None,
      body,
    }
  }

  pub fn completed(build_id: impl Into<String>, schema: Schema, body: Value) -> Self {
    Self {
      hook: Hook::Completed,
      build_id: build_id.into(),
      schema,
      mode: None,
      log_level: None,
      body,
    }
  }

  /// Query parameters in the order the endpoint documents them.
  pub fn query(&self) -> Vec<(&'static str, String)> {
    let mut query = vec![("schema", self.schema.as_str().to_string())];
    if self.hook == Hook::Completed {
      if let Some(mode) = self.mode {
        query.push(("mode", mode.as_str().to_string()));
      }
      if let Some(level) = self.log_level {
        query.push(("log_level", level.to_string()));
      }
    }
    query
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn parse_schema() {
    assert_eq!("EVENT".parse::<Schema>(), Ok(Schema::Event));
    assert_eq!("resource".parse::<Schema>(), Ok(Schema::Resource));
    assert!("yaml".parse::<Schema>().is_err());
  }

  #[test]
  fn parse_mode() {
    assert_eq!("cluster".parse::<LogMode>(), Ok(LogMode::Cluster));
    assert!("local".parse::<LogMode>().is_err());
  }

  #[test]
  fn started_query_has_schema_only() {
    let mut request = HookRequest::started("b", Schema::Event, json!({}));
    request.mode = Some(LogMode::Cluster);
    assert_eq!(request.query(), vec![("schema", "event".to_string())]);
  }

  #[test]
  fn completed_query_carries_mode_and_level() {
    let mut request = HookRequest::completed("b", Schema::Resource, json!({}));
    request.mode = Some(LogMode::Cluster);
    request.log_level = Some(4);
    assert_eq!(
      request.query(),
      vec![
        ("schema", "resource".to_string()),
        ("mode", "cluster".to_string()),
        ("log_level", "4".to_string()),
      ]
    );
  }
}
