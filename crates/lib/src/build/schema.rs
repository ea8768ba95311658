//! Validation of canonical build documents.
//!
//! Validation never aborts: it reports the offending fields and the caller
//! decides whether the partially valid record is still worth keeping.
//! [`decode`] always produces a record, filling what it cannot read with
//! defaults, so that back-filled or half-written documents stay usable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::build::lifecycle::BuildState;
use crate::build::types::{BuildLog, BuildRecord, OcpInfo};

/// Field path to problem description, e.g. `ocp_info.namespace` → `missing required field`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
  pub fn new() -> Self {
    Self::default()
  }

  /// Errors consisting of a single entry.
  pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.insert(field, message);
    errors
  }

  /// Record a problem; the first message reported for a field is kept.
  pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.0.entry(field.into()).or_insert_with(|| message.into());
  }

  pub fn missing(&mut self, field: impl Into<String>) {
    self.insert(field, "missing required field");
  }

  pub fn remove(&mut self, field: &str) -> Option<String> {
    self.0.remove(field)
  }

  pub fn extend(&mut self, other: ValidationErrors) {
    for (field, message) in other.0 {
      self.insert(field, message);
    }
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn contains(&self, field: &str) -> bool {
    self.0.contains_key(field)
  }

  /// The offending field names, sorted.
  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl std::fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut first = true;
    for (field, message) in &self.0 {
      if !first {
        f.write_str("; ")?;
      }
      write!(f, "{field}: {message}")?;
      first = false;
    }
    Ok(())
  }
}

/// Validate a document against the canonical build record layout.
pub fn validate(doc: &Value) -> ValidationErrors {
  let mut errors = ValidationErrors::new();

  let Some(obj) = doc.as_object() else {
    errors.insert("_schema", "expected a JSON object");
    return errors;
  };

  match obj.get("build_id") {
    None | Some(Value::Null) => errors.missing("build_id"),
    Some(Value::String(id)) if id.is_empty() => errors.insert("build_id", "must not be empty"),
    Some(Value::String(_)) => {}
    Some(_) => errors.insert("build_id", "expected a string"),
  }

  match obj.get("build_status") {
    None | Some(Value::Null) => errors.missing("build_status"),
    Some(Value::String(_)) => {}
    Some(_) => errors.insert("build_status", "expected a string"),
  }

  for field in ["build_url", "build_log_url"] {
    match obj.get(field) {
      None | Some(Value::Null) => {}
      Some(Value::String(url)) if Url::parse(url).is_err() => errors.insert(field, "not a valid URL"),
      Some(Value::String(_)) => {}
      Some(_) => errors.insert(field, "expected a string"),
    }
  }

  match obj.get("ocp_info") {
    None | Some(Value::Null) => {}
    Some(Value::Object(ocp)) => validate_ocp_info(ocp, &mut errors),
    Some(_) => errors.insert("ocp_info", "expected an object"),
  }

  for field in ["first_timestamp", "last_timestamp"] {
    match obj.get(field) {
      None | Some(Value::Null) => {}
      Some(Value::String(ts)) if ts.parse::<DateTime<Utc>>().is_err() => {
        errors.insert(field, "not a valid RFC 3339 timestamp")
      }
      Some(Value::String(_)) => {}
      Some(_) => errors.insert(field, "expected a string"),
    }
  }

  match obj.get("log_level") {
    None | Some(Value::Null) => {}
    Some(level) if level.as_u64().is_some_and(|l| u32::try_from(l).is_ok()) => {}
    Some(_) => errors.insert("log_level", "expected a non-negative integer"),
  }

  match obj.get("build_log") {
    None | Some(Value::Null) | Some(Value::String(_)) => {}
    Some(Value::Object(log)) => match log.get("data") {
      Some(Value::String(_)) => {}
      None | Some(Value::Null) => errors.missing("build_log.data"),
      Some(_) => errors.insert("build_log.data", "expected a string"),
    },
    Some(_) => errors.insert("build_log", "expected a string or an object"),
  }

  errors
}

fn validate_ocp_info(ocp: &Map<String, Value>, errors: &mut ValidationErrors) {
  for field in ["kind", "name", "namespace"] {
    match ocp.get(field) {
      None | Some(Value::Null) => errors.missing(format!("ocp_info.{field}")),
      Some(Value::String(_)) => {}
      Some(_) => errors.insert(format!("ocp_info.{field}"), "expected a string"),
    }
  }
  match ocp.get("self_link") {
    None | Some(Value::Null) | Some(Value::String(_)) => {}
    Some(_) => errors.insert("ocp_info.self_link", "expected a string"),
  }
}

/// Decode a document into a record, best effort.
///
/// Fields that fail validation fall back to their defaults (`build_status`
/// to `UNKNOWN`, `log_level` to `default_log_level`, everything optional to
/// absent); the returned errors say which ones.
pub fn decode(doc: &Value, default_log_level: u32) -> (BuildRecord, ValidationErrors) {
  let errors = validate(doc);
  let empty = Map::new();
  let obj = doc.as_object().unwrap_or(&empty);

  let string = |field: &str| obj.get(field).and_then(Value::as_str).map(str::to_string);
  let timestamp = |field: &str| {
    obj
      .get(field)
      .and_then(Value::as_str)
      .and_then(|ts| ts.parse::<DateTime<Utc>>().ok())
  };
  let url = |field: &str| string(field).filter(|u| Url::parse(u).is_ok());

  let record = BuildRecord {
    build_id: string("build_id").unwrap_or_default(),
    build_status: string("build_status").unwrap_or_else(|| BuildState::Unknown.as_str().to_string()),
    build_url: url("build_url"),
    build_log_url: url("build_log_url"),
    ocp_info: obj
      .get("ocp_info")
      .and_then(|ocp| serde_json::from_value::<OcpInfo>(ocp.clone()).ok()),
    first_timestamp: timestamp("first_timestamp"),
    last_timestamp: timestamp("last_timestamp"),
    log_level: obj
      .get("log_level")
      .and_then(Value::as_u64)
      .and_then(|l| u32::try_from(l).ok())
      .unwrap_or(default_log_level),
    build_log: obj
      .get("build_log")
      .and_then(|log| serde_json::from_value::<Option<BuildLog>>(log.clone()).ok())
      .flatten(),
  };

  (record, errors)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn valid_doc() -> Value {
    json!({
      "build_id": "app-1",
      "build_status": "BuildCompleted",
      "build_url": "https://cluster.example.com/apis/build.openshift.io/v1/namespaces/ns/builds/app-1",
      "build_log_url": null,
      "ocp_info": {"kind": "Build", "name": "app-1", "namespace": "ns", "self_link": null},
      "first_timestamp": "2019-03-01T10:00:00Z",
      "last_timestamp": "2019-03-01T10:05:00+00:00",
      "log_level": 4,
      "build_log": null,
    })
  }

  #[test]
  fn valid_document_has_no_errors() {
    assert!(validate(&valid_doc()).is_empty());
  }

  #[test]
  fn missing_required_fields_are_enumerated() {
    let errors = validate(&json!({"ocp_info": {"kind": "Build"}}));
    let fields: Vec<_> = errors.fields().collect();
    assert_eq!(
      fields,
      vec!["build_id", "build_status", "ocp_info.name", "ocp_info.namespace"]
    );
  }

  #[test]
  fn non_object_document() {
    let errors = validate(&json!([1, 2, 3]));
    assert!(errors.contains("_schema"));
  }

  #[test]
  fn bad_field_types() {
    let errors = validate(&json!({
      "build_id": "",
      "build_status": 3,
      "build_url": "not a url",
      "first_timestamp": "yesterday",
      "log_level": -1,
      "build_log": {"metadata": {}},
    }));
    for field in [
      "build_id",
      "build_status",
      "build_url",
      "first_timestamp",
      "log_level",
      "build_log.data",
    ] {
      assert!(errors.contains(field), "expected error for {field}: {errors}");
    }
  }

  #[test]
  fn decode_valid_document() {
    let (record, errors) = decode(&valid_doc(), 6);
    assert!(errors.is_empty());
    assert_eq!(record.build_id, "app-1");
    assert_eq!(record.log_level, 4);
    assert_eq!(record.ocp_info.unwrap().namespace, "ns");
    assert!(record.first_timestamp.is_some());
    assert!(record.last_timestamp.is_some());
  }

  #[test]
  fn decode_partial_document_keeps_what_it_can() {
    let (record, errors) = decode(
      &json!({"build_id": "legacy", "build_url": "nope", "build_log": "old text"}),
      9,
    );
    assert_eq!(record.build_id, "legacy");
    assert_eq!(record.build_status, "UNKNOWN");
    assert_eq!(record.build_url, None);
    assert_eq!(record.log_level, 9);
    assert_eq!(record.build_log, Some(BuildLog::Raw("old text".to_string())));
    assert!(errors.contains("build_status"));
    assert!(errors.contains("build_url"));
  }

  #[test]
  fn display_lists_fields() {
    let mut errors = ValidationErrors::new();
    errors.missing("b");
    errors.insert("a", "bad");
    assert_eq!(errors.to_string(), "a: bad; b: missing required field");
  }
}
