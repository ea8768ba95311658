//! Event normalization.
//!
//! Build information reaches the aggregator in three shapes: raw platform
//! events from the event watch, build resource snapshots, and documents that
//! already follow the canonical layout. [`Normalizer`] turns any of them into
//! a [`BuildRecord`], reporting missing or malformed fields as
//! [`ValidationErrors`] next to the (possibly partial) record instead of
//! failing.

mod types;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::build::{BuildRecord, BuildState, OcpInfo, ValidationErrors, schema};
use crate::hook::Schema;

pub use types::{EventMetadata, ObjectReference, PlatformEvent, ResourceMetadata, ResourceSnapshot, ResourceStatus};

/// Timestamp format used by build resources.
pub const RESOURCE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One build notification in any of the accepted source shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
  Platform(PlatformEvent),
  Resource(ResourceSnapshot),
  Document(Value),
}

impl BuildEvent {
  /// Interpret a request body according to its declared schema.
  ///
  /// Fails only when the body cannot be read as the declared shape at all;
  /// missing fields are reported later, by normalization.
  pub fn parse(schema: Schema, body: Value) -> Result<Self, ValidationErrors> {
    if !body.is_object() {
      return Err(ValidationErrors::single("_schema", "expected a JSON object"));
    }
    match schema {
      Schema::Default => Ok(BuildEvent::Document(body)),
      Schema::Event => serde_json::from_value(body)
        .map(BuildEvent::Platform)
        .map_err(|e| ValidationErrors::single("_schema", format!("not a platform event: {e}"))),
      Schema::Resource => serde_json::from_value(body)
        .map(BuildEvent::Resource)
        .map_err(|e| ValidationErrors::single("_schema", format!("not a build resource: {e}"))),
    }
  }

  pub fn schema(&self) -> Schema {
    match self {
      BuildEvent::Platform(_) => Schema::Event,
      BuildEvent::Resource(_) => Schema::Resource,
      BuildEvent::Document(_) => Schema::Default,
    }
  }
}

/// Result of a normalization: the record and everything wrong with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
  pub record: BuildRecord,
  pub errors: ValidationErrors,
}

impl Normalized {
  pub fn is_valid(&self) -> bool {
    self.errors.is_empty()
  }
}

/// Converts build events into canonical records.
#[derive(Debug, Clone)]
pub struct Normalizer {
  log_level: u32,
  cluster_host: Option<Url>,
}

impl Normalizer {
  pub fn new(log_level: u32) -> Self {
    Self {
      log_level,
      cluster_host: None,
    }
  }

  /// Resolve `self_link` paths against this host to fill in `build_url`.
  pub fn with_cluster_host(mut self, host: Url) -> Self {
    self.cluster_host = Some(host);
    self
  }

  pub fn log_level(&self) -> u32 {
    self.log_level
  }

  /// Normalize any event, optionally forcing the build id.
  pub fn normalize(&self, event: &BuildEvent, build_id: Option<&str>) -> Normalized {
    let normalized = match event {
      BuildEvent::Platform(event) => self.from_platform_event(event, build_id),
      BuildEvent::Resource(resource) => self.from_resource(resource, build_id),
      BuildEvent::Document(doc) => self.from_document(doc, build_id),
    };
    debug!(
      schema = event.schema().as_str(),
      build_id = %normalized.record.build_id,
      status = %normalized.record.build_status,
      errors = normalized.errors.len(),
      "normalized build event"
    );
    normalized
  }

  pub fn from_platform_event(&self, event: &PlatformEvent, build_id: Option<&str>) -> Normalized {
    let mut errors = ValidationErrors::new();

    if event.involved_object.is_none() {
      errors.missing("involved_object");
    } else {
      for (field, value) in [
        ("kind", event.kind()),
        ("name", event.name()),
        ("namespace", event.namespace()),
      ] {
        if value.is_none() {
          errors.missing(format!("involved_object.{field}"));
        }
      }
    }

    let status = match event.reason.as_deref() {
      Some(reason) => reason.to_string(),
      None => {
        errors.missing("reason");
        BuildState::Unknown.as_str().to_string()
      }
    };

    let mut record = BuildRecord::new(pick_build_id(build_id, event.name()), status, self.log_level);
    record.ocp_info = ocp_info(event.kind(), event.name(), event.namespace(), event.self_link());
    record.first_timestamp = parse_event_time(event.first_timestamp.as_deref(), "first_timestamp", &mut errors);
    record.last_timestamp = parse_event_time(event.last_timestamp.as_deref(), "last_timestamp", &mut errors);
    record.build_url = self.build_url(event.self_link());

    Normalized { record, errors }
  }

  pub fn from_resource(&self, resource: &ResourceSnapshot, build_id: Option<&str>) -> Normalized {
    let mut errors = ValidationErrors::new();

    let metadata = resource.metadata.clone().unwrap_or_default();
    let status = resource.status.clone().unwrap_or_default();

    if resource.kind.is_none() {
      errors.missing("kind");
    }
    if metadata.name.is_none() {
      errors.missing("metadata.name");
    }
    if metadata.namespace.is_none() {
      errors.missing("metadata.namespace");
    }

    let phase = match status.phase {
      Some(ref phase) => phase.clone(),
      None => {
        errors.missing("status.phase");
        BuildState::Unknown.as_str().to_string()
      }
    };

    let mut record = BuildRecord::new(pick_build_id(build_id, metadata.name.as_deref()), phase, self.log_level);
    record.ocp_info = ocp_info(
      resource.kind.as_deref(),
      metadata.name.as_deref(),
      metadata.namespace.as_deref(),
      metadata.self_link.as_deref(),
    );
    record.build_url = self.build_url(metadata.self_link.as_deref());

    if let (Some(start), Some(end)) = (&status.start_timestamp, &status.completion_timestamp) {
      match (parse_resource_time(start), parse_resource_time(end)) {
        (Ok(first), Ok(last)) => {
          record.first_timestamp = Some(first);
          record.last_timestamp = Some(last);
        }
        (first, last) => {
          if first.is_err() {
            errors.insert("status.startTimestamp", format!("expected format {RESOURCE_TIME_FORMAT}"));
          }
          if last.is_err() {
            errors.insert("status.completionTimestamp", format!("expected format {RESOURCE_TIME_FORMAT}"));
          }
        }
      }
    }

    Normalized { record, errors }
  }

  pub fn from_document(&self, doc: &Value, build_id: Option<&str>) -> Normalized {
    let (mut record, mut errors) = schema::decode(doc, self.log_level);
    if let Some(id) = build_id {
      record.build_id = id.to_string();
      // a forced id makes a missing one in the body irrelevant
      errors.remove("build_id");
    }
    Normalized { record, errors }
  }

  fn build_url(&self, self_link: Option<&str>) -> Option<String> {
    let host = self.cluster_host.as_ref()?;
    host.join(self_link?).ok().map(String::from)
  }
}

fn pick_build_id(forced: Option<&str>, name: Option<&str>) -> String {
  forced.or(name).unwrap_or_default().to_string()
}

fn ocp_info(kind: Option<&str>, name: Option<&str>, namespace: Option<&str>, self_link: Option<&str>) -> Option<OcpInfo> {
  Some(OcpInfo {
    kind: kind?.to_string(),
    name: name?.to_string(),
    namespace: namespace?.to_string(),
    self_link: self_link.map(str::to_string),
  })
}

fn parse_event_time(value: Option<&str>, field: &str, errors: &mut ValidationErrors) -> Option<DateTime<Utc>> {
  match value?.parse::<DateTime<Utc>>() {
    Ok(time) => Some(time),
    Err(_) => {
      errors.insert(field, "not a valid RFC 3339 timestamp");
      None
    }
  }
}

fn parse_resource_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
  NaiveDateTime::parse_from_str(value, RESOURCE_TIME_FORMAT).map(|t| t.and_utc())
}
