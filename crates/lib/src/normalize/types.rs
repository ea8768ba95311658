//! Source shapes accepted by the normalizer.
//!
//! Every field is optional so that a malformed payload still deserializes and
//! the normalizer can report exactly which fields were missing. Platform
//! events are accepted both with snake_case keys and with the camelCase keys
//! the Kubernetes API emits.

use serde::{Deserialize, Serialize};

/// The object a platform event refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectReference {
  pub kind: Option<String>,
  pub name: Option<String>,
  pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMetadata {
  pub name: Option<String>,
  pub namespace: Option<String>,
  #[serde(alias = "selfLink")]
  pub self_link: Option<String>,
}

/// A raw platform event as streamed by the cluster's event watch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformEvent {
  #[serde(alias = "involvedObject")]
  pub involved_object: Option<ObjectReference>,
  pub reason: Option<String>,
  pub message: Option<String>,
  pub metadata: Option<EventMetadata>,
  /// RFC 3339; parsed during normalization.
  #[serde(alias = "firstTimestamp")]
  pub first_timestamp: Option<String>,
  #[serde(alias = "lastTimestamp")]
  pub last_timestamp: Option<String>,
}

impl PlatformEvent {
  pub fn kind(&self) -> Option<&str> {
    self.involved_object.as_ref()?.kind.as_deref()
  }

  pub fn name(&self) -> Option<&str> {
    self.involved_object.as_ref()?.name.as_deref()
  }

  pub fn namespace(&self) -> Option<&str> {
    self.involved_object.as_ref()?.namespace.as_deref()
  }

  pub fn self_link(&self) -> Option<&str> {
    self.metadata.as_ref()?.self_link.as_deref()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceMetadata {
  pub name: Option<String>,
  pub namespace: Option<String>,
  #[serde(rename = "selfLink", alias = "self_link")]
  pub self_link: Option<String>,
}

/// Build phase and timing as reported by the build resource.
///
/// Timestamps stay strings here; they are parsed with a fixed format during
/// normalization and pending builds do not have them yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceStatus {
  pub phase: Option<String>,
  #[serde(rename = "startTimestamp", alias = "start_timestamp")]
  pub start_timestamp: Option<String>,
  #[serde(rename = "completionTimestamp", alias = "completion_timestamp")]
  pub completion_timestamp: Option<String>,
}

/// A snapshot of a build resource as returned by the cluster API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSnapshot {
  pub kind: Option<String>,
  pub metadata: Option<ResourceMetadata>,
  pub status: Option<ResourceStatus>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn platform_event_accepts_camel_case() {
    let event: PlatformEvent = serde_json::from_value(json!({
      "involvedObject": {"kind": "Build", "name": "app-1", "namespace": "ns"},
      "reason": "BuildStarted",
      "metadata": {"selfLink": "/api/v1/namespaces/ns/events/app-1.1"},
      "firstTimestamp": "2019-03-01T10:00:00Z",
    }))
    .unwrap();

    assert_eq!(event.kind(), Some("Build"));
    assert_eq!(event.name(), Some("app-1"));
    assert_eq!(event.self_link(), Some("/api/v1/namespaces/ns/events/app-1.1"));
    assert_eq!(event.first_timestamp.as_deref(), Some("2019-03-01T10:00:00Z"));
    assert!(event.last_timestamp.is_none());
  }

  #[test]
  fn empty_payloads_deserialize() {
    let event: PlatformEvent = serde_json::from_value(json!({})).unwrap();
    assert_eq!(event, PlatformEvent::default());
    let resource: ResourceSnapshot = serde_json::from_value(json!({})).unwrap();
    assert_eq!(resource, ResourceSnapshot::default());
  }

  #[test]
  fn resource_round_trips_camel_case_keys() {
    let resource = ResourceSnapshot {
      kind: Some("Build".into()),
      metadata: Some(ResourceMetadata {
        name: Some("app-1".into()),
        namespace: Some("ns".into()),
        self_link: Some("/link".into()),
      }),
      status: Some(ResourceStatus {
        phase: Some("Complete".into()),
        start_timestamp: Some("2019-03-01T10:00:00Z".into()),
        completion_timestamp: None,
      }),
    };
    let doc = serde_json::to_value(&resource).unwrap();
    assert_eq!(doc["metadata"]["selfLink"], json!("/link"));
    assert_eq!(doc["status"]["startTimestamp"], json!("2019-03-01T10:00:00Z"));
  }
}
