//! Forwarding of watched platform events to the ingestion hooks.
//!
//! Input is a stream of JSON lines as produced by `oc get events --watch -o json`
//! or the raw watch API (`{"type": "ADDED", "object": {...}}`). Only build
//! lifecycle events are forwarded; everything else is skipped.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use super::{DeliveryClient, DeliveryOutcome};
use crate::build::build_complete;
use crate::hook::{HookRequest, LogMode, Schema};
use crate::normalize::PlatformEvent;

/// Event reasons that describe a build lifecycle transition.
pub const FORWARDED_REASONS: [&str; 3] = ["BuildStarted", "BuildCompleted", "BuildFailed"];

/// Extra parameters for completion notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
  pub mode: Option<LogMode>,
  pub log_level: Option<u32>,
}

/// Counters of one forwarding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForwardStats {
  pub read: usize,
  pub invalid: usize,
  pub skipped: usize,
  pub delivered: usize,
  pub failed: usize,
}

/// Strip a watch API envelope, if present.
pub fn unwrap_watch_event(value: Value) -> Value {
  match value {
    Value::Object(mut map) if map.contains_key("type") && map.get("object").is_some_and(Value::is_object) => {
      map.remove("object").unwrap_or(Value::Null)
    }
    other => other,
  }
}

/// The hook request for a platform event, or `None` if it is not forwarded.
///
/// Completed and failed builds go to the completion hook, everything else to
/// the start hook. The event is forwarded as received.
pub fn notification_for(body: Value, options: WatchOptions) -> Option<HookRequest> {
  let event: PlatformEvent = serde_json::from_value(body.clone()).ok()?;
  if event.kind() != Some("Build") {
    return None;
  }
  let reason = event.reason.as_deref().filter(|r| FORWARDED_REASONS.contains(r))?;
  let build_id = event.name()?;

  if build_complete(reason) {
    let mut request = HookRequest::completed(build_id, Schema::Event, body);
    request.mode = options.mode;
    request.log_level = options.log_level;
    Some(request)
  } else {
    Some(HookRequest::started(build_id, Schema::Event, body))
  }
}

/// Forward every build event read from `reader`, one at a time.
pub async fn forward_events<R>(reader: R, client: &DeliveryClient, options: WatchOptions) -> std::io::Result<ForwardStats>
where
  R: AsyncBufRead + Unpin,
{
  let mut stats = ForwardStats::default();
  let mut lines = reader.lines();

  while let Some(line) = lines.next_line().await? {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    stats.read += 1;

    let value: Value = match serde_json::from_str(line) {
      Ok(value) => value,
      Err(err) => {
        warn!(line = stats.read, error = %err, "ignoring line that is not JSON");
        stats.invalid += 1;
        continue;
      }
    };

    let Some(request) = notification_for(unwrap_watch_event(value), options) else {
      debug!(line = stats.read, "skipping event that is not a build transition");
      stats.skipped += 1;
      continue;
    };

    match client.send(&request).await {
      DeliveryOutcome::Delivered { .. } => stats.delivered += 1,
      DeliveryOutcome::Failed { .. } => stats.failed += 1,
    }
  }

  info!(
    read = stats.read,
    delivered = stats.delivered,
    failed = stats.failed,
    skipped = stats.skipped,
    invalid = stats.invalid,
    "finished forwarding events"
  );
  Ok(stats)
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::delivery::RetryPolicy;
  use crate::hook::Hook;
  use mockito::Matcher;
  use serde_json::json;

  fn event(kind: &str, reason: &str) -> Value {
    json!({
      "involvedObject": {"kind": kind, "name": "app-1", "namespace": "thoth"},
      "reason": reason,
    })
  }

  #[test]
  fn started_event_goes_to_start_hook() {
    let request = notification_for(event("Build", "BuildStarted"), WatchOptions::default()).unwrap();
    assert_eq!(request.hook, Hook::Started);
    assert_eq!(request.build_id, "app-1");
    assert_eq!(request.schema, Schema::Event);
    assert_eq!(request.body, event("Build", "BuildStarted"));
  }

  #[test]
  fn completed_and_failed_go_to_completion_hook() {
    let options = WatchOptions {
      mode: Some(LogMode::Cluster),
      log_level: Some(2),
    };
    for reason in ["BuildCompleted", "BuildFailed"] {
      let request = notification_for(event("Build", reason), options).unwrap();
      assert_eq!(request.hook, Hook::Completed);
      assert_eq!(request.mode, Some(LogMode::Cluster));
      assert_eq!(request.log_level, Some(2));
    }
  }

  #[test]
  fn malformed_timestamp_is_still_forwarded() {
    let mut body = event("Build", "BuildCompleted");
    body["firstTimestamp"] = json!("2019-03-01 10:00:00");
    let request = notification_for(body.clone(), WatchOptions::default()).unwrap();
    assert_eq!(request.hook, Hook::Completed);
    assert_eq!(request.build_id, "app-1");
    assert_eq!(request.body, body);
  }

  #[test]
  fn other_events_are_not_forwarded() {
    let options = WatchOptions::default();
    assert!(notification_for(event("Pod", "BuildStarted"), options).is_none());
    assert!(notification_for(event("Build", "BuildCancelled"), options).is_none());
    assert!(notification_for(json!({"reason": "BuildStarted"}), options).is_none());
    assert!(notification_for(json!([1, 2]), options).is_none());
  }

  #[test]
  fn watch_envelope_is_unwrapped() {
    let wrapped = json!({"type": "ADDED", "object": event("Build", "BuildStarted")});
    assert_eq!(unwrap_watch_event(wrapped), event("Build", "BuildStarted"));
    assert_eq!(unwrap_watch_event(json!({"type": "x"})), json!({"type": "x"}));
  }

  #[tokio::test]
  async fn forwards_build_events_from_json_lines() {
    let mut server = mockito::Server::new_async().await;
    let started = server
      .mock("PUT", "/build/started/app-1")
      .match_query(Matcher::Any)
      .with_status(202)
      .expect(1)
      .create_async()
      .await;
    let completed = server
      .mock("PUT", "/build/completed/app-1")
      .match_query(Matcher::Any)
      .with_status(202)
      .expect(1)
      .create_async()
      .await;

    let input = [
      event("Build", "BuildStarted").to_string(),
      String::new(),
      "not json".to_string(),
      event("Pod", "Scheduled").to_string(),
      json!({"type": "MODIFIED", "object": event("Build", "BuildCompleted")}).to_string(),
    ]
    .join("\n");

    let policy = RetryPolicy {
      backoff_factor: Duration::ZERO,
      ..RetryPolicy::default()
    };
    let client = DeliveryClient::new(&server.url(), policy, Duration::from_secs(5)).unwrap();
    let stats = forward_events(input.as_bytes(), &client, WatchOptions::default())
      .await
      .unwrap();

    assert_eq!(
      stats,
      ForwardStats {
        read: 4,
        invalid: 1,
        skipped: 1,
        delivered: 2,
        failed: 0,
      }
    );
    started.assert_async().await;
    completed.assert_async().await;
  }
}
