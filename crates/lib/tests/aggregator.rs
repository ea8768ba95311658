//! End-to-end flows over the filesystem store.

use std::collections::BTreeSet;
use std::time::Duration;

use mockito::Matcher;
use osiris_lib::build::BuildRecord;
use osiris_lib::cluster::{LogError, LogSource};
use osiris_lib::delivery::watch::{WatchOptions, forward_events};
use osiris_lib::delivery::{DeliveryClient, RetryPolicy};
use osiris_lib::hook::{LogMode, Schema};
use osiris_lib::normalize::Normalizer;
use osiris_lib::service::BuildService;
use osiris_lib::store::{BuildStore, FsObjectStore};
use serde_json::{Value, json};
use tempfile::TempDir;

struct StaticLogs;

impl LogSource for StaticLogs {
  async fn fetch_log(&self, build_id: &str, _namespace: Option<&str>, log_level: u32) -> Result<String, LogError> {
    Ok(format!("{build_id} at level {log_level}\nPush successful\n"))
  }
}

fn service(temp: &TempDir) -> BuildService<FsObjectStore, StaticLogs> {
  let store = BuildStore::new(FsObjectStore::new(temp.path()), "thoth-test-core/build_aggregator");
  BuildService::new(store, Normalizer::new(6), StaticLogs)
}

fn build_event(name: &str, reason: &str) -> Value {
  json!({
    "involvedObject": {"kind": "Build", "name": name, "namespace": "thoth-test-core"},
    "reason": reason,
    "message": format!("Build thoth-test-core/{name} changed"),
    "metadata": {"name": format!("{name}.15f0"), "namespace": "thoth-test-core"},
    "firstTimestamp": "2019-03-01T10:00:00Z",
    "lastTimestamp": "2019-03-01T10:05:00Z",
  })
}

#[tokio::test]
async fn build_lifecycle_is_one_record() {
  let temp = TempDir::new().unwrap();
  let service = service(&temp);

  service
    .on_build_started("app-1", Schema::Event, build_event("app-1", "BuildStarted"))
    .unwrap();
  assert_eq!(service.build_status("app-1").unwrap(), "BuildStarted");

  service
    .on_build_completed(
      "app-1",
      Schema::Event,
      LogMode::Cluster,
      Some(4),
      build_event("app-1", "BuildCompleted"),
    )
    .await
    .unwrap();

  let (log, record) = service.retrieve("app-1").unwrap();
  assert!(record.is_complete());
  assert_eq!(record.log_level, 4);
  assert_eq!(log.unwrap().data(), "app-1 at level 4\nPush successful\n");
  assert_eq!(service.count().unwrap(), 1);
}

#[tokio::test]
async fn completion_of_unseen_build_creates_it() {
  let temp = TempDir::new().unwrap();
  let service = service(&temp);

  assert!(service.retrieve("nonexistent-id").is_err());
  service
    .on_build_completed(
      "nonexistent-id",
      Schema::Event,
      LogMode::Remote,
      None,
      build_event("nonexistent-id", "BuildFailed"),
    )
    .await
    .unwrap();

  assert_eq!(service.build_status("nonexistent-id").unwrap(), "BuildFailed");
  assert!(service.build_log("nonexistent-id").unwrap().is_none());
}

#[test]
fn pages_cover_every_build_once() {
  let temp = TempDir::new().unwrap();
  let service = service(&temp);
  for i in 0..45 {
    service
      .store_record(&BuildRecord::new(format!("build-{i}"), "BuildCompleted", 6))
      .unwrap();
  }

  let mut seen = BTreeSet::new();
  let mut page = service.list(1, None).unwrap();
  assert_eq!(page.total, 45);
  assert!(!page.has_prev);
  loop {
    for record in &page.build_info {
      assert!(record.build_log.is_none());
      assert!(seen.insert(record.build_id.clone()), "{} listed twice", record.build_id);
    }
    if !page.has_next {
      break;
    }
    let cursor = page.next_cursor.clone().unwrap();
    page = service.list(page.page + 1, Some(&cursor)).unwrap();
    assert!(page.has_prev);
  }

  assert_eq!(seen.len(), 45);
  assert_eq!(page.page, 3);
}

#[test]
fn purge_empties_the_prefix() {
  let temp = TempDir::new().unwrap();
  let service = service(&temp);
  for i in 0..3 {
    service
      .store_record(&BuildRecord::new(format!("build-{i}"), "BuildStarted", 6))
      .unwrap();
  }

  assert_eq!(service.purge().unwrap(), 3);
  assert_eq!(service.count().unwrap(), 0);
  assert!(service.readiness().is_ok());
}

#[tokio::test]
async fn watched_events_are_routed_to_hooks() {
  let mut server = mockito::Server::new_async().await;
  let started = server
    .mock("PUT", "/build/started/app-1")
    .match_query(Matcher::UrlEncoded("schema".into(), "event".into()))
    .with_status(202)
    .expect(1)
    .create_async()
    .await;
  let completed = server
    .mock("PUT", "/build/completed/app-1")
    .match_query(Matcher::AllOf(vec![
      Matcher::UrlEncoded("schema".into(), "event".into()),
      Matcher::UrlEncoded("mode".into(), "cluster".into()),
    ]))
    .with_status(202)
    .expect(1)
    .create_async()
    .await;

  let policy = RetryPolicy {
    connect_retries: 0,
    status_retries: 0,
    ..RetryPolicy::default()
  };
  let client = DeliveryClient::new(&server.url(), policy, Duration::from_secs(5)).unwrap();

  let stream = [
    json!({"type": "ADDED", "object": build_event("app-1", "BuildStarted")}),
    build_event("app-1", "BuildPending"),
    build_event("app-1", "BuildCompleted"),
  ]
  .iter()
  .map(Value::to_string)
  .collect::<Vec<_>>()
  .join("\n");

  let options = WatchOptions {
    mode: Some(LogMode::Cluster),
    log_level: None,
  };
  let stats = forward_events(stream.as_bytes(), &client, options).await.unwrap();

  assert_eq!(stats.read, 3);
  assert_eq!(stats.delivered, 2);
  assert_eq!(stats.skipped, 1);
  assert_eq!(stats.failed, 0);
  started.assert_async().await;
  completed.assert_async().await;
}
