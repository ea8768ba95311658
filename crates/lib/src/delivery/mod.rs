//! Delivery of build notifications to the ingestion hooks.
//!
//! [`DeliveryClient`] PUTs one hook request at a time and retries it with
//! exponential backoff. Connection failures and retryable statuses have
//! separate budgets. The outcome of a delivery is reported back to the
//! caller and logged; nothing is queued for later.

pub mod watch;

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::ErrorKind;
use crate::hook::HookRequest;

#[derive(Debug, Error)]
pub enum DeliveryError {
  #[error("invalid ingestion URL '{url}': {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),
}

/// When and how often to retry a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Retries after connection failures or timeouts.
  pub connect_retries: u32,
  /// Retries after a response with one of `retry_statuses`.
  pub status_retries: u32,
  pub retry_statuses: BTreeSet<u16>,
  pub backoff_factor: Duration,
  pub max_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      connect_retries: 10,
      status_retries: 10,
      retry_statuses: [500, 502, 504].into_iter().collect(),
      backoff_factor: Duration::from_secs(5),
      max_backoff: Duration::from_secs(120),
    }
  }
}

impl RetryPolicy {
  /// Delay before retry `n` (1-based): `backoff_factor * 2^(n-1)`, capped at `max_backoff`.
  pub fn backoff(&self, retry: u32) -> Duration {
    if retry == 0 {
      return Duration::ZERO;
    }
    let multiplier = 2u32.saturating_pow(retry - 1);
    self.backoff_factor.saturating_mul(multiplier).min(self.max_backoff)
  }

  pub fn should_retry_status(&self, status: StatusCode) -> bool {
    self.retry_statuses.contains(&status.as_u16())
  }
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
  Delivered {
    retries: u32,
  },
  Failed {
    status: Option<u16>,
    reason: String,
    retries: u32,
  },
}

impl DeliveryOutcome {
  pub fn is_delivered(&self) -> bool {
    matches!(self, DeliveryOutcome::Delivered { .. })
  }

  /// How a failed delivery is classified; `None` when it succeeded.
  pub fn error_kind(&self) -> Option<ErrorKind> {
    match self {
      DeliveryOutcome::Delivered { .. } => None,
      DeliveryOutcome::Failed { status: None, .. } => Some(ErrorKind::TransientDelivery),
      DeliveryOutcome::Failed { status: Some(status), .. } => Some(match status {
        400 | 422 => ErrorKind::Validation,
        401 | 403 => ErrorKind::Authentication,
        404 => ErrorKind::NotFound,
        503 => ErrorKind::StorageUnavailable,
        s if *s >= 500 => ErrorKind::TransientDelivery,
        _ => ErrorKind::Unknown,
      }),
    }
  }

  pub fn retries(&self) -> u32 {
    match self {
      DeliveryOutcome::Delivered { retries } | DeliveryOutcome::Failed { retries, .. } => *retries,
    }
  }
}

/// HTTP client for the ingestion hooks.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
  client: Client,
  base_url: Url,
  policy: RetryPolicy,
}

impl DeliveryClient {
  pub fn new(base_url: &str, policy: RetryPolicy, timeout: Duration) -> Result<Self, DeliveryError> {
    let invalid = |reason: String| DeliveryError::InvalidUrl {
      url: base_url.to_string(),
      reason,
    };
    let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if parsed.cannot_be_a_base() {
      return Err(invalid("cannot be used as a base URL".to_string()));
    }
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      base_url: parsed,
      policy,
    })
  }

  pub fn policy(&self) -> &RetryPolicy {
    &self.policy
  }

  /// Full URL of a hook call: `<base>/build/<hook>/<build_id>?<query>`.
  pub fn endpoint(&self, request: &HookRequest) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments
        .pop_if_empty()
        .extend(["build", request.hook.as_str(), request.build_id.as_str()]);
    }
    url
      .query_pairs_mut()
      .extend_pairs(request.query().iter().map(|(k, v)| (*k, v.as_str())));
    url
  }

  /// Deliver one request, retrying per the policy. `202 Accepted` is success.
  pub async fn send(&self, request: &HookRequest) -> DeliveryOutcome {
    let url = self.endpoint(request);
    let mut connect_retries = 0;
    let mut status_retries = 0;

    loop {
      let retries = connect_retries + status_retries;
      let response = self.client.put(url.clone()).json(&request.body).send().await;

      let failure = match response {
        Ok(response) if response.status() == StatusCode::ACCEPTED => {
          info!(url = %url, build_id = %request.build_id, retries, "delivered build notification");
          return DeliveryOutcome::Delivered { retries };
        }
        Ok(response) if self.policy.should_retry_status(response.status()) && status_retries < self.policy.status_retries => {
          status_retries += 1;
          format!("HTTP {}", response.status())
        }
        Ok(response) => {
          let status = response.status();
          let body = response.text().await.unwrap_or_default();
          let reason = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unexpected status").to_string()
          } else {
            body.trim().to_string()
          };
          error!(url = %url, build_id = %request.build_id, status = status.as_u16(), reason = %reason, retries, "build notification rejected");
          return DeliveryOutcome::Failed {
            status: Some(status.as_u16()),
            reason,
            retries,
          };
        }
        Err(err) if (err.is_connect() || err.is_timeout()) && connect_retries < self.policy.connect_retries => {
          connect_retries += 1;
          err.to_string()
        }
        Err(err) => {
          error!(url = %url, build_id = %request.build_id, error = %err, retries, "build notification failed");
          return DeliveryOutcome::Failed {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
            retries,
          };
        }
      };

      let attempt = connect_retries + status_retries;
      let delay = self.policy.backoff(attempt);
      warn!(
        url = %url,
        build_id = %request.build_id,
        attempt,
        delay = %humantime::format_duration(delay),
        reason = %failure,
        "retrying build notification"
      );
      tokio::time::sleep(delay).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hook::{LogMode, Schema};
  use mockito::Matcher;
  use serde_json::json;

  fn fast_policy(retries: u32) -> RetryPolicy {
    RetryPolicy {
      connect_retries: retries,
      status_retries: retries,
      backoff_factor: Duration::ZERO,
      ..RetryPolicy::default()
    }
  }

  fn client(url: &str, policy: RetryPolicy) -> DeliveryClient {
    DeliveryClient::new(url, policy, Duration::from_secs(5)).unwrap()
  }

  #[test]
  fn backoff_doubles_and_caps() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff(1), Duration::from_secs(5));
    assert_eq!(policy.backoff(2), Duration::from_secs(10));
    assert_eq!(policy.backoff(3), Duration::from_secs(20));
    assert_eq!(policy.backoff(5), Duration::from_secs(80));
    assert_eq!(policy.backoff(6), Duration::from_secs(120));
    assert_eq!(policy.backoff(40), Duration::from_secs(120));
  }

  #[test]
  fn endpoint_layout() {
    let client = client("http://osiris.example.com:5000/api/", RetryPolicy::default());
    let mut request = HookRequest::completed("app 1", Schema::Event, json!({}));
    request.mode = Some(LogMode::Cluster);
    request.log_level = Some(3);
    assert_eq!(
      client.endpoint(&request).as_str(),
      "http://osiris.example.com:5000/api/build/completed/app%201?schema=event&mode=cluster&log_level=3"
    );
  }

  #[test]
  fn rejects_bad_base_url() {
    assert!(matches!(
      DeliveryClient::new("not a url", RetryPolicy::default(), Duration::from_secs(1)),
      Err(DeliveryError::InvalidUrl { .. })
    ));
  }

  #[tokio::test]
  async fn accepted_is_delivered_without_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("PUT", "/build/started/app-1")
      .match_query(Matcher::UrlEncoded("schema".into(), "event".into()))
      .match_body(Matcher::Json(json!({"reason": "BuildStarted"})))
      .with_status(202)
      .expect(1)
      .create_async()
      .await;

    let request = HookRequest::started("app-1", Schema::Event, json!({"reason": "BuildStarted"}));
    let outcome = client(&server.url(), fast_policy(10)).send(&request).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered { retries: 0 });
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn retries_wait_for_backoff() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("PUT", "/build/started/app-1")
      .match_query(Matcher::Any)
      .with_status(502)
      .expect(3)
      .create_async()
      .await;

    let policy = RetryPolicy {
      backoff_factor: Duration::from_millis(50),
      ..fast_policy(2)
    };
    let request = HookRequest::started("app-1", Schema::Event, json!({}));
    let started = tokio::time::Instant::now();
    let outcome = client(&server.url(), policy).send(&request).await;

    // 50ms before the first retry, 100ms before the second
    assert!(started.elapsed() >= Duration::from_millis(150), "{:?}", started.elapsed());
    assert!(matches!(outcome, DeliveryOutcome::Failed { retries: 2, .. }), "{outcome:?}");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn constant_bad_gateway_exhausts_status_budget() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("PUT", "/build/started/app-1")
      .match_query(Matcher::Any)
      .with_status(502)
      .expect(11)
      .create_async()
      .await;

    let request = HookRequest::started("app-1", Schema::Event, json!({}));
    let outcome = client(&server.url(), fast_policy(10)).send(&request).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::TransientDelivery));
    match outcome {
      DeliveryOutcome::Failed { status, retries, .. } => {
        assert_eq!(status, Some(502));
        assert_eq!(retries, 10);
      }
      other => panic!("expected failure, got {other:?}"),
    }
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn non_retryable_status_fails_immediately() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("PUT", "/build/started/app-1")
      .match_query(Matcher::Any)
      .with_status(400)
      .with_body("`build_id` field does not match given url.")
      .expect(1)
      .create_async()
      .await;

    let request = HookRequest::started("app-1", Schema::Default, json!({"build_id": "other"}));
    let outcome = client(&server.url(), fast_policy(10)).send(&request).await;

    assert_eq!(
      outcome,
      DeliveryOutcome::Failed {
        status: Some(400),
        reason: "`build_id` field does not match given url.".into(),
        retries: 0,
      }
    );
    mock.assert_async().await;
  }

  #[tokio::test]
  #[tracing_test::traced_test]
  async fn unreachable_host_uses_connect_budget() {
    // nothing listens on the discard port
    let request = HookRequest::started("app-1", Schema::Event, json!({}));
    let outcome = client("http://127.0.0.1:9", fast_policy(2)).send(&request).await;

    match outcome {
      DeliveryOutcome::Failed { status, retries, .. } => {
        assert_eq!(status, None);
        assert_eq!(retries, 2);
      }
      other => panic!("expected failure, got {other:?}"),
    }
    assert!(logs_contain("retrying build notification"));
    assert!(logs_contain("build notification failed"));
  }
}
