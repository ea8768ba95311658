//! Build lifecycle states and the completion predicate.
//!
//! Statuses arrive as free-form strings (`BuildStarted`, `Running`,
//! `Complete`, `BuildFailed`, ...). Transitions are never validated: any state
//! may follow any other, because the watcher delivers at least once and out of
//! order, and the store absorbs that by upserting.

use serde::{Deserialize, Serialize};

/// Coarse classification of a build status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildState {
  Unknown,
  Initiated,
  Started,
  Completed,
  Failed,
}

impl BuildState {
  /// Classify a status string.
  ///
  /// Failure wins over completion so that e.g. `CompletedWithFailure` is
  /// reported as failed; both are terminal either way.
  pub fn from_status(status: &str) -> Self {
    let status = status.to_ascii_lowercase();

    if status.contains("fail") {
      BuildState::Failed
    } else if status.contains("complete") {
      BuildState::Completed
    } else if status.contains("start") || status.contains("running") {
      BuildState::Started
    } else if status.contains("init") || status.contains("new") || status.contains("pending") {
      BuildState::Initiated
    } else {
      BuildState::Unknown
    }
  }

  /// Whether no further status progression is expected.
  pub fn is_terminal(self) -> bool {
    matches!(self, BuildState::Completed | BuildState::Failed)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      BuildState::Unknown => "UNKNOWN",
      BuildState::Initiated => "INITIATED",
      BuildState::Started => "STARTED",
      BuildState::Completed => "COMPLETED",
      BuildState::Failed => "FAILED",
    }
  }
}

impl std::fmt::Display for BuildState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Return whether a build with this status has finished.
///
/// True iff the status case-insensitively contains `complete` or `fail`;
/// failed builds count as completed so that their logs get collected too.
pub fn build_complete(status: &str) -> bool {
  BuildState::from_status(status).is_terminal()
}
