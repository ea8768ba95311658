//! Build log retrieval from the cluster.
//!
//! Logs are pulled through the `oc` client, which must already be logged in
//! to the cluster: `oc whoami` gates every fetch so that an expired session
//! is reported as an authentication problem rather than a generic failure.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LogError {
  #[error("not authenticated against the cluster: {payload}")]
  Authentication { payload: String },

  #[error("oc exited with code {code:?}: {payload}")]
  Command { code: Option<i32>, payload: String },

  #[error("failed to run oc: {0}")]
  Spawn(#[from] io::Error),
}

/// Anything that can produce the log text of a build.
pub trait LogSource: Send + Sync {
  fn fetch_log(
    &self,
    build_id: &str,
    namespace: Option<&str>,
    log_level: u32,
  ) -> impl Future<Output = Result<String, LogError>> + Send;
}

/// Fetches logs by shelling out to the `oc` CLI.
#[derive(Debug, Clone)]
pub struct OcCli {
  program: PathBuf,
  global_args: Vec<String>,
}

impl Default for OcCli {
  fn default() -> Self {
    Self::new("oc")
  }
}

impl OcCli {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      global_args: Vec::new(),
    }
  }

  /// Arguments placed before every subcommand, e.g. `--kubeconfig <path>`.
  pub fn with_global_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.global_args.extend(args.into_iter().map(Into::into));
    self
  }

  async fn run(&self, args: &[String]) -> Result<std::process::Output, LogError> {
    debug!(program = ?self.program, args = ?args, "spawning oc");
    Ok(
      Command::new(&self.program)
        .args(&self.global_args)
        .args(args)
        .output()
        .await?,
    )
  }

  /// Make sure there is a logged-in session.
  pub async fn whoami(&self) -> Result<String, LogError> {
    let output = self.run(&["whoami".to_string()]).await?;
    if !output.status.success() {
      return Err(LogError::Authentication {
        payload: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }
}

impl LogSource for OcCli {
  async fn fetch_log(&self, build_id: &str, namespace: Option<&str>, log_level: u32) -> Result<String, LogError> {
    let user = self.whoami().await?;

    let mut args = vec!["logs".to_string(), build_id.to_string()];
    if let Some(namespace) = namespace {
      args.push("--namespace".to_string());
      args.push(namespace.to_string());
    }
    args.push("--loglevel".to_string());
    args.push(log_level.to_string());

    let output = self.run(&args).await?;
    if !output.status.success() {
      return Err(LogError::Command {
        code: output.status.code(),
        payload: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    let log = String::from_utf8_lossy(&output.stdout).into_owned();
    info!(build_id, user = %user, bytes = log.len(), "fetched build log from cluster");
    Ok(log)
  }
}

#[cfg(all(test, unix))]
mod tests {
  use std::fs;
  use std::path::Path;

  use super::*;
  use tempfile::TempDir;

  /// A stand-in `oc`, run through `sh`, that echoes its `logs` arguments.
  fn fake_oc(dir: &Path, logged_in: bool, logs_exit: i32) -> OcCli {
    let whoami = if logged_in {
      "echo developer"
    } else {
      "echo 'error: You must be logged in to the server (Unauthorized)' >&2; exit 1"
    };
    let script = format!(
      "#!/bin/sh\ncase \"$1\" in\n  whoami) {whoami} ;;\n  logs) shift; if [ {logs_exit} -ne 0 ]; then echo \"no build $1\" >&2; exit {logs_exit}; fi; echo \"log for $*\" ;;\nesac\n"
    );
    let path = dir.join("oc.sh");
    fs::write(&path, script).unwrap();
    OcCli::new("/bin/sh").with_global_args([path.to_string_lossy()])
  }

  #[tokio::test]
  async fn fetches_log_with_namespace_and_level() {
    let dir = TempDir::new().unwrap();
    let oc = fake_oc(dir.path(), true, 0);
    let log = oc.fetch_log("app-1", Some("thoth"), 4).await.unwrap();
    assert_eq!(log, "log for app-1 --namespace thoth --loglevel 4\n");
  }

  #[tokio::test]
  async fn logged_out_session_is_authentication_error() {
    let dir = TempDir::new().unwrap();
    let oc = fake_oc(dir.path(), false, 0);
    match oc.fetch_log("app-1", None, 6).await {
      Err(LogError::Authentication { payload }) => assert!(payload.contains("Unauthorized")),
      other => panic!("expected authentication error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn failing_logs_command_reports_code_and_stderr() {
    let dir = TempDir::new().unwrap();
    let oc = fake_oc(dir.path(), true, 3);
    match oc.fetch_log("ghost", None, 6).await {
      Err(LogError::Command { code, payload }) => {
        assert_eq!(code, Some(3));
        assert_eq!(payload, "no build ghost");
      }
      other => panic!("expected command error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn missing_binary_is_spawn_error() {
    let oc = OcCli::new("/nonexistent/bin/oc");
    assert!(matches!(oc.fetch_log("a", None, 6).await, Err(LogError::Spawn(_))));
  }
}
