//! The aggregator's boundary operations.
//!
//! [`BuildService`] implements the ingestion hooks and read paths on top of
//! the normalizer, the build store and a cluster [`LogSource`]. Every failure
//! is a [`ServiceError`]; [`ServiceError::to_response`] is the single place
//! where failures are turned into what a client gets to see.

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::build::schema::validate;
use crate::build::{BuildLog, BuildRecord, ValidationErrors};
use crate::cluster::{LogError, LogSource};
use crate::error::ErrorKind;
use crate::hook::{LogMode, Schema};
use crate::normalize::{BuildEvent, Normalizer};
use crate::paginate::{PaginateError, PaginationPage, Paginator};
use crate::store::{BuildStore, ObjectStore, StoreError};
use crate::util::hash::DocumentId;

/// Status of records created from a bare log.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Message of a start hook whose body names another build than its URL.
pub const BUILD_ID_MISMATCH: &str = "`build_id` field does not match given url.";

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("build log `{build_id}` already exists and `force` is not specified")]
  BuildLogExists { build_id: String },

  #[error("build `{build_id}` has not been completed yet (status {status})")]
  BuildNotCompleted { build_id: String, status: String },

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Paginate(#[from] PaginateError),

  #[error(transparent)]
  Log(#[from] LogError),
}

/// Body of an error reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
  #[serde(skip)]
  pub status: u16,
  pub error: ErrorKind,
  pub message: String,
  #[serde(skip_serializing_if = "ValidationErrors::is_empty")]
  pub errors: ValidationErrors,
}

impl ServiceError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ServiceError::Validation(_) | ServiceError::BuildLogExists { .. } | ServiceError::BuildNotCompleted { .. } => {
        ErrorKind::Validation
      }
      ServiceError::Store(err) => store_kind(err),
      ServiceError::Paginate(PaginateError::Store(err)) => store_kind(err),
      ServiceError::Paginate(_) => ErrorKind::Validation,
      ServiceError::Log(LogError::Authentication { .. }) => ErrorKind::Authentication,
      ServiceError::Log(_) => ErrorKind::Unknown,
    }
  }

  /// Translate into a client reply.
  ///
  /// Internal failures are logged here with their full context and replaced
  /// by a generic message.
  pub fn to_response(&self) -> ErrorResponse {
    let kind = self.kind();
    let message = if kind.is_public() {
      self.to_string()
    } else {
      error!(kind = %kind, error = %self, "request failed");
      match kind {
        ErrorKind::StorageUnavailable => "storage is temporarily unavailable".to_string(),
        _ => "internal server error".to_string(),
      }
    };

    let errors = match self {
      ServiceError::Validation(errors) | ServiceError::Store(StoreError::Invalid(errors)) => errors.clone(),
      ServiceError::BuildLogExists { build_id } => ValidationErrors::single(
        "BuildLogExists",
        format!("Build log `{build_id}` already exists and `force` is not specified."),
      ),
      ServiceError::BuildNotCompleted { .. } => {
        ValidationErrors::single("BuildNotCompleted", "Build has not been completed yet.")
      }
      _ => ValidationErrors::new(),
    };

    ErrorResponse {
      status: kind.status_code(),
      error: kind,
      message,
      errors,
    }
  }
}

fn store_kind(err: &StoreError) -> ErrorKind {
  match err {
    StoreError::NotFound { .. } => ErrorKind::NotFound,
    StoreError::Unavailable(_) => ErrorKind::StorageUnavailable,
    StoreError::EmptyBuildId | StoreError::MissingBuildId | StoreError::Invalid(_) => ErrorKind::Validation,
    StoreError::Backend(_) | StoreError::Serialize(_) | StoreError::Corrupt { .. } => ErrorKind::Unknown,
  }
}

/// Reply of an accepted hook call.
///
/// Validation problems that did not prevent storing the record are returned
/// alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accepted {
  pub build_id: String,
  pub document_id: DocumentId,
  #[serde(skip_serializing_if = "ValidationErrors::is_empty")]
  pub errors: ValidationErrors,
}

/// Build id of an uploaded log file: its name without the `.log` extension.
pub fn build_id_from_log_file(file_name: &str) -> &str {
  file_name.strip_suffix(".log").unwrap_or(file_name)
}

pub struct BuildService<O, L> {
  store: BuildStore<O>,
  normalizer: Normalizer,
  logs: L,
  log_url_base: Option<Url>,
}

impl<O: ObjectStore, L: LogSource> BuildService<O, L> {
  pub fn new(store: BuildStore<O>, normalizer: Normalizer, logs: L) -> Self {
    Self {
      store,
      normalizer,
      logs,
      log_url_base: None,
    }
  }

  /// Base URL under which `build/log/<id>` serves stored logs.
  pub fn with_log_url_base(mut self, base: Url) -> Self {
    self.log_url_base = Some(base);
    self
  }

  pub fn store(&self) -> &BuildStore<O> {
    &self.store
  }

  fn log_url(&self, build_id: &str) -> Option<String> {
    let mut url = self.log_url_base.clone()?;
    url
      .path_segments_mut()
      .ok()?
      .pop_if_empty()
      .extend(["build", "log", build_id]);
    Some(url.into())
  }

  /// Start hook: store the normalized record without a log.
  ///
  /// A canonical document must name the same build as the URL; other
  /// validation problems are tolerated and reported back.
  pub fn on_build_started(&self, build_id: &str, schema: Schema, body: Value) -> Result<Accepted, ServiceError> {
    let event = BuildEvent::parse(schema, body).map_err(ServiceError::Validation)?;

    if let BuildEvent::Document(doc) = &event {
      if doc.get("build_id").and_then(Value::as_str) != Some(build_id) {
        let mut errors = ValidationErrors::single("build_id", BUILD_ID_MISMATCH);
        errors.extend(validate(doc));
        return Err(ServiceError::Validation(errors));
      }
    }

    let normalized = self.normalizer.normalize(&event, Some(build_id));
    let mut record = normalized.record;
    record.build_log = None;

    let document_id = self.store.store(&record)?;
    info!(build_id, status = %record.build_status, errors = normalized.errors.len(), "build started");
    Ok(Accepted {
      build_id: build_id.to_string(),
      document_id,
      errors: normalized.errors,
    })
  }

  /// Completion hook: replace the record, pulling the log from the cluster
  /// in [`LogMode::Cluster`].
  ///
  /// In remote mode a log attached earlier is carried over. A build that was
  /// never announced is simply created.
  pub async fn on_build_completed(
    &self,
    build_id: &str,
    schema: Schema,
    mode: LogMode,
    log_level: Option<u32>,
    body: Value,
  ) -> Result<Accepted, ServiceError> {
    let event = BuildEvent::parse(schema, body).map_err(ServiceError::Validation)?;
    let normalized = self.normalizer.normalize(&event, Some(build_id));
    let mut record = normalized.record;
    if let Some(level) = log_level {
      record.log_level = level;
    }
    record.build_log_url = self.log_url(build_id);

    match mode {
      LogMode::Cluster => {
        let text = self
          .logs
          .fetch_log(build_id, record.namespace(), record.log_level)
          .await?;
        record.build_log = Some(BuildLog::for_build(build_id, text));
      }
      LogMode::Remote if record.build_log.is_none() => match self.store.retrieve_log(build_id) {
        Ok(existing) => record.build_log = existing,
        Err(StoreError::NotFound { .. }) => info!(build_id, "completed build was not seen before"),
        Err(err) => return Err(err.into()),
      },
      LogMode::Remote => {}
    }

    let document_id = self.store.store(&record)?;
    info!(
      build_id,
      status = %record.build_status,
      mode = mode.as_str(),
      has_log = record.build_log.is_some(),
      "build completed"
    );
    Ok(Accepted {
      build_id: build_id.to_string(),
      document_id,
      errors: normalized.errors,
    })
  }

  /// Attach a log to a build.
  ///
  /// An existing log is only replaced with `force`. A known build that has
  /// not completed is rejected; an unknown build is recorded with status
  /// `Unknown` and the log.
  pub fn put_build_log(&self, build_id: &str, log: BuildLog, force: bool) -> Result<DocumentId, ServiceError> {
    let record = match self.store.retrieve(build_id) {
      Ok((Some(_), _)) if !force => {
        return Err(ServiceError::BuildLogExists {
          build_id: build_id.to_string(),
        });
      }
      Ok((_, record)) => {
        if !record.is_complete() {
          return Err(ServiceError::BuildNotCompleted {
            build_id: build_id.to_string(),
            status: record.build_status,
          });
        }
        record
      }
      Err(StoreError::NotFound { .. }) => {
        warn!(build_id, "storing log of an unknown build");
        BuildRecord::new(build_id, UNKNOWN_STATUS, self.normalizer.log_level())
      }
      Err(err) => return Err(err.into()),
    };

    let mut record = record;
    record.build_log = Some(log.with_default_build_id(build_id));
    Ok(self.store.store(&record)?)
  }

  /// Store an uploaded log file as a record of its own.
  pub fn import_build_log(&self, build_id: &str, text: impl Into<String>) -> Result<DocumentId, ServiceError> {
    if build_id.is_empty() {
      return Err(ServiceError::Validation(ValidationErrors::single(
        "build_id",
        "must not be empty",
      )));
    }
    let mut record = BuildRecord::new(build_id, UNKNOWN_STATUS, self.normalizer.log_level());
    record.build_log = Some(BuildLog::for_build(build_id, text));
    let document_id = self.store.store(&record)?;
    info!(build_id, "imported build log");
    Ok(document_id)
  }

  /// Store a canonical record as is.
  pub fn store_record(&self, record: &BuildRecord) -> Result<DocumentId, ServiceError> {
    Ok(self.store.store(record)?)
  }

  pub fn retrieve(&self, build_id: &str) -> Result<(Option<BuildLog>, BuildRecord), ServiceError> {
    Ok(self.store.retrieve(build_id)?)
  }

  pub fn build_status(&self, build_id: &str) -> Result<String, ServiceError> {
    Ok(self.store.retrieve(build_id)?.1.build_status)
  }

  pub fn build_info(&self, build_id: &str) -> Result<BuildRecord, ServiceError> {
    Ok(self.store.retrieve(build_id)?.1)
  }

  pub fn build_log(&self, build_id: &str) -> Result<Option<BuildLog>, ServiceError> {
    Ok(self.store.retrieve_log(build_id)?)
  }

  pub fn list(&self, page: usize, cursor: Option<&str>) -> Result<PaginationPage, ServiceError> {
    Ok(Paginator::new(&self.store, self.normalizer.log_level()).paginate(page, cursor)?)
  }

  pub fn count(&self) -> Result<usize, ServiceError> {
    Ok(self.store.count()?)
  }

  pub fn purge(&self) -> Result<usize, ServiceError> {
    Ok(self.store.purge()?)
  }

  /// Readiness signal: whether the storage backend is reachable.
  pub fn readiness(&self) -> Result<(), ServiceError> {
    Ok(self.store.check()?)
  }

  /// Fetch a build log straight from the cluster without storing it.
  pub async fn get_remote_log(
    &self,
    build_id: &str,
    namespace: Option<&str>,
    log_level: Option<u32>,
  ) -> Result<String, ServiceError> {
    let level = log_level.unwrap_or(self.normalizer.log_level());
    Ok(self.logs.fetch_log(build_id, namespace, level).await?)
  }
}
