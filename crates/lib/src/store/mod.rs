//! Content-addressed build record storage.
//!
//! Every build record is stored as one JSON document under
//! `<prefix>/<sha256(build_id)>`. Because the key is derived from the build
//! id alone, storing a record twice replaces it in place: the store is an
//! idempotent upsert keyed by build id, with last-writer-wins semantics for
//! concurrent writers.
//!
//! # Layout
//!
//! ```text
//! <deployment>/build_aggregator/
//! ├── 1f6d...e0   # {"build_id": "app-1", "build_status": ..., "build_log": ...}
//! └── 9a0b...77
//! ```

mod backend;
mod fs;
mod memory;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::build::{BuildLog, BuildRecord, ValidationErrors, schema};
use crate::consts::{DEFAULT_DEPLOYMENT_NAME, DEFAULT_OC_LOG_LEVEL, RESULT_TYPE};
use crate::util::hash::DocumentId;

pub use backend::{ListPage, ObjectStore, ObjectStoreError};
pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

/// Keys fetched per backend call when scanning the whole prefix.
const SCAN_BATCH: usize = 500;

/// Errors from build record storage.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("build id must not be empty")]
  EmptyBuildId,

  #[error("document has no string `build_id` field")]
  MissingBuildId,

  #[error("no build record for build id '{build_id}'")]
  NotFound { build_id: String },

  #[error("storage unavailable: {0}")]
  Unavailable(String),

  #[error("storage backend error: {0}")]
  Backend(#[source] ObjectStoreError),

  #[error("failed to serialize build record: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("build record does not validate: {0}")]
  Invalid(ValidationErrors),

  #[error("stored document '{key}' is not valid JSON: {source}")]
  Corrupt {
    key: String,
    #[source]
    source: serde_json::Error,
  },
}

impl From<ObjectStoreError> for StoreError {
  fn from(err: ObjectStoreError) -> Self {
    match err {
      ObjectStoreError::Unavailable(reason) => StoreError::Unavailable(reason),
      other => StoreError::Backend(other),
    }
  }
}

/// Storage prefix for a deployment: `<deployment>/build_aggregator`.
pub fn default_prefix(deployment: &str) -> String {
  let deployment = deployment.trim_matches('/');
  let deployment = if deployment.is_empty() {
    DEFAULT_DEPLOYMENT_NAME
  } else {
    deployment
  };
  format!("{deployment}/{RESULT_TYPE}")
}

/// Build records stored over an [`ObjectStore`] backend.
#[derive(Debug, Clone)]
pub struct BuildStore<O> {
  backend: O,
  prefix: String,
  log_level: u32,
}

impl<O: ObjectStore> BuildStore<O> {
  pub fn new(backend: O, prefix: impl Into<String>) -> Self {
    Self {
      backend,
      prefix: prefix.into().trim_matches('/').to_string(),
      log_level: DEFAULT_OC_LOG_LEVEL,
    }
  }

  /// Log level assumed for stored documents that do not carry one.
  pub fn with_log_level(mut self, log_level: u32) -> Self {
    self.log_level = log_level;
    self
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn backend(&self) -> &O {
    &self.backend
  }

  /// Object key of a document.
  pub fn key_for(&self, id: &DocumentId) -> String {
    if self.prefix.is_empty() {
      id.to_string()
    } else {
      format!("{}/{}", self.prefix, id)
    }
  }

  /// Map an object key back to its document id, if it names one.
  pub fn document_id_of(&self, key: &str) -> Option<DocumentId> {
    let name = key.rsplit('/').next()?;
    DocumentId::parse(name)
  }

  /// Upsert a record under the hash of its build id.
  ///
  /// Records that would not read back as written, such as ones with a
  /// relative `build_url`, are rejected.
  pub fn store(&self, record: &BuildRecord) -> Result<DocumentId, StoreError> {
    if record.build_id.is_empty() {
      return Err(StoreError::EmptyBuildId);
    }
    let doc = serde_json::to_value(record).map_err(StoreError::Serialize)?;
    let errors = schema::validate(&doc);
    if !errors.is_empty() {
      return Err(StoreError::Invalid(errors));
    }
    let data = serde_json::to_vec(&doc).map_err(StoreError::Serialize)?;
    let id = self.put(&record.build_id, &data)?;
    info!(build_id = %record.build_id, document_id = %id, status = %record.build_status, "stored build record");
    Ok(id)
  }

  /// Upsert a raw canonical document as given.
  pub fn store_document(&self, doc: &Value) -> Result<DocumentId, StoreError> {
    let build_id = doc
      .get("build_id")
      .and_then(Value::as_str)
      .ok_or(StoreError::MissingBuildId)?;
    if build_id.is_empty() {
      return Err(StoreError::EmptyBuildId);
    }
    let data = serde_json::to_vec(doc).map_err(StoreError::Serialize)?;
    let id = self.put(build_id, &data)?;
    info!(build_id, document_id = %id, "stored build document");
    Ok(id)
  }

  fn put(&self, build_id: &str, data: &[u8]) -> Result<DocumentId, StoreError> {
    let id = DocumentId::for_build(build_id);
    self.backend.put(&self.key_for(&id), data)?;
    Ok(id)
  }

  /// The stored document for a build id, as written.
  pub fn retrieve_document(&self, build_id: &str) -> Result<Value, StoreError> {
    let key = self.key_for(&DocumentId::for_build(build_id));
    self.load(&key).map_err(|err| match err {
      StoreError::Backend(ObjectStoreError::NotFound(_)) => StoreError::NotFound {
        build_id: build_id.to_string(),
      },
      other => other,
    })
  }

  /// Read and parse the document stored under an object key.
  pub fn load(&self, key: &str) -> Result<Value, StoreError> {
    let data = self.backend.get(key)?;
    serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
      key: key.to_string(),
      source,
    })
  }

  /// The record for a build id with its log split out.
  ///
  /// Documents are decoded leniently; fields that no longer validate fall
  /// back to defaults.
  pub fn retrieve(&self, build_id: &str) -> Result<(Option<BuildLog>, BuildRecord), StoreError> {
    let doc = self.retrieve_document(build_id)?;
    let (mut record, errors) = schema::decode(&doc, self.log_level);
    if !errors.is_empty() {
      debug!(build_id, errors = %errors, "stored build record does not validate");
    }
    let log = record.build_log.take();
    Ok((log, record))
  }

  /// Only the log of a build, if one was attached.
  pub fn retrieve_log(&self, build_id: &str) -> Result<Option<BuildLog>, StoreError> {
    Ok(self.retrieve(build_id)?.0)
  }

  /// One page of object keys below the prefix.
  pub fn list(&self, max_items: usize, resume_token: Option<&str>) -> Result<ListPage, StoreError> {
    Ok(self.backend.list(&self.prefix, max_items, resume_token)?)
  }

  /// Number of stored documents, by scanning the whole prefix.
  pub fn count(&self) -> Result<usize, StoreError> {
    let mut total = 0;
    self.scan(|keys| {
      total += keys.len();
      Ok(())
    })?;
    Ok(total)
  }

  /// Delete every document below the prefix, returning how many were removed.
  pub fn purge(&self) -> Result<usize, StoreError> {
    warn!(prefix = %self.prefix, "purging all build records");
    let mut keys = Vec::new();
    self.scan(|page| {
      keys.extend_from_slice(page);
      Ok(())
    })?;

    let mut removed = 0;
    for key in &keys {
      match self.backend.delete(key) {
        Ok(()) => removed += 1,
        Err(ObjectStoreError::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
      }
    }
    warn!(prefix = %self.prefix, removed, "purged build records");
    Ok(removed)
  }

  /// Connectivity probe; any backend failure is reported as unavailability.
  pub fn check(&self) -> Result<(), StoreError> {
    self
      .backend
      .check()
      .map_err(|err| StoreError::Unavailable(err.to_string()))
  }

  fn scan(&self, mut visit: impl FnMut(&[String]) -> Result<(), StoreError>) -> Result<(), StoreError> {
    let mut token: Option<String> = None;
    loop {
      let page = self.list(SCAN_BATCH, token.as_deref())?;
      visit(&page.keys)?;
      match page.resume_token {
        Some(next) => token = Some(next),
        None => return Ok(()),
      }
    }
  }
}
