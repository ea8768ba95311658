//! The object storage seam.
//!
//! [`ObjectStore`] is the minimal surface the build store needs from a blob
//! backend: keyed put/get/delete, ordered prefix listing with a resume token,
//! and a connectivity probe.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors reported by an object storage backend.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
  #[error("object not found: {0}")]
  NotFound(String),

  #[error("object store unavailable: {0}")]
  Unavailable(String),

  #[error("invalid object key '{0}'")]
  InvalidKey(String),

  #[error("resume token '{token}' is outside prefix '{prefix}'")]
  InvalidToken { token: String, prefix: String },

  #[error("I/O error on '{key}': {source}")]
  Io {
    key: String,
    #[source]
    source: io::Error,
  },
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
  /// Full keys, in lexicographic order.
  pub keys: Vec<String>,
  /// Pass as `starting_token` to continue after this page; `None` when the
  /// listing is exhausted.
  pub resume_token: Option<String>,
}

/// A flat key/value blob store with `/`-separated keys.
pub trait ObjectStore: Send + Sync {
  /// Write `data` under `key`, replacing any previous object atomically.
  fn put(&self, key: &str, data: &[u8]) -> Result<(), ObjectStoreError>;

  fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

  fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

  /// List up to `max_items` keys below `prefix` that sort strictly after
  /// `starting_token`.
  fn list(&self, prefix: &str, max_items: usize, starting_token: Option<&str>) -> Result<ListPage, ObjectStoreError>;

  /// Verify the backend is reachable.
  fn check(&self) -> Result<(), ObjectStoreError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
  fn put(&self, key: &str, data: &[u8]) -> Result<(), ObjectStoreError> {
    (**self).put(key, data)
  }

  fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
    (**self).get(key)
  }

  fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
    (**self).delete(key)
  }

  fn list(&self, prefix: &str, max_items: usize, starting_token: Option<&str>) -> Result<ListPage, ObjectStoreError> {
    (**self).list(prefix, max_items, starting_token)
  }

  fn check(&self) -> Result<(), ObjectStoreError> {
    (**self).check()
  }
}

/// Reject keys that could escape the store root or address nothing.
pub(crate) fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
  let bad = key.is_empty()
    || key.contains('\\')
    || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
  if bad {
    return Err(ObjectStoreError::InvalidKey(key.to_string()));
  }
  Ok(())
}

/// `prefix` as a directory-style key prefix, always ending in `/`.
pub(crate) fn dir_prefix(prefix: &str) -> String {
  let trimmed = prefix.trim_matches('/');
  if trimmed.is_empty() {
    String::new()
  } else {
    format!("{trimmed}/")
  }
}

/// Check that a resume token belongs to the listing it is used with.
pub(crate) fn validate_token(prefix: &str, token: Option<&str>) -> Result<(), ObjectStoreError> {
  match token {
    Some(token) if !token.starts_with(&dir_prefix(prefix)) => Err(ObjectStoreError::InvalidToken {
      token: token.to_string(),
      prefix: prefix.to_string(),
    }),
    _ => Ok(()),
  }
}

/// Cut a sorted key list down to one page.
pub(crate) fn page_of(sorted_keys: impl Iterator<Item = String>, max_items: usize) -> ListPage {
  let mut keys = Vec::new();
  let mut more = false;
  for key in sorted_keys {
    if keys.len() == max_items {
      more = true;
      break;
    }
    keys.push(key);
  }
  let resume_token = if more { keys.last().cloned() } else { None };
  ListPage { keys, resume_token }
}
