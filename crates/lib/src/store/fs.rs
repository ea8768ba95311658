//! Filesystem-backed object store.
//!
//! # Layout
//!
//! ```text
//! {root}/
//! └── <deployment>/build_aggregator/
//!     └── <sha256(build_id)>      # one JSON document per build
//! ```
//!
//! Keys map one-to-one onto relative paths. Writes go to a hidden temporary
//! file in the target directory which is then renamed over the destination,
//! so readers never observe a partially written object. Hidden files are
//! never listed.
//!
//! Each `list` call walks the whole prefix directory, but only one page of
//! keys is held in memory at a time.

use std::collections::BinaryHeap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::trace;
use walkdir::WalkDir;

use super::backend::{ListPage, ObjectStore, ObjectStoreError, dir_prefix, page_of, validate_key, validate_token};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
  root: PathBuf,
}

impl FsObjectStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_for(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
    validate_key(key)?;
    Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
  }

  fn key_for(&self, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(&self.root).ok()?;
    let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(segments?.join("/"))
  }
}

fn io_error(key: &str, source: io::Error) -> ObjectStoreError {
  ObjectStoreError::Io {
    key: key.to_string(),
    source,
  }
}

fn is_hidden(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|name| name.to_str())
    .is_some_and(|name| name.starts_with('.'))
}

impl ObjectStore for FsObjectStore {
  fn put(&self, key: &str, data: &[u8]) -> Result<(), ObjectStoreError> {
    let path = self.path_for(key)?;
    let dir = path.parent().unwrap_or(&self.root);
    fs::create_dir_all(dir).map_err(|e| io_error(key, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| io_error(key, e))?;
    temp.write_all(data).map_err(|e| io_error(key, e))?;
    temp.as_file().sync_all().map_err(|e| io_error(key, e))?;
    temp.persist(&path).map_err(|e| io_error(key, e.error))?;

    trace!(key, bytes = data.len(), "object written");
    Ok(())
  }

  fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
    let path = self.path_for(key)?;
    fs::read(&path).map_err(|e| {
      if e.kind() == io::ErrorKind::NotFound {
        ObjectStoreError::NotFound(key.to_string())
      } else {
        io_error(key, e)
      }
    })
  }

  fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
    let path = self.path_for(key)?;
    fs::remove_file(&path).map_err(|e| {
      if e.kind() == io::ErrorKind::NotFound {
        ObjectStoreError::NotFound(key.to_string())
      } else {
        io_error(key, e)
      }
    })
  }

  fn list(&self, prefix: &str, max_items: usize, starting_token: Option<&str>) -> Result<ListPage, ObjectStoreError> {
    validate_token(prefix, starting_token)?;
    let key_prefix = dir_prefix(prefix);
    let dir = if key_prefix.is_empty() {
      self.root.clone()
    } else {
      self.path_for(key_prefix.trim_end_matches('/'))?
    };

    if !dir.is_dir() {
      return Ok(ListPage::default());
    }

    // Keep only the smallest `max_items + 1` keys past the token; the extra
    // one tells whether another page follows.
    let after = starting_token.unwrap_or_default();
    let bound = max_items.saturating_add(1);
    let mut smallest = BinaryHeap::with_capacity(bound.min(1024));
    for entry in WalkDir::new(&dir).into_iter().filter_entry(|e| e.depth() == 0 || !is_hidden(e.path())) {
      let entry = entry.map_err(|e| {
        let key = e
          .path()
          .and_then(|p| self.key_for(p))
          .unwrap_or_else(|| prefix.to_string());
        io_error(&key, e.into())
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      let Some(key) = self.key_for(entry.path()) else {
        continue;
      };
      if key.as_str() <= after {
        continue;
      }
      if smallest.len() < bound {
        smallest.push(key);
      } else if smallest.peek().is_some_and(|largest| key < *largest) {
        smallest.pop();
        smallest.push(key);
      }
    }

    Ok(page_of(smallest.into_sorted_vec().into_iter(), max_items))
  }

  fn check(&self) -> Result<(), ObjectStoreError> {
    fs::create_dir_all(&self.root)
      .and_then(|_| fs::read_dir(&self.root).map(|_| ()))
      .map_err(|e| ObjectStoreError::Unavailable(format!("{}: {e}", self.root.display())))
  }
}
