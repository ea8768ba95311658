//! In-process object store, for tests and embedding.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use super::backend::{ListPage, ObjectStore, ObjectStoreError, dir_prefix, page_of, validate_key, validate_token};

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
  objects: RwLock<BTreeMap<String, Vec<u8>>>,
  offline: AtomicBool,
}

impl MemoryObjectStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Simulate an outage: every operation fails with `Unavailable` while set.
  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn len(&self) -> usize {
    self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn ensure_online(&self) -> Result<(), ObjectStoreError> {
    if self.offline.load(Ordering::SeqCst) {
      return Err(ObjectStoreError::Unavailable("memory store is offline".to_string()));
    }
    Ok(())
  }
}

impl ObjectStore for MemoryObjectStore {
  fn put(&self, key: &str, data: &[u8]) -> Result<(), ObjectStoreError> {
    self.ensure_online()?;
    validate_key(key)?;
    self
      .objects
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.to_string(), data.to_vec());
    Ok(())
  }

  fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
    self.ensure_online()?;
    validate_key(key)?;
    self
      .objects
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
      .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
  }

  fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
    self.ensure_online()?;
    validate_key(key)?;
    self
      .objects
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key)
      .map(|_| ())
      .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
  }

  fn list(&self, prefix: &str, max_items: usize, starting_token: Option<&str>) -> Result<ListPage, ObjectStoreError> {
    self.ensure_online()?;
    validate_token(prefix, starting_token)?;
    let key_prefix = dir_prefix(prefix);

    let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
    let lower = match starting_token {
      Some(token) => Bound::Excluded(token.to_string()),
      None => Bound::Included(key_prefix.clone()),
    };
    let keys = objects
      .range((lower, Bound::Unbounded))
      .map(|(key, _)| key)
      .take_while(|key| key.starts_with(&key_prefix))
      .cloned();
    Ok(page_of(keys, max_items))
  }

  fn check(&self) -> Result<(), ObjectStoreError> {
    self.ensure_online()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn list_stays_within_prefix() {
    let store = MemoryObjectStore::new();
    for key in ["a/1", "ab/2", "b/3", "a/2"] {
      store.put(key, b"x").unwrap();
    }
    let page = store.list("a", 10, None).unwrap();
    assert_eq!(page.keys, vec!["a/1", "a/2"]);
    assert_eq!(page.resume_token, None);
  }

  #[test]
  fn list_resumes_after_token() {
    let store = MemoryObjectStore::new();
    for key in ["p/1", "p/2", "p/3"] {
      store.put(key, b"x").unwrap();
    }
    let first = store.list("p", 1, None).unwrap();
    assert_eq!(first.keys, vec!["p/1"]);
    let second = store.list("p", 5, first.resume_token.as_deref()).unwrap();
    assert_eq!(second.keys, vec!["p/2", "p/3"]);
  }

  #[test]
  fn offline_store_is_unavailable() {
    let store = MemoryObjectStore::new();
    store.put("p/1", b"x").unwrap();
    store.set_offline(true);
    assert!(matches!(store.check(), Err(ObjectStoreError::Unavailable(_))));
    assert!(matches!(store.get("p/1"), Err(ObjectStoreError::Unavailable(_))));
    store.set_offline(false);
    assert_eq!(store.get("p/1").unwrap(), b"x");
  }

  #[test]
  fn delete_missing_is_not_found() {
    let store = MemoryObjectStore::new();
    assert!(matches!(store.delete("p/1"), Err(ObjectStoreError::NotFound(_))));
    assert!(store.is_empty());
  }
}
