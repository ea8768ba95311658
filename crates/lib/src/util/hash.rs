//! Hashing utilities for content-addressed storage.
//!
//! Every build document is stored under the SHA-256 of its build id, so two
//! records with the same id always land on the same key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DOCUMENT_ID_LEN: usize = 64;

/// The storage key of a build document.
///
/// # Format
///
/// A lowercase hexadecimal SHA-256 digest (64 characters) of the build id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
  /// Compute the document id for a build id.
  pub fn for_build(build_id: &str) -> Self {
    DocumentId(hash_bytes(build_id.as_bytes()))
  }

  /// Parse a key taken from a storage listing.
  ///
  /// Returns `None` unless the key is a well-formed digest.
  pub fn parse(key: &str) -> Option<Self> {
    let valid = key.len() == DOCUMENT_ID_LEN && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    valid.then(|| DocumentId(key.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for DocumentId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_bytes_known_value() {
    assert_eq!(
      hash_bytes(b"hello world"),
      "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
  }

  #[test]
  fn same_build_id_same_document() {
    assert_eq!(DocumentId::for_build("app-1"), DocumentId::for_build("app-1"));
    assert_ne!(DocumentId::for_build("app-1"), DocumentId::for_build("app-2"));
  }

  #[test]
  fn document_id_is_full_digest() {
    let id = DocumentId::for_build("app-1");
    assert_eq!(id.as_str().len(), DOCUMENT_ID_LEN);
    assert_eq!(DocumentId::parse(id.as_str()), Some(id));
  }

  #[test]
  fn parse_rejects_foreign_keys() {
    assert!(DocumentId::parse("index.json").is_none());
    assert!(DocumentId::parse(&"A".repeat(DOCUMENT_ID_LEN)).is_none());
    assert!(DocumentId::parse("abc").is_none());
  }
}
