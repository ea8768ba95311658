//! Error classification shared by every boundary of the aggregator.

use serde::Serialize;

/// Coarse category of a failure, as seen by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Validation,
  NotFound,
  Authentication,
  TransientDelivery,
  StorageUnavailable,
  Unknown,
}

impl ErrorKind {
  /// HTTP status code a client receives for this kind.
  pub fn status_code(self) -> u16 {
    match self {
      ErrorKind::Validation => 400,
      ErrorKind::Authentication => 401,
      ErrorKind::NotFound => 404,
      ErrorKind::Unknown => 500,
      ErrorKind::TransientDelivery => 502,
      ErrorKind::StorageUnavailable => 503,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::Validation => "validation",
      ErrorKind::NotFound => "not_found",
      ErrorKind::Authentication => "authentication",
      ErrorKind::TransientDelivery => "transient_delivery",
      ErrorKind::StorageUnavailable => "storage_unavailable",
      ErrorKind::Unknown => "unknown",
    }
  }

  /// Whether the details of such an error may be shown to a client.
  pub fn is_public(self) -> bool {
    !matches!(self, ErrorKind::Unknown | ErrorKind::StorageUnavailable)
  }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_codes() {
    assert_eq!(ErrorKind::Validation.status_code(), 400);
    assert_eq!(ErrorKind::NotFound.status_code(), 404);
    assert_eq!(ErrorKind::Authentication.status_code(), 401);
    assert_eq!(ErrorKind::TransientDelivery.status_code(), 502);
    assert_eq!(ErrorKind::StorageUnavailable.status_code(), 503);
    assert_eq!(ErrorKind::Unknown.status_code(), 500);
  }

  #[test]
  fn internal_kinds_are_not_public() {
    assert!(ErrorKind::Validation.is_public());
    assert!(!ErrorKind::Unknown.is_public());
    assert!(!ErrorKind::StorageUnavailable.is_public());
  }
}
