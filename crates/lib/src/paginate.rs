//! Cursor-based pagination over stored build records.
//!
//! Listing is driven by the backend's ordered prefix listing. Page 1 always
//! starts from the beginning and counts the collection; every page hands out
//! an opaque cursor that carries the listing position and running totals to
//! the next one. Nothing about an ongoing listing is kept on the server side,
//! so independent clients can page through the store concurrently.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::build::{BuildRecord, ValidationErrors, schema};
use crate::consts::RESULTS_PER_PAGE;
use crate::store::{BuildStore, ObjectStore, StoreError};

#[derive(Debug, Error)]
pub enum PaginateError {
  #[error("page numbers start at 1")]
  InvalidPage,

  #[error("invalid pagination cursor: {0}")]
  InvalidCursor(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Position of a listing between two requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
  /// The page this cursor continues to.
  pub page: usize,
  pub resume_token: Option<String>,
  /// Collection size as counted on page 1.
  pub total: usize,
  /// Objects listed so far.
  pub seen: usize,
}

impl PageCursor {
  pub fn encode(&self) -> String {
    // serializing plain strings and integers cannot fail
    let json = serde_json::to_vec(self).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
  }

  pub fn decode(cursor: &str) -> Result<Self, PaginateError> {
    let json = URL_SAFE_NO_PAD
      .decode(cursor.trim())
      .map_err(|e| PaginateError::InvalidCursor(format!("not base64: {e}")))?;
    serde_json::from_slice(&json).map_err(|e| PaginateError::InvalidCursor(e.to_string()))
  }
}

/// One page of build records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationPage {
  pub page: usize,
  /// Records on this page, without their logs.
  pub build_info: Vec<BuildRecord>,
  pub total: usize,
  pub has_next: bool,
  pub has_prev: bool,
  /// Pass with the request for `page + 1`.
  pub next_cursor: Option<String>,
  /// Validation problems of included records, by build id.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub errors: BTreeMap<String, ValidationErrors>,
}

pub struct Paginator<'a, O> {
  store: &'a BuildStore<O>,
  per_page: usize,
  log_level: u32,
}

impl<'a, O: ObjectStore> Paginator<'a, O> {
  pub fn new(store: &'a BuildStore<O>, log_level: u32) -> Self {
    Self {
      store,
      per_page: RESULTS_PER_PAGE,
      log_level,
    }
  }

  pub fn per_page(mut self, per_page: usize) -> Self {
    self.per_page = per_page.max(1);
    self
  }

  /// Fetch page `page` (1-based).
  ///
  /// `cursor` is ignored for page 1 and required for any later page, where
  /// it must be the `next_cursor` of the page before.
  pub fn paginate(&self, page: usize, cursor: Option<&str>) -> Result<PaginationPage, PaginateError> {
    let position = match page {
      0 => return Err(PaginateError::InvalidPage),
      1 => PageCursor {
        page: 1,
        resume_token: None,
        total: self.store.count()?,
        seen: 0,
      },
      _ => {
        let cursor = cursor.ok_or_else(|| PaginateError::InvalidCursor(format!("page {page} requires a cursor")))?;
        let position = PageCursor::decode(cursor)?;
        if position.page != page {
          return Err(PaginateError::InvalidCursor(format!(
            "cursor continues to page {}, not page {page}",
            position.page
          )));
        }
        position
      }
    };

    let listing = match self.store.list(self.per_page, position.resume_token.as_deref()) {
      Err(StoreError::Backend(err)) if position.resume_token.is_some() => {
        return Err(PaginateError::InvalidCursor(err.to_string()));
      }
      other => other?,
    };

    let mut result = PaginationPage {
      page,
      total: position.total,
      has_prev: page > 1,
      ..Default::default()
    };

    for key in &listing.keys {
      if self.store.document_id_of(key).is_none() {
        warn!(key, "skipping object that is not a build document");
        continue;
      }
      let doc = match self.store.load(key) {
        Ok(doc) => doc,
        Err(err) => {
          warn!(key, error = %err, "skipping unreadable build document");
          continue;
        }
      };
      let (mut record, errors) = schema::decode(&doc, self.log_level);
      record.build_log = None;
      if !errors.is_empty() {
        debug!(key, errors = %errors, "including build record that does not validate");
        let name = if record.build_id.is_empty() {
          key.rsplit('/').next().unwrap_or(key).to_string()
        } else {
          record.build_id.clone()
        };
        result.errors.insert(name, errors);
      }
      result.build_info.push(record);
    }

    let seen = position.seen + listing.keys.len();
    result.has_next = seen < position.total && listing.resume_token.is_some();
    if result.has_next {
      let next = PageCursor {
        page: page + 1,
        resume_token: listing.resume_token,
        total: position.total,
        seen,
      };
      result.next_cursor = Some(next.encode());
    }

    debug!(
      page,
      items = result.build_info.len(),
      total = result.total,
      has_next = result.has_next,
      "paginated build records"
    );
    Ok(result)
  }
}
