//! Temporal validity: half-open `[valid_from, valid_to)` intervals and the
//! point-in-time selection built on them.
//!
//! Backends fetch candidate rows; the choice of which row answers "what was on
//! file at `at`" is made here so every backend agrees on it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  document::{Document, DocumentType},
  entity::EntityRef,
};

/// The real-world period during which a document was the one on file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityInterval {
  pub from: Option<DateTime<Utc>>,
  pub to:   Option<DateTime<Utc>>,
}

impl ValidityInterval {
  pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
    Self { from, to }
  }

  /// `valid_from > valid_to`: treated as empty.
  pub fn is_inverted(&self) -> bool {
    matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
  }

  /// An interval with no start has never been in force.
  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    if self.is_inverted() {
      return false;
    }
    let Some(from) = self.from else { return false };
    from <= at && self.to.is_none_or(|to| at < to)
  }
}

// ─── Integrity warnings ──────────────────────────────────────────────────────

/// What is wrong with a row flagged for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
  InvertedInterval {
    valid_from: DateTime<Utc>,
    valid_to:   DateTime<Utc>,
  },
  SupersededWithoutSuccessor,
}

/// A non-fatal anomaly in stored data. Reads skip the offending row and keep
/// going; the warning is logged and surfaced through the reconciliation query.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("data integrity warning for document {document_id}: {issue:?}")]
pub struct DataIntegrityWarning {
  pub document_id: Uuid,
  pub issue:       IntegrityIssue,
}

impl DataIntegrityWarning {
  /// Inspect a single document. Returns every issue found.
  pub fn inspect(doc: &Document) -> Vec<Self> {
    let mut found = Vec::new();
    if let (Some(valid_from), Some(valid_to)) = (doc.valid_from, doc.valid_to)
      && valid_from > valid_to
    {
      found.push(Self {
        document_id: doc.document_id,
        issue:       IntegrityIssue::InvertedInterval { valid_from, valid_to },
      });
    }
    if doc.status == crate::document::DocumentStatus::Superseded
      && doc.superseded_by_id.is_none()
    {
      found.push(Self {
        document_id: doc.document_id,
        issue:       IntegrityIssue::SupersededWithoutSuccessor,
      });
    }
    found
  }

  pub fn log(&self) {
    tracing::warn!(
      document_id = %self.document_id,
      issue = ?self.issue,
      "data integrity warning"
    );
  }
}

// ─── Point-in-time selection ─────────────────────────────────────────────────

/// From `candidates`, keep for each (owner, type) the document whose validity
/// interval contains `at`.
///
/// Inverted intervals are logged and skipped. If two rows overlap (which only
/// happens after manual data repair) the one that started later wins, then
/// the higher version. The result is ordered by owner then type.
pub fn select_valid_at(
  candidates: Vec<Document>,
  at: DateTime<Utc>,
) -> Vec<Document> {
  let mut best: HashMap<(EntityRef, DocumentType), Document> = HashMap::new();

  for doc in candidates {
    let interval = doc.validity();
    if interval.is_inverted() {
      for warning in DataIntegrityWarning::inspect(&doc) {
        warning.log();
      }
      continue;
    }
    if !interval.contains(at) {
      continue;
    }

    let key = (doc.owner, doc.document_type);
    match best.get(&key) {
      Some(current)
        if (current.valid_from, current.version_number)
          >= (doc.valid_from, doc.version_number) => {}
      _ => {
        best.insert(key, doc);
      }
    }
  }

  let mut selected: Vec<Document> = best.into_values().collect();
  selected.sort_by(|a, b| {
    (a.owner.kind.as_ref(), a.owner.id, a.document_type).cmp(&(
      b.owner.kind.as_ref(),
      b.owner.id,
      b.document_type,
    ))
  });
  selected
}
