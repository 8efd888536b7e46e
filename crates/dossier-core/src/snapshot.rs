//! Snapshot records: the document set a business decision was based on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{document::DocumentType, entity::EntityRef};

/// One frozen reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
  pub document_type:  DocumentType,
  pub document_id:    Uuid,
  pub version_number: u32,
  pub ownership_id:   Uuid,
  pub usage_id:       Uuid,
}

/// The result of freezing an owner's current documents for a decision.
///
/// The entries point at specific document versions through usage relations;
/// nothing that happens to those documents later changes what a snapshot
/// refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  pub decision:      EntityRef,
  pub owner:         EntityRef,
  pub taken_at:      DateTime<Utc>,
  pub entries:       Vec<SnapshotEntry>,
  /// Required types for which the owner had no currently valid document.
  pub missing_types: Vec<DocumentType>,
}

impl Snapshot {
  pub fn is_complete(&self) -> bool { self.missing_types.is_empty() }

  pub fn document_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
    self.entries.iter().map(|e| e.document_id)
  }
}
