//! Documentable relations: purpose-tagged links between a document and the
//! business entities that own, use or merely mention it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

use crate::entity::EntityRef;

/// Why an entity is linked to a document.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationContext {
  /// The entity the document belongs to (e.g. the applicant).
  Ownership,
  /// A decision or application that relied on the document.
  Usage,
  Reference,
}

/// A persisted relation. Unique on (document, relatable, context).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentableRelation {
  pub relation_id: Uuid,
  pub tenant_id:   Uuid,
  pub document_id: Uuid,
  pub relatable:   EntityRef,
  pub context:     RelationContext,
  pub notes:       Option<String>,
  pub created_at:  DateTime<Utc>,
  pub deleted_at:  Option<DateTime<Utc>>,
}

impl DocumentableRelation {
  pub fn is_detached(&self) -> bool { self.deleted_at.is_some() }
}
