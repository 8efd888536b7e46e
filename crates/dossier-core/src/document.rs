//! Document types: the versioned record at the heart of the engine.
//!
//! A document row is born pending and inactive. It becomes the authoritative
//! version for its (owner, type) pair through activation or supersession, and
//! once superseded its lifecycle fields are frozen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{entity::EntityRef, validity::ValidityInterval};

// ─── Classification ──────────────────────────────────────────────────────────

/// What a document is. Together with the owner this is the key of the
/// one-active-document invariant.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
  IdentityFront,
  IdentityBack,
  ProofOfAddress,
  Payslip,
  BankStatement,
  Selfie,
  TaxReturn,
  EmploymentLetter,
  Other,
}

/// Coarse grouping used for filing and reporting.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentCategory {
  Identity,
  Residence,
  Income,
  Biometric,
  Supporting,
}

impl DocumentType {
  /// The category a document of this type is filed under unless the uploader
  /// says otherwise.
  pub fn default_category(self) -> DocumentCategory {
    match self {
      Self::IdentityFront | Self::IdentityBack => DocumentCategory::Identity,
      Self::ProofOfAddress => DocumentCategory::Residence,
      Self::Payslip
      | Self::BankStatement
      | Self::TaxReturn
      | Self::EmploymentLetter => DocumentCategory::Income,
      Self::Selfie => DocumentCategory::Biometric,
      Self::Other => DocumentCategory::Supporting,
    }
  }
}

/// Review state of a document.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
  /// Terminal: replaced by a newer version.
  Superseded,
}

// ─── File ────────────────────────────────────────────────────────────────────

/// Where the bytes live. The engine never reads the file itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
  pub name:       String,
  /// Key in the external byte store.
  pub path:       String,
  pub mime_type:  String,
  pub size_bytes: u64,
  /// SHA-256 hex digest of the content.
  pub checksum:   String,
}

// ─── Review ──────────────────────────────────────────────────────────────────

/// Outcome of a staff review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
  Approve {
    reviewer: Uuid,
    notes:    Option<String>,
  },
  Reject {
    reviewer: Uuid,
    notes:    Option<String>,
  },
}

impl ReviewDecision {
  pub fn status(&self) -> DocumentStatus {
    match self {
      Self::Approve { .. } => DocumentStatus::Approved,
      Self::Reject { .. } => DocumentStatus::Rejected,
    }
  }

  pub fn reviewer(&self) -> Uuid {
    match self {
      Self::Approve { reviewer, .. } | Self::Reject { reviewer, .. } => {
        *reviewer
      }
    }
  }

  pub fn notes(&self) -> Option<&str> {
    match self {
      Self::Approve { notes, .. } | Self::Reject { notes, .. } => {
        notes.as_deref()
      }
    }
  }
}

/// Authorisation to replace a document that has already been approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOverride {
  pub authorized_by: Uuid,
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A stored document version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub document_id:               Uuid,
  pub tenant_id:                 Uuid,
  pub owner:                     EntityRef,
  pub document_type:             DocumentType,
  pub category:                  DocumentCategory,
  pub file:                      FileDescriptor,
  pub status:                    DocumentStatus,
  pub is_active:                 bool,
  pub valid_from:                Option<DateTime<Utc>>,
  pub valid_to:                  Option<DateTime<Utc>>,
  pub superseded_by_id:          Option<Uuid>,
  pub previous_version_id:       Option<Uuid>,
  pub version_number:            u32,
  pub replacement_reason:        Option<String>,
  pub replacement_authorized_by: Option<Uuid>,
  pub uploaded_by:               Option<Uuid>,
  pub reviewed_by:               Option<Uuid>,
  pub reviewed_at:               Option<DateTime<Utc>>,
  pub review_notes:              Option<String>,
  pub created_at:                DateTime<Utc>,
  pub updated_at:                DateTime<Utc>,
  pub deleted_at:                Option<DateTime<Utc>>,
}

impl Document {
  /// Whether the document ever held the active slot. Only activated
  /// documents have been on file, whatever `valid_from` says.
  pub fn was_activated(&self) -> bool {
    self.is_active || self.valid_to.is_some()
  }

  /// The interval during which this document was the one on file. Empty for
  /// documents that were never activated.
  pub fn validity(&self) -> ValidityInterval {
    if self.was_activated() {
      ValidityInterval::new(self.valid_from, self.valid_to)
    } else {
      ValidityInterval::new(None, None)
    }
  }

  /// `is_active && (valid_to is null || valid_to > now)`.
  pub fn is_currently_valid(&self, now: DateTime<Utc>) -> bool {
    self.is_active && self.valid_to.is_none_or(|to| to > now)
  }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }

  /// Whether `other` competes with this document for the active slot.
  pub fn same_slot(&self, other: &Document) -> bool {
    self.tenant_id == other.tenant_id
      && self.owner == other.owner
      && self.document_type == other.document_type
  }
}

// ─── NewDocument ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::DocumentStore::insert_document`].
///
/// Lifecycle fields (status, activity, chain links, version) are always set
/// by the store.
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub tenant_id:     Uuid,
  pub owner:         EntityRef,
  pub document_type: DocumentType,
  pub category:      DocumentCategory,
  pub file:          FileDescriptor,
  /// Backdated start of validity; defaults to the activation time.
  pub valid_from:    Option<DateTime<Utc>>,
  pub uploaded_by:   Option<Uuid>,
}

impl NewDocument {
  /// Convenience constructor; the category defaults from the type.
  pub fn new(
    tenant_id: Uuid,
    owner: EntityRef,
    document_type: DocumentType,
    file: FileDescriptor,
  ) -> Self {
    Self {
      tenant_id,
      owner,
      document_type,
      category: document_type.default_category(),
      file,
      valid_from: None,
      uploaded_by: None,
    }
  }
}
