//! Error types for `dossier-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{document::DocumentType, entity::EntityRef};

#[derive(Debug, Error)]
pub enum Error {
  /// Another document for the same owner and type became active first.
  /// The caller should retry.
  #[error("another {document_type} document is already active for {owner}")]
  ConstraintViolation {
    owner:         EntityRef,
    document_type: DocumentType,
  },

  #[error("document {0} is not active")]
  NotActive(Uuid),

  #[error("document {new} does not share owner and type with {old}")]
  TypeMismatch { old: Uuid, new: Uuid },

  #[error("document {0} is already verified; replacing it requires an override")]
  ApprovedDocumentImmutable(Uuid),

  #[error("relation references missing document {0}")]
  OrphanReference(Uuid),

  #[error("document not found: {0}")]
  DocumentNotFound(Uuid),

  #[error("cannot supersede a document with itself")]
  SelfSupersession,

  /// The replacement already belongs to a supersession chain.
  #[error("document {0} is already part of a version chain")]
  AlreadyChained(Uuid),

  #[error("document {0} is superseded or deleted and cannot be reviewed")]
  NotReviewable(Uuid),

  #[error("document {0} is superseded or deleted and cannot be activated")]
  NotActivatable(Uuid),

  /// Validity may be backdated but never start after the upload.
  #[error("{document_type} validity cannot start in the future ({valid_from})")]
  FutureValidity {
    document_type: DocumentType,
    valid_from:    DateTime<Utc>,
  },

  #[error("file size of {0} bytes is out of range")]
  FileTooLarge(u64),

  /// Removing the newest version would leave its predecessor superseded by
  /// nothing. Purge a chain from its oldest version forward.
  #[error("document {0} is the newest version of its chain and has predecessors")]
  ChainTail(Uuid),
}

impl Error {
  /// Whether the failed operation may succeed if simply retried.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::ConstraintViolation { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
