//! Upload and purge orchestration across the byte store and the document
//! store.
//!
//! Bytes are written before the metadata transaction and deleted after it, so
//! no file I/O ever happens while a database transaction is open.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  document::{
    ApprovalOverride, Document, DocumentCategory, DocumentType, FileDescriptor,
    NewDocument,
  },
  entity::EntityRef,
  store::DocumentStore,
};

/// External byte storage. Only keys ever reach the document store.
pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn put<'a>(
    &'a self,
    key: &'a str,
    bytes: &'a [u8],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

#[derive(Debug, Error)]
pub enum IntakeError<S, B>
where
  S: std::error::Error + 'static,
  B: std::error::Error + 'static,
{
  #[error("store error: {0}")]
  Store(#[source] S),

  #[error("blob storage error: {0}")]
  Blob(#[source] B),
}

/// A file as received from an uploader.
#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub tenant_id:          Uuid,
  pub owner:              EntityRef,
  pub document_type:      DocumentType,
  pub category:           Option<DocumentCategory>,
  pub file_name:          String,
  pub mime_type:          String,
  pub bytes:              Vec<u8>,
  pub valid_from:         Option<DateTime<Utc>>,
  pub uploaded_by:        Option<Uuid>,
  pub replacement_reason: Option<String>,
  pub approval:           Option<ApprovalOverride>,
}

/// SHA-256 hex digest used as the file checksum.
pub fn checksum(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

/// Storage key for a new object. Unique per upload so a failed upload never
/// clobbers an existing version's bytes.
pub fn object_key(tenant_id: Uuid, owner: &EntityRef) -> String {
  format!(
    "{tenant_id}/{}/{}/{}",
    owner.kind.as_ref(),
    owner.id,
    Uuid::new_v4()
  )
}

pub struct Intake<S, B> {
  store: Arc<S>,
  blobs: Arc<B>,
}

impl<S, B> Intake<S, B>
where
  S: DocumentStore,
  B: BlobStore,
{
  pub fn new(store: Arc<S>, blobs: Arc<B>) -> Self { Self { store, blobs } }

  pub fn store(&self) -> &S { &self.store }

  /// Store the bytes, then record and activate (or supersede into) the new
  /// version. On a metadata failure the bytes are removed again and the
  /// store error is returned.
  pub async fn upload(
    &self,
    req: UploadRequest,
  ) -> Result<Document, IntakeError<S::Error, B::Error>> {
    let key = object_key(req.tenant_id, &req.owner);
    let file = FileDescriptor {
      name:       req.file_name,
      path:       key.clone(),
      mime_type:  req.mime_type,
      size_bytes: req.bytes.len() as u64,
      checksum:   checksum(&req.bytes),
    };

    self
      .blobs
      .put(&key, &req.bytes)
      .await
      .map_err(IntakeError::Blob)?;

    let mut input =
      NewDocument::new(req.tenant_id, req.owner, req.document_type, file);
    if let Some(category) = req.category {
      input.category = category;
    }
    input.valid_from = req.valid_from;
    input.uploaded_by = req.uploaded_by;

    match self
      .store
      .ingest(input, req.replacement_reason, req.approval)
      .await
    {
      Ok(doc) => {
        tracing::info!(
          document_id = %doc.document_id,
          owner = %doc.owner,
          document_type = %doc.document_type,
          version = doc.version_number,
          "document uploaded"
        );
        Ok(doc)
      }
      Err(e) => {
        if let Err(cleanup) = self.blobs.delete(&key).await {
          tracing::warn!(%key, error = %cleanup, "orphaned blob after failed upload");
        }
        Err(IntakeError::Store(e))
      }
    }
  }

  /// Force-delete a document and then its bytes.
  pub async fn purge(
    &self,
    document_id: Uuid,
  ) -> Result<Document, IntakeError<S::Error, B::Error>> {
    let doc = self
      .store
      .force_delete(document_id)
      .await
      .map_err(IntakeError::Store)?;
    self
      .blobs
      .delete(&doc.file.path)
      .await
      .map_err(IntakeError::Blob)?;
    tracing::info!(document_id = %doc.document_id, "document purged");
    Ok(doc)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn checksum_is_sha256_hex() {
    assert_eq!(
      checksum(b"abc"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn object_keys_are_unique_per_upload() {
    let owner = EntityRef::applicant(Uuid::new_v4());
    let tenant = Uuid::new_v4();
    let a = object_key(tenant, &owner);
    let b = object_key(tenant, &owner);
    assert_ne!(a, b);
    assert!(a.starts_with(&format!("{tenant}/applicant/{}/", owner.id)));
  }
}
