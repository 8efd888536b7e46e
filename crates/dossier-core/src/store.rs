//! The store traits.
//!
//! Implemented by storage backends (e.g. `dossier-store-sqlite`). Higher
//! layers (`dossier-api`, the intake service) depend on these abstractions,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  chain::Supersession,
  document::{
    ApprovalOverride, Document, DocumentType, NewDocument, ReviewDecision,
  },
  entity::EntityRef,
  relation::{DocumentableRelation, RelationContext},
  snapshot::Snapshot,
  timeline::{TimelineEvent, build_timeline},
  validity::DataIntegrityWarning,
};

// ─── Documents ───────────────────────────────────────────────────────────────

/// Versioned document persistence.
///
/// The store is the only writer of `is_active`, `valid_to` and
/// `superseded_by_id`. Every mutating method runs in a single transaction that
/// touches metadata only, and validation failures leave no partial state.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new pending, inactive, version-1 document.
  fn insert_document(
    &self,
    input: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// The upload path: insert `input`, then either activate it (first of its
  /// type for the owner) or supersede the currently active document with it.
  fn ingest(
    &self,
    input: NewDocument,
    reason: Option<String>,
    approval: Option<ApprovalOverride>,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// Make `id` the active document for its (owner, type), deactivating any
  /// other active sibling. Does not change statuses or chain links.
  fn activate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// Replace the active document `old_id` with `new_id`, linking the two and
  /// activating the replacement.
  ///
  /// Fails if `old_id` is not active, the two differ in owner or type,
  /// `old_id` is approved and no override is given, or `new_id` is already
  /// part of a chain.
  fn supersede_with(
    &self,
    old_id: Uuid,
    new_id: Uuid,
    reason: Option<String>,
    approval: Option<ApprovalOverride>,
  ) -> impl Future<Output = Result<Supersession, Self::Error>> + Send + '_;

  /// Record a staff review outcome.
  fn review(
    &self,
    id: Uuid,
    decision: ReviewDecision,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// Mark a document deleted, keeping the row for audit. An active document
  /// loses the active slot.
  fn soft_delete(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// Remove the row and its relations. A middle version's neighbours are
  /// relinked; the newest version of a chain with predecessors is refused.
  /// Returns the removed document so the caller can clean up the stored bytes
  /// after commit.
  fn force_delete(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a document by id, deleted or not. Returns `None` if missing.
  fn get_document(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// `id` followed by every later version, oldest to newest. From the chain
  /// head this is the whole chain; [`Self::complete_history_chain`] gives the
  /// whole chain from any member.
  fn supersession_chain(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// `id` followed by every earlier version, newest to oldest.
  fn reverse_supersession_chain(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Every version in the chain containing `id`, ordered by version number.
  fn complete_history_chain(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// All documents for an owner, optionally including soft-deleted ones,
  /// ordered by type then version.
  fn documents_for_owner(
    &self,
    owner: EntityRef,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Every version of one type for an owner, deleted ones included, ordered
  /// by version.
  fn history_by_type(
    &self,
    owner: EntityRef,
    document_type: DocumentType,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Documents with `is_active = true` for an owner.
  fn active_documents(
    &self,
    owner: EntityRef,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Per type, the document that was on file for `owner` at `at`, including
  /// versions superseded since. `document_type` narrows to a single type.
  fn valid_at(
    &self,
    owner: EntityRef,
    document_type: Option<DocumentType>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Active documents whose validity is open right now.
  fn currently_valid(
    &self,
    owner: EntityRef,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Rows needing reconciliation.
  fn integrity_anomalies(
    &self,
  ) -> impl Future<Output = Result<Vec<DataIntegrityWarning>, Self::Error>>
  + Send
  + '_;

  /// The owner's document history as a flat list of events.
  fn timeline(
    &self,
    owner: EntityRef,
  ) -> impl Future<Output = Result<Vec<TimelineEvent>, Self::Error>> + Send + '_
  {
    async move {
      let docs = self.documents_for_owner(owner, true).await?;
      Ok(build_timeline(&docs))
    }
  }
}

// ─── Relations ───────────────────────────────────────────────────────────────

/// Polymorphic links between documents and business entities.
pub trait RelationStore: DocumentStore {
  /// Idempotent: attaching an existing (document, relatable, context) triple
  /// returns the stored row, reviving it if it had been detached.
  fn attach(
    &self,
    document_id: Uuid,
    relatable: EntityRef,
    context: RelationContext,
    notes: Option<String>,
  ) -> impl Future<Output = Result<DocumentableRelation, Self::Error>> + Send + '_;

  /// Soft-delete the matching relation. Returns `false` if there was nothing
  /// attached.
  fn detach(
    &self,
    document_id: Uuid,
    relatable: EntityRef,
    context: RelationContext,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Attached relations of a document.
  fn relations_for_document(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Vec<DocumentableRelation>, Self::Error>>
  + Send
  + '_;

  /// Attached relations of an entity, optionally narrowed to one context.
  fn relations_for_relatable(
    &self,
    relatable: EntityRef,
    context: Option<RelationContext>,
  ) -> impl Future<Output = Result<Vec<DocumentableRelation>, Self::Error>>
  + Send
  + '_;
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// Freezing document sets for business decisions.
pub trait SnapshotStore: RelationStore {
  /// In one transaction, link each currently valid document of the required
  /// types to `owner` (ownership) and `decision` (usage). Idempotent.
  fn create_snapshot<'a>(
    &'a self,
    decision: EntityRef,
    owner: EntityRef,
    required_types: &'a [DocumentType],
  ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + 'a;

  /// The documents a decision's usage relations point at, as stored.
  fn frozen_documents(
    &self,
    decision: EntityRef,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;
}
