//! Integration tests for `SqliteStore` against an in-memory database.

use std::{
  collections::HashMap,
  convert::Infallible,
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use chrono::Utc;
use dossier_core::{
  document::{
    ApprovalOverride, Document, DocumentStatus, DocumentType, FileDescriptor,
    NewDocument, ReviewDecision,
  },
  entity::EntityRef,
  intake::{BlobStore, Intake, IntakeError, UploadRequest},
  relation::RelationContext,
  store::{DocumentStore, RelationStore, SnapshotStore},
  timeline::TimelineEventKind,
  validity::IntegrityIssue,
};
use rusqlite::params;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn file(name: &str) -> FileDescriptor {
  FileDescriptor {
    name:       name.into(),
    path:       format!("test/{name}"),
    mime_type:  "application/pdf".into(),
    size_bytes: 1024,
    checksum:   "00".repeat(32),
  }
}

fn new_doc(owner: EntityRef, document_type: DocumentType) -> NewDocument {
  NewDocument::new(Uuid::nil(), owner, document_type, file("scan.pdf"))
}

async fn upload(
  s: &SqliteStore,
  owner: EntityRef,
  document_type: DocumentType,
) -> Document {
  s.ingest(new_doc(owner, document_type), None, None)
    .await
    .unwrap()
}

async fn count_active(
  s: &SqliteStore,
  owner: EntityRef,
  document_type: DocumentType,
) -> i64 {
  s.conn
    .call(move |conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM documents
         WHERE owner_type = ?1 AND owner_id = ?2 AND document_type = ?3
           AND is_active = 1",
        params![
          owner.kind.as_ref(),
          owner.id.hyphenated().to_string(),
          document_type.as_ref()
        ],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap()
}

// ─── Activation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_upload_is_activated() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::ProofOfAddress).await;
  assert!(a.is_active);
  assert!(a.valid_to.is_none());
  assert!(a.valid_from.is_some());
  assert_eq!(a.status, DocumentStatus::Pending);
  assert_eq!(a.version_number, 1);
}

#[tokio::test]
async fn inserted_document_starts_inactive() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let doc = s
    .insert_document(new_doc(owner, DocumentType::Payslip))
    .await
    .unwrap();
  assert!(!doc.is_active);
  assert!(doc.valid_from.is_none());
  assert!(s.active_documents(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn activate_deactivates_sibling_without_superseding_it() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Payslip).await;
  let b = s
    .insert_document(new_doc(owner, DocumentType::Payslip))
    .await
    .unwrap();

  let b = s.activate(b.document_id).await.unwrap();
  assert!(b.is_active);

  let a = s.get_document(a.document_id).await.unwrap().unwrap();
  assert!(!a.is_active);
  assert!(a.valid_to.is_some());
  assert_eq!(a.status, DocumentStatus::Pending);
  assert!(a.superseded_by_id.is_none());
  assert_eq!(count_active(&s, owner, DocumentType::Payslip).await, 1);
}

#[tokio::test]
async fn backdated_valid_from_is_kept_on_activation() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let from = crate::encode::now() - chrono::Duration::days(30);

  let mut input = new_doc(owner, DocumentType::BankStatement);
  input.valid_from = Some(from);
  let doc = s.ingest(input, None, None).await.unwrap();
  assert_eq!(doc.valid_from, Some(from));
}

#[tokio::test]
async fn future_valid_from_is_rejected() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let from = Utc::now() + chrono::Duration::days(1);

  let mut input = new_doc(owner, DocumentType::ProofOfAddress);
  input.valid_from = Some(from);
  let err = s.ingest(input, None, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::FutureValidity { valid_from, .. }) if valid_from == from
  ));
  assert!(
    s.history_by_type(owner, DocumentType::ProofOfAddress)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn replaced_backdated_document_keeps_an_ordered_interval() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let mut input = new_doc(owner, DocumentType::ProofOfAddress);
  input.valid_from = Some(crate::encode::now() - chrono::Duration::days(1));
  let a = s.ingest(input, None, None).await.unwrap();
  let b = upload(&s, owner, DocumentType::ProofOfAddress).await;

  let a = s.get_document(a.document_id).await.unwrap().unwrap();
  assert!(a.valid_to.unwrap() >= a.valid_from.unwrap());
  assert!(s.integrity_anomalies().await.unwrap().is_empty());

  let valid = s.currently_valid(owner).await.unwrap();
  let at_now = s.valid_at(owner, None, Utc::now()).await.unwrap();
  assert_eq!(ids(&valid), vec![b.document_id]);
  assert_eq!(ids(&at_now), vec![b.document_id]);
}

#[tokio::test]
async fn oversized_file_is_rejected() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let mut input = new_doc(owner, DocumentType::BankStatement);
  input.file.size_bytes = u64::MAX;
  let err = s.insert_document(input).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::FileTooLarge(size)) if size == u64::MAX
  ));
}

#[tokio::test]
async fn unique_index_rejection_is_a_retryable_constraint_violation() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  upload(&s, owner, DocumentType::Payslip).await;
  let b = s
    .insert_document(new_doc(owner, DocumentType::Payslip))
    .await
    .unwrap();

  // A stale copy naming another owner makes the sibling sweep miss the real
  // slot, leaving the partial unique index to refuse the second active row.
  let mut stale = b.clone();
  stale.owner = EntityRef::applicant(Uuid::new_v4());
  let err = s
    .conn
    .call(move |conn| {
      let tx = conn.transaction()?;
      crate::ops::activate(&tx, &stale, crate::encode::now())?;
      tx.commit()?;
      Ok(())
    })
    .await
    .map_err(Error::from)
    .unwrap_err();

  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::ConstraintViolation {
      document_type: DocumentType::Payslip,
      ..
    })
  ));
  assert!(err.is_retryable());
  assert_eq!(count_active(&s, owner, DocumentType::Payslip).await, 1);
  let b = s.get_document(b.document_id).await.unwrap().unwrap();
  assert!(!b.is_active);
}

#[tokio::test]
async fn superseded_document_cannot_be_reactivated() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Selfie).await;
  upload(&s, owner, DocumentType::Selfie).await;

  let err = s.activate(a.document_id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::NotActivatable(id)) if id == a.document_id
  ));
}

// Writers queue on `BEGIN IMMEDIATE`, so both calls normally succeed and the
// later one wins; only a busy timeout fails, and that is retryable.
#[tokio::test]
async fn racing_activations_serialise_to_one_active() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("dossier.db");
  let first = SqliteStore::open(&path).await.unwrap();
  let second = SqliteStore::open(&path).await.unwrap();
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = first
    .insert_document(new_doc(owner, DocumentType::IdentityFront))
    .await
    .unwrap();
  let b = first
    .insert_document(new_doc(owner, DocumentType::IdentityFront))
    .await
    .unwrap();

  let (ra, rb) = tokio::join!(
    first.activate(a.document_id),
    second.activate(b.document_id)
  );

  let results = [ra, rb];
  assert!(results.iter().any(Result::is_ok));
  for result in &results {
    if let Err(e) = result {
      assert!(e.is_retryable(), "unexpected error: {e}");
    }
  }
  assert_eq!(count_active(&first, owner, DocumentType::IdentityFront).await, 1);
}

// ─── Supersession ────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_upload_supersedes_the_first() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::ProofOfAddress).await;
  let b = upload(&s, owner, DocumentType::ProofOfAddress).await;

  let a = s.get_document(a.document_id).await.unwrap().unwrap();
  assert_eq!(a.status, DocumentStatus::Superseded);
  assert!(!a.is_active);
  assert!(a.valid_to.is_some());
  assert_eq!(a.superseded_by_id, Some(b.document_id));

  assert!(b.is_active);
  assert_eq!(b.version_number, 2);
  assert_eq!(b.previous_version_id, Some(a.document_id));
  assert_eq!(a.valid_to, b.valid_from);
}

#[tokio::test]
async fn supersede_with_links_explicit_pair() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Payslip).await;
  let b = s
    .insert_document(new_doc(owner, DocumentType::Payslip))
    .await
    .unwrap();

  let sup = s
    .supersede_with(a.document_id, b.document_id, Some("newer payslip".into()), None)
    .await
    .unwrap();
  assert_eq!(sup.old.replacement_reason.as_deref(), Some("newer payslip"));
  assert_eq!(sup.old.superseded_by_id, Some(b.document_id));
  assert!(sup.new.is_active);
  assert_eq!(sup.new.version_number, 2);
}

#[tokio::test]
async fn supersede_requires_active_old_document() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = s
    .insert_document(new_doc(owner, DocumentType::Payslip))
    .await
    .unwrap();
  let b = s
    .insert_document(new_doc(owner, DocumentType::Payslip))
    .await
    .unwrap();

  let err = s
    .supersede_with(a.document_id, b.document_id, None, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(dossier_core::Error::NotActive(_))));
}

#[tokio::test]
async fn supersede_rejects_type_mismatch() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Payslip).await;
  let b = s
    .insert_document(new_doc(owner, DocumentType::Selfie))
    .await
    .unwrap();

  let err = s
    .supersede_with(a.document_id, b.document_id, None, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::TypeMismatch { .. })
  ));
}

#[tokio::test]
async fn supersede_rejects_self_and_chained_targets() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Payslip).await;
  let err = s
    .supersede_with(a.document_id, a.document_id, None, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(dossier_core::Error::SelfSupersession)));

  let b = upload(&s, owner, DocumentType::Payslip).await;
  let c = upload(&s, owner, DocumentType::Payslip).await;
  // `b` already sits in the chain behind `c`.
  let err = s
    .supersede_with(c.document_id, b.document_id, None, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::AlreadyChained(id)) if id == b.document_id
  ));
}

#[tokio::test]
async fn approved_document_needs_override() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let reviewer = Uuid::new_v4();

  let a = upload(&s, owner, DocumentType::IdentityFront).await;
  let a = s
    .review(a.document_id, ReviewDecision::Approve { reviewer, notes: None })
    .await
    .unwrap();
  assert_eq!(a.status, DocumentStatus::Approved);

  let err = s
    .ingest(new_doc(owner, DocumentType::IdentityFront), None, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::ApprovedDocumentImmutable(id)) if id == a.document_id
  ));

  // No partial state: `a` untouched and the rejected upload left no row.
  let after = s.get_document(a.document_id).await.unwrap().unwrap();
  assert_eq!(after, a);
  let history = s
    .history_by_type(owner, DocumentType::IdentityFront)
    .await
    .unwrap();
  assert_eq!(history.len(), 1);

  let b = s
    .ingest(
      new_doc(owner, DocumentType::IdentityFront),
      Some("re-issued card".into()),
      Some(ApprovalOverride { authorized_by: reviewer }),
    )
    .await
    .unwrap();
  assert_eq!(b.version_number, 2);
  let a = s.get_document(a.document_id).await.unwrap().unwrap();
  assert_eq!(a.status, DocumentStatus::Superseded);
  assert_eq!(a.replacement_authorized_by, Some(reviewer));
}

#[tokio::test]
async fn superseded_document_is_not_reviewable() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Payslip).await;
  upload(&s, owner, DocumentType::Payslip).await;

  let err = s
    .review(
      a.document_id,
      ReviewDecision::Reject { reviewer: Uuid::new_v4(), notes: None },
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(dossier_core::Error::NotReviewable(_))));
}

// ─── Chains ──────────────────────────────────────────────────────────────────

async fn five_versions(s: &SqliteStore, owner: EntityRef) -> Vec<Document> {
  let mut versions = Vec::new();
  for _ in 0..5 {
    versions.push(upload(s, owner, DocumentType::ProofOfAddress).await);
  }
  versions
}

fn ids(docs: &[Document]) -> Vec<Uuid> {
  docs.iter().map(|d| d.document_id).collect()
}

#[tokio::test]
async fn chain_of_five_resolves_in_order() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let versions = five_versions(&s, owner).await;

  let chain = s
    .supersession_chain(versions[0].document_id)
    .await
    .unwrap();
  assert_eq!(ids(&chain), ids(&versions));
  let numbers: Vec<u32> = chain.iter().map(|d| d.version_number).collect();
  assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

  let mut fastest = Duration::MAX;
  for _ in 0..5 {
    let started = Instant::now();
    s.supersession_chain(versions[0].document_id).await.unwrap();
    fastest = fastest.min(started.elapsed());
  }
  assert!(fastest < Duration::from_millis(10), "took {fastest:?}");
}

#[tokio::test]
async fn head_chain_is_reverse_of_tail_reverse_chain() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let versions = five_versions(&s, owner).await;

  let forward = s
    .supersession_chain(versions[0].document_id)
    .await
    .unwrap();
  let mut backward = s
    .reverse_supersession_chain(versions[4].document_id)
    .await
    .unwrap();
  backward.reverse();
  assert_eq!(ids(&forward), ids(&backward));
}

#[tokio::test]
async fn complete_history_from_the_middle() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let versions = five_versions(&s, owner).await;

  let forward = s
    .supersession_chain(versions[2].document_id)
    .await
    .unwrap();
  assert_eq!(ids(&forward), ids(&versions[2..]));

  let backward = s
    .reverse_supersession_chain(versions[2].document_id)
    .await
    .unwrap();
  let mut expected = ids(&versions[..3]);
  expected.reverse();
  assert_eq!(ids(&backward), expected);

  let complete = s
    .complete_history_chain(versions[2].document_id)
    .await
    .unwrap();
  assert_eq!(ids(&complete), ids(&versions));
}

#[tokio::test]
async fn chain_of_missing_document_is_not_found() {
  let s = store().await;
  let err = s.supersession_chain(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::DocumentNotFound(_))
  ));
}

// ─── Validity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn valid_at_returns_superseded_version_inside_its_window() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::ProofOfAddress).await;
  let inside = a.valid_from.unwrap();
  tokio::time::sleep(Duration::from_millis(5)).await;
  let b = upload(&s, owner, DocumentType::ProofOfAddress).await;

  let then = s
    .valid_at(owner, Some(DocumentType::ProofOfAddress), inside)
    .await
    .unwrap();
  assert_eq!(ids(&then), vec![a.document_id]);

  let now = s
    .valid_at(owner, Some(DocumentType::ProofOfAddress), Utc::now())
    .await
    .unwrap();
  assert_eq!(ids(&now), vec![b.document_id]);

  let before = s
    .valid_at(owner, None, inside - chrono::Duration::seconds(1))
    .await
    .unwrap();
  assert!(before.is_empty());
}

#[tokio::test]
async fn currently_valid_matches_active_documents() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  upload(&s, owner, DocumentType::IdentityFront).await;
  upload(&s, owner, DocumentType::IdentityBack).await;
  upload(&s, owner, DocumentType::Payslip).await;
  upload(&s, owner, DocumentType::Payslip).await;
  s.insert_document(new_doc(owner, DocumentType::Selfie))
    .await
    .unwrap();

  let valid = s.currently_valid(owner).await.unwrap();
  let active = s.active_documents(owner).await.unwrap();
  assert_eq!(ids(&valid), ids(&active));
  assert_eq!(valid.len(), 3);

  let at_now = s.valid_at(owner, None, Utc::now()).await.unwrap();
  let mut a = ids(&at_now);
  let mut b = ids(&valid);
  a.sort();
  b.sort();
  assert_eq!(a, b);
}

#[tokio::test]
async fn inverted_interval_is_skipped_and_reported() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Payslip).await;
  let b = upload(&s, owner, DocumentType::Payslip).await;

  let id = a.document_id.hyphenated().to_string();
  s.conn
    .call(move |conn| {
      conn.execute(
        "UPDATE documents SET valid_to = '2000-01-01T00:00:00.000000Z'
         WHERE document_id = ?1",
        params![id],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let found = s
    .valid_at(owner, Some(DocumentType::Payslip), Utc::now())
    .await
    .unwrap();
  assert_eq!(ids(&found), vec![b.document_id]);

  let anomalies = s.integrity_anomalies().await.unwrap();
  assert_eq!(anomalies.len(), 1);
  assert_eq!(anomalies[0].document_id, a.document_id);
  assert!(matches!(
    anomalies[0].issue,
    IntegrityIssue::InvertedInterval { .. }
  ));
}

#[tokio::test]
async fn active_rows_never_have_valid_to() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  for _ in 0..3 {
    upload(&s, owner, DocumentType::BankStatement).await;
  }
  upload(&s, owner, DocumentType::Selfie).await;

  for doc in s.documents_for_owner(owner, true).await.unwrap() {
    if doc.is_active {
      assert!(doc.valid_to.is_none());
    }
  }
  assert_eq!(count_active(&s, owner, DocumentType::BankStatement).await, 1);
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_frees_the_slot_and_hides_the_row() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());

  let a = upload(&s, owner, DocumentType::Selfie).await;
  let a = s.soft_delete(a.document_id).await.unwrap();
  assert!(a.is_deleted());
  assert!(!a.is_active);
  assert!(a.valid_to.is_some());

  assert!(s.documents_for_owner(owner, false).await.unwrap().is_empty());
  assert_eq!(s.documents_for_owner(owner, true).await.unwrap().len(), 1);

  let b = upload(&s, owner, DocumentType::Selfie).await;
  assert_eq!(b.version_number, 1);
  assert!(b.previous_version_id.is_none());
}

// ─── Relations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn attach_is_idempotent() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let doc = upload(&s, owner, DocumentType::Payslip).await;

  let first = s
    .attach(doc.document_id, owner, RelationContext::Ownership, None)
    .await
    .unwrap();
  let second = s
    .attach(doc.document_id, owner, RelationContext::Ownership, None)
    .await
    .unwrap();
  assert_eq!(first, second);
  assert_eq!(
    s.relations_for_document(doc.document_id).await.unwrap().len(),
    1
  );
}

#[tokio::test]
async fn detach_and_reattach_revives_the_row() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let application = EntityRef::loan_application(Uuid::new_v4());
  let doc = upload(&s, owner, DocumentType::Payslip).await;

  let rel = s
    .attach(doc.document_id, application, RelationContext::Reference, None)
    .await
    .unwrap();
  assert!(
    s.detach(doc.document_id, application, RelationContext::Reference)
      .await
      .unwrap()
  );
  assert!(
    !s.detach(doc.document_id, application, RelationContext::Reference)
      .await
      .unwrap()
  );
  assert!(
    s.relations_for_relatable(application, None)
      .await
      .unwrap()
      .is_empty()
  );

  let revived = s
    .attach(doc.document_id, application, RelationContext::Reference, None)
    .await
    .unwrap();
  assert_eq!(revived.relation_id, rel.relation_id);
  assert!(!revived.is_detached());
}

#[tokio::test]
async fn relations_filter_by_context() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let application = EntityRef::loan_application(Uuid::new_v4());
  let doc = upload(&s, owner, DocumentType::Payslip).await;

  s.attach(doc.document_id, application, RelationContext::Usage, None)
    .await
    .unwrap();
  s.attach(doc.document_id, application, RelationContext::Reference, None)
    .await
    .unwrap();

  let usage = s
    .relations_for_relatable(application, Some(RelationContext::Usage))
    .await
    .unwrap();
  assert_eq!(usage.len(), 1);
  assert_eq!(usage[0].context, RelationContext::Usage);
  assert_eq!(
    s.relations_for_relatable(application, None).await.unwrap().len(),
    2
  );
}

#[tokio::test]
async fn attach_to_missing_document_is_orphan() {
  let s = store().await;
  let err = s
    .attach(
      Uuid::new_v4(),
      EntityRef::applicant(Uuid::new_v4()),
      RelationContext::Ownership,
      None,
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::OrphanReference(_))
  ));
}

#[tokio::test]
async fn force_delete_cascades_relations() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let doc = upload(&s, owner, DocumentType::Payslip).await;
  s.attach(doc.document_id, owner, RelationContext::Ownership, None)
    .await
    .unwrap();

  s.force_delete(doc.document_id).await.unwrap();
  assert!(s.get_document(doc.document_id).await.unwrap().is_none());
  assert!(
    s.relations_for_relatable(owner, None)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn force_deleting_a_middle_version_relinks_the_chain() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let versions = five_versions(&s, owner).await;

  s.force_delete(versions[2].document_id).await.unwrap();

  let before = s
    .get_document(versions[1].document_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(before.status, DocumentStatus::Superseded);
  assert_eq!(before.superseded_by_id, Some(versions[3].document_id));
  let after = s
    .get_document(versions[3].document_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.previous_version_id, Some(versions[1].document_id));

  let complete = s
    .complete_history_chain(versions[0].document_id)
    .await
    .unwrap();
  let expected: Vec<Uuid> = [0, 1, 3, 4]
    .iter()
    .map(|&i| versions[i].document_id)
    .collect();
  assert_eq!(ids(&complete), expected);
  assert!(s.integrity_anomalies().await.unwrap().is_empty());
}

#[tokio::test]
async fn chain_is_purged_oldest_first() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let versions = five_versions(&s, owner).await;

  let newest = versions[4].document_id;
  let err = s.force_delete(newest).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(dossier_core::Error::ChainTail(id)) if id == newest
  ));
  assert!(s.get_document(newest).await.unwrap().is_some());

  for v in &versions {
    s.force_delete(v.document_id).await.unwrap();
    assert!(s.integrity_anomalies().await.unwrap().is_empty());
  }
  assert!(
    s.history_by_type(owner, DocumentType::ProofOfAddress)
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

const REQUIRED: &[DocumentType] = &[
  DocumentType::IdentityFront,
  DocumentType::ProofOfAddress,
  DocumentType::Payslip,
];

#[tokio::test]
async fn snapshot_is_idempotent() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let decision = EntityRef::credit_decision(Uuid::new_v4());
  upload(&s, owner, DocumentType::IdentityFront).await;
  upload(&s, owner, DocumentType::ProofOfAddress).await;

  let first = s.create_snapshot(decision, owner, REQUIRED).await.unwrap();
  let second = s.create_snapshot(decision, owner, REQUIRED).await.unwrap();

  assert_eq!(first.entries, second.entries);
  assert_eq!(first.missing_types, vec![DocumentType::Payslip]);
  assert!(!first.is_complete());

  let usage = s
    .relations_for_relatable(decision, Some(RelationContext::Usage))
    .await
    .unwrap();
  assert_eq!(usage.len(), 2);
  let ownership = s
    .relations_for_relatable(owner, Some(RelationContext::Ownership))
    .await
    .unwrap();
  assert_eq!(ownership.len(), 2);
}

#[tokio::test]
async fn snapshot_survives_later_supersession() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let decision = EntityRef::credit_decision(Uuid::new_v4());
  let a = upload(&s, owner, DocumentType::ProofOfAddress).await;

  let snapshot = s
    .create_snapshot(decision, owner, &[DocumentType::ProofOfAddress])
    .await
    .unwrap();
  assert_eq!(snapshot.document_ids().collect::<Vec<_>>(), vec![a.document_id]);

  let b = upload(&s, owner, DocumentType::ProofOfAddress).await;

  let frozen = s.frozen_documents(decision).await.unwrap();
  assert_eq!(ids(&frozen), vec![a.document_id]);
  assert_eq!(frozen[0].status, DocumentStatus::Superseded);

  // A fresh snapshot for another decision picks up the new version.
  let later = EntityRef::credit_decision(Uuid::new_v4());
  let snapshot = s
    .create_snapshot(later, owner, &[DocumentType::ProofOfAddress])
    .await
    .unwrap();
  assert_eq!(snapshot.document_ids().collect::<Vec<_>>(), vec![b.document_id]);
  let frozen = s.frozen_documents(decision).await.unwrap();
  assert_eq!(ids(&frozen), vec![a.document_id]);
}

// ─── Timeline ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn timeline_covers_the_whole_chain() {
  let s = store().await;
  let owner = EntityRef::applicant(Uuid::new_v4());
  let a = upload(&s, owner, DocumentType::Payslip).await;
  let b = upload(&s, owner, DocumentType::Payslip).await;

  let events = s.timeline(owner).await.unwrap();
  assert!(events.windows(2).all(|w| w[0].at <= w[1].at));
  assert!(events.iter().any(|e| e.document_id == a.document_id
    && e.kind == TimelineEventKind::Superseded { by: Some(b.document_id) }));
  assert_eq!(
    events
      .iter()
      .filter(|e| e.kind == TimelineEventKind::Uploaded)
      .count(),
    2
  );
}

// ─── Intake ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryBlobs {
  objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobs {
  fn len(&self) -> usize { self.objects.lock().unwrap().len() }
}

impl BlobStore for MemoryBlobs {
  type Error = Infallible;

  async fn put<'a>(
    &'a self,
    key: &'a str,
    bytes: &'a [u8],
  ) -> Result<(), Infallible> {
    self
      .objects
      .lock()
      .unwrap()
      .insert(key.to_owned(), bytes.to_vec());
    Ok(())
  }

  async fn delete<'a>(&'a self, key: &'a str) -> Result<(), Infallible> {
    self.objects.lock().unwrap().remove(key);
    Ok(())
  }
}

fn upload_request(owner: EntityRef, bytes: &[u8]) -> UploadRequest {
  UploadRequest {
    tenant_id:          Uuid::nil(),
    owner,
    document_type:      DocumentType::ProofOfAddress,
    category:           None,
    file_name:          "utility-bill.pdf".into(),
    mime_type:          "application/pdf".into(),
    bytes:              bytes.to_vec(),
    valid_from:         None,
    uploaded_by:        None,
    replacement_reason: None,
    approval:           None,
  }
}

#[tokio::test]
async fn intake_uploads_and_purges() {
  let store = Arc::new(store().await);
  let blobs = Arc::new(MemoryBlobs::default());
  let intake = Intake::new(store.clone(), blobs.clone());
  let owner = EntityRef::applicant(Uuid::new_v4());

  let doc = intake.upload(upload_request(owner, b"abc")).await.unwrap();
  assert!(doc.is_active);
  assert_eq!(doc.file.size_bytes, 3);
  assert_eq!(doc.file.checksum.len(), 64);
  assert_eq!(blobs.len(), 1);

  intake.purge(doc.document_id).await.unwrap();
  assert_eq!(blobs.len(), 0);
  assert!(store.get_document(doc.document_id).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_intake_removes_the_blob() {
  let store = Arc::new(store().await);
  let blobs = Arc::new(MemoryBlobs::default());
  let intake = Intake::new(store.clone(), blobs.clone());
  let owner = EntityRef::applicant(Uuid::new_v4());

  let first = intake.upload(upload_request(owner, b"v1")).await.unwrap();
  store
    .review(first.document_id, ReviewDecision::Approve {
      reviewer: Uuid::new_v4(),
      notes:    None,
    })
    .await
    .unwrap();

  let err = intake
    .upload(upload_request(owner, b"v2"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    IntakeError::Store(Error::Core(
      dossier_core::Error::ApprovedDocumentImmutable(_)
    ))
  ));
  assert_eq!(blobs.len(), 1);
}
