//! Synchronous building blocks run inside `Connection::call` closures.
//!
//! Every function here takes a plain `&Connection`; write paths pass a
//! [`rusqlite::Transaction`] (which derefs to one) so that several helpers
//! compose into a single atomic unit. Domain failures are boxed with
//! [`abort`] and unboxed again by `From<tokio_rusqlite::Error>`.

use chrono::{DateTime, Utc};
use dossier_core::{
  document::{
    ApprovalOverride, Document, DocumentStatus, DocumentType, NewDocument,
  },
  entity::EntityRef,
  relation::{DocumentableRelation, RelationContext},
};
use rusqlite::{Connection, OptionalExtension as _, Params, params};
use uuid::Uuid;

use crate::{
  encode::{
    DOCUMENT_COLUMNS, RELATION_COLUMNS, RawDocument, RawRelation, encode_dt,
    encode_uuid,
  },
  error::{abort, is_unique_violation},
  schema::ONE_ACTIVE_COLUMNS,
};

type CoreError = dossier_core::Error;
type CallResult<T> = tokio_rusqlite::Result<T>;

/// Upper bound on recursive chain walks. Chains are acyclic by construction;
/// this only stops a corrupted graph from looping.
pub const MAX_CHAIN_DEPTH: i64 = 1024;

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn query_documents<P: Params>(
  conn: &Connection,
  sql: &str,
  params: P,
) -> CallResult<Vec<Document>> {
  let mut stmt = conn.prepare_cached(sql)?;
  let raws = stmt
    .query_map(params, RawDocument::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|raw| raw.into_document().map_err(abort))
    .collect()
}

pub fn load_document(conn: &Connection, id: Uuid) -> CallResult<Option<Document>> {
  let raw = conn
    .query_row(
      &format!("SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.document_id = ?1"),
      params![encode_uuid(id)],
      RawDocument::from_row,
    )
    .optional()?;
  raw.map(|r| r.into_document().map_err(abort)).transpose()
}

pub fn require_document(conn: &Connection, id: Uuid) -> CallResult<Document> {
  load_document(conn, id)?.ok_or_else(|| abort(CoreError::DocumentNotFound(id)))
}

/// The active document for a slot, if any.
pub fn active_in_slot(
  conn: &Connection,
  owner: EntityRef,
  document_type: DocumentType,
) -> CallResult<Option<Document>> {
  let mut found = query_documents(
    conn,
    &format!(
      "SELECT {DOCUMENT_COLUMNS} FROM documents d
       WHERE d.owner_type = ?1 AND d.owner_id = ?2
         AND d.document_type = ?3 AND d.is_active = 1"
    ),
    params![owner.kind.as_ref(), encode_uuid(owner.id), document_type.as_ref()],
  )?;
  Ok(found.pop())
}

/// Active documents for `owner` whose validity is still open at `now`.
pub fn currently_valid(
  conn: &Connection,
  owner: EntityRef,
  now: DateTime<Utc>,
) -> CallResult<Vec<Document>> {
  query_documents(
    conn,
    &format!(
      "SELECT {DOCUMENT_COLUMNS} FROM documents d
       WHERE d.owner_type = ?1 AND d.owner_id = ?2
         AND d.is_active = 1
         AND (d.valid_to IS NULL OR d.valid_to > ?3)
         AND d.deleted_at IS NULL
       ORDER BY d.document_type"
    ),
    params![owner.kind.as_ref(), encode_uuid(owner.id), encode_dt(now)],
  )
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Insert a pending, inactive, version-1 row built from `input`.
///
/// `valid_from` may lie in the past but not after `now`; every later
/// deactivation closes the interval at its own `now`, which must not precede
/// the start.
pub fn insert_document(
  conn: &Connection,
  input: NewDocument,
  now: DateTime<Utc>,
) -> CallResult<Document> {
  if let Some(valid_from) = input.valid_from
    && valid_from > now
  {
    return Err(abort(CoreError::FutureValidity {
      document_type: input.document_type,
      valid_from,
    }));
  }
  let size_bytes = i64::try_from(input.file.size_bytes)
    .map_err(|_| abort(CoreError::FileTooLarge(input.file.size_bytes)))?;

  let id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO documents (
       document_id, tenant_id, owner_type, owner_id, document_type, category,
       file_name, file_path, mime_type, size_bytes, checksum,
       status, is_active, valid_from, version_number, uploaded_by,
       created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
               ?12, 0, ?13, 1, ?14, ?15, ?15)",
    params![
      encode_uuid(id),
      encode_uuid(input.tenant_id),
      input.owner.kind.as_ref(),
      encode_uuid(input.owner.id),
      input.document_type.as_ref(),
      input.category.as_ref(),
      input.file.name,
      input.file.path,
      input.file.mime_type,
      size_bytes,
      input.file.checksum,
      DocumentStatus::Pending.as_ref(),
      input.valid_from.map(encode_dt),
      input.uploaded_by.map(encode_uuid),
      encode_dt(now),
    ],
  )?;
  require_document(conn, id)
}

/// Deactivate every other active sibling of `doc`, then activate `doc`.
///
/// The order matters: the partial unique index must never see two active rows
/// for one slot. Returns how many siblings were deactivated.
pub fn activate(
  conn: &Connection,
  doc: &Document,
  now: DateTime<Utc>,
) -> CallResult<usize> {
  if doc.status == DocumentStatus::Superseded || doc.is_deleted() {
    return Err(abort(CoreError::NotActivatable(doc.document_id)));
  }

  let now_str = encode_dt(now);
  let id_str = encode_uuid(doc.document_id);

  let conflict = |e: rusqlite::Error| {
    if is_unique_violation(&e, ONE_ACTIVE_COLUMNS) {
      abort(CoreError::ConstraintViolation {
        owner:         doc.owner,
        document_type: doc.document_type,
      })
    } else {
      e.into()
    }
  };

  let deactivated = conn
    .execute(
      "UPDATE documents
          SET is_active = 0, valid_to = ?1, updated_at = ?1
        WHERE owner_type = ?2 AND owner_id = ?3 AND document_type = ?4
          AND is_active = 1 AND document_id != ?5",
      params![
        now_str,
        doc.owner.kind.as_ref(),
        encode_uuid(doc.owner.id),
        doc.document_type.as_ref(),
        id_str,
      ],
    )
    .map_err(conflict)?;

  conn
    .execute(
      "UPDATE documents
          SET is_active = 1,
              valid_from = COALESCE(valid_from, ?1),
              valid_to = NULL,
              updated_at = ?1
        WHERE document_id = ?2",
      params![now_str, id_str],
    )
    .map_err(conflict)?;

  Ok(deactivated)
}

/// Link `old` → `new`, retire `old` and activate `new`. All validation happens
/// before the first write.
pub fn supersede(
  conn: &Connection,
  old: &Document,
  new: &Document,
  reason: Option<&str>,
  approval: Option<ApprovalOverride>,
  now: DateTime<Utc>,
) -> CallResult<Document> {
  if old.document_id == new.document_id {
    return Err(abort(CoreError::SelfSupersession));
  }
  if !old.is_active {
    return Err(abort(CoreError::NotActive(old.document_id)));
  }
  if !old.same_slot(new) {
    return Err(abort(CoreError::TypeMismatch {
      old: old.document_id,
      new: new.document_id,
    }));
  }
  if old.status == DocumentStatus::Approved && approval.is_none() {
    return Err(abort(CoreError::ApprovedDocumentImmutable(old.document_id)));
  }
  if new.is_active
    || new.status == DocumentStatus::Superseded
    || new.superseded_by_id.is_some()
    || new.previous_version_id.is_some()
  {
    return Err(abort(CoreError::AlreadyChained(new.document_id)));
  }
  if new.is_deleted() {
    return Err(abort(CoreError::NotActivatable(new.document_id)));
  }

  let now_str = encode_dt(now);
  let old_str = encode_uuid(old.document_id);
  let new_str = encode_uuid(new.document_id);

  conn.execute(
    "UPDATE documents
        SET superseded_by_id = ?1,
            status = ?2,
            replacement_reason = ?3,
            replacement_authorized_by = ?4,
            is_active = 0,
            valid_to = COALESCE(valid_to, ?5),
            updated_at = ?5
      WHERE document_id = ?6",
    params![
      new_str,
      DocumentStatus::Superseded.as_ref(),
      reason,
      approval.map(|a| encode_uuid(a.authorized_by)),
      now_str,
      old_str,
    ],
  )?;

  conn.execute(
    "UPDATE documents
        SET version_number = ?1, previous_version_id = ?2, updated_at = ?3
      WHERE document_id = ?4",
    params![i64::from(old.version_number) + 1, old_str, now_str, new_str],
  )?;

  let linked = require_document(conn, new.document_id)?;
  activate(conn, &linked, now)?;
  require_document(conn, new.document_id)
}

/// Close the gap `doc` leaves in its chain before the row is deleted.
///
/// A middle version's neighbours are linked to each other. The newest
/// version of a chain with predecessors is refused with
/// [`CoreError::ChainTail`]; a chain head only loses its successor's back
/// link, which the foreign key clears.
pub fn unlink_from_chain(
  conn: &Connection,
  doc: &Document,
  now: DateTime<Utc>,
) -> CallResult<()> {
  let (prev, next) = match (doc.previous_version_id, doc.superseded_by_id) {
    (Some(prev), Some(next)) => (encode_uuid(prev), encode_uuid(next)),
    (Some(_), None) => return Err(abort(CoreError::ChainTail(doc.document_id))),
    (None, _) => return Ok(()),
  };
  let now_str = encode_dt(now);

  conn.execute(
    "UPDATE documents SET superseded_by_id = ?1, updated_at = ?3
      WHERE document_id = ?2",
    params![next, prev, now_str],
  )?;
  conn.execute(
    "UPDATE documents SET previous_version_id = ?1, updated_at = ?3
      WHERE document_id = ?2",
    params![prev, next, now_str],
  )?;
  Ok(())
}

// ─── Relations ───────────────────────────────────────────────────────────────

/// Upsert a relation keyed on (document, relatable, context). An existing row
/// is returned as is; a detached one is revived.
pub fn attach(
  conn: &Connection,
  doc: &Document,
  relatable: EntityRef,
  context: RelationContext,
  notes: Option<&str>,
  now: DateTime<Utc>,
) -> CallResult<DocumentableRelation> {
  let doc_str = encode_uuid(doc.document_id);
  let rel_id_str = encode_uuid(relatable.id);

  conn
    .execute(
      "INSERT INTO documentable_relations (
         relation_id, tenant_id, document_id, relatable_type, relatable_id,
         relation_context, notes, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT (document_id, relatable_type, relatable_id, relation_context)
       DO UPDATE SET deleted_at = NULL WHERE deleted_at IS NOT NULL",
      params![
        encode_uuid(Uuid::new_v4()),
        encode_uuid(doc.tenant_id),
        doc_str,
        relatable.kind.as_ref(),
        rel_id_str,
        context.as_ref(),
        notes,
        encode_dt(now),
      ],
    )
    .map_err(|e| {
      if is_foreign_key_violation(&e) {
        abort(CoreError::OrphanReference(doc.document_id))
      } else {
        e.into()
      }
    })?;

  let raw = conn.query_row(
    &format!(
      "SELECT {RELATION_COLUMNS} FROM documentable_relations r
       WHERE r.document_id = ?1 AND r.relatable_type = ?2
         AND r.relatable_id = ?3 AND r.relation_context = ?4"
    ),
    params![doc_str, relatable.kind.as_ref(), rel_id_str, context.as_ref()],
    RawRelation::from_row,
  )?;
  raw.into_relation().map_err(abort)
}

pub fn query_relations<P: Params>(
  conn: &Connection,
  sql: &str,
  params: P,
) -> CallResult<Vec<DocumentableRelation>> {
  let mut stmt = conn.prepare_cached(sql)?;
  let raws = stmt
    .query_map(params, RawRelation::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|raw| raw.into_relation().map_err(abort))
    .collect()
}

fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, Some(msg))
      if f.code == rusqlite::ErrorCode::ConstraintViolation
        && msg.starts_with("FOREIGN KEY constraint failed")
  )
}
