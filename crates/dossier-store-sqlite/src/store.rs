//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use dossier_core::{
  chain::{Supersession, is_monotonic},
  document::{
    ApprovalOverride, Document, DocumentStatus, DocumentType, NewDocument,
    ReviewDecision,
  },
  entity::EntityRef,
  store::DocumentStore,
  validity::{DataIntegrityWarning, select_valid_at},
};
use rusqlite::{TransactionBehavior, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{DOCUMENT_COLUMNS, encode_dt, encode_uuid, now},
  ops::{self, MAX_CHAIN_DEPTH},
  schema::SCHEMA,
};

type CoreError = dossier_core::Error;

/// How long a writer waits for the database lock before giving up with
/// [`Error::Busy`].
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Writers are
/// serialised with `BEGIN IMMEDIATE`, readers run against the WAL without
/// taking locks.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT).await
  }

  pub async fn open_with_timeout(
    path: impl AsRef<Path>,
    busy_timeout: Duration,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  async fn init_schema(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing on success.
  pub(crate) async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Transaction<'_>) -> tokio_rusqlite::Result<T>
      + Send
      + 'static,
  {
    let value = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
      })
      .await?;
    Ok(value)
  }

  /// Run a read-only query closure.
  pub(crate) async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> tokio_rusqlite::Result<T>
      + Send
      + 'static,
  {
    Ok(self.conn.call(move |conn| f(conn)).await?)
  }

  async fn chain(&self, sql: String, id: Uuid) -> Result<Vec<Document>> {
    let chain = self
      .read(move |conn| {
        ops::query_documents(conn, &sql, params![encode_uuid(id), MAX_CHAIN_DEPTH])
      })
      .await?;
    if chain.is_empty() {
      return Err(CoreError::DocumentNotFound(id).into());
    }
    Ok(chain)
  }
}

// ─── Chain queries ───────────────────────────────────────────────────────────

/// Walk forward from `?1` along `superseded_by_id`.
const FORWARD_WALK: &str = "
  forward(id, depth) AS (
    SELECT document_id, 0 FROM documents WHERE document_id = ?1
    UNION
    SELECT n.superseded_by_id, f.depth + 1
      FROM documents n JOIN forward f ON n.document_id = f.id
     WHERE n.superseded_by_id IS NOT NULL AND f.depth < ?2
  )";

/// Walk backward from `?1` to every row whose successor is already visited.
const BACKWARD_WALK: &str = "
  backward(id, depth) AS (
    SELECT document_id, 0 FROM documents WHERE document_id = ?1
    UNION
    SELECT p.document_id, b.depth + 1
      FROM documents p JOIN backward b ON p.superseded_by_id = b.id
     WHERE b.depth < ?2
  )";

fn forward_chain_sql() -> String {
  format!(
    "WITH RECURSIVE {FORWARD_WALK}
     SELECT {DOCUMENT_COLUMNS}
       FROM documents d
       JOIN (SELECT id, MIN(depth) AS depth FROM forward GROUP BY id) c
         ON d.document_id = c.id
      ORDER BY c.depth"
  )
}

fn backward_chain_sql() -> String {
  format!(
    "WITH RECURSIVE {BACKWARD_WALK}
     SELECT {DOCUMENT_COLUMNS}
       FROM documents d
       JOIN (SELECT id, MIN(depth) AS depth FROM backward GROUP BY id) c
         ON d.document_id = c.id
      ORDER BY c.depth"
  )
}

fn complete_chain_sql() -> String {
  format!(
    "WITH RECURSIVE {FORWARD_WALK}, {BACKWARD_WALK}
     SELECT {DOCUMENT_COLUMNS}
       FROM documents d
      WHERE d.document_id IN (SELECT id FROM forward UNION SELECT id FROM backward)
      ORDER BY d.version_number, d.created_at"
  )
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn insert_document(&self, input: NewDocument) -> Result<Document> {
    let doc = self
      .write(move |tx| ops::insert_document(tx, input, now()))
      .await?;
    tracing::debug!(
      document_id = %doc.document_id,
      owner = %doc.owner,
      document_type = %doc.document_type,
      "document inserted"
    );
    Ok(doc)
  }

  async fn ingest(
    &self,
    input: NewDocument,
    reason: Option<String>,
    approval: Option<ApprovalOverride>,
  ) -> Result<Document> {
    let (doc, replaced) = self
      .write(move |tx| {
        let at = now();
        let current = ops::active_in_slot(tx, input.owner, input.document_type)?;
        let inserted = ops::insert_document(tx, input, at)?;
        match current {
          Some(old) => {
            let new =
              ops::supersede(tx, &old, &inserted, reason.as_deref(), approval, at)?;
            Ok((new, Some(old.document_id)))
          }
          None => {
            ops::activate(tx, &inserted, at)?;
            Ok((ops::require_document(tx, inserted.document_id)?, None))
          }
        }
      })
      .await?;

    tracing::info!(
      document_id = %doc.document_id,
      owner = %doc.owner,
      document_type = %doc.document_type,
      version = doc.version_number,
      replaced = ?replaced,
      "document ingested"
    );
    Ok(doc)
  }

  async fn activate(&self, id: Uuid) -> Result<Document> {
    let (doc, deactivated) = self
      .write(move |tx| {
        let doc = ops::require_document(tx, id)?;
        let deactivated = ops::activate(tx, &doc, now())?;
        Ok((ops::require_document(tx, id)?, deactivated))
      })
      .await?;
    tracing::info!(
      document_id = %id,
      owner = %doc.owner,
      document_type = %doc.document_type,
      deactivated,
      "document activated"
    );
    Ok(doc)
  }

  async fn supersede_with(
    &self,
    old_id: Uuid,
    new_id: Uuid,
    reason: Option<String>,
    approval: Option<ApprovalOverride>,
  ) -> Result<Supersession> {
    let supersession = self
      .write(move |tx| {
        let old = ops::require_document(tx, old_id)?;
        let new = ops::require_document(tx, new_id)?;
        let new = ops::supersede(tx, &old, &new, reason.as_deref(), approval, now())?;
        let old = ops::require_document(tx, old_id)?;
        Ok(Supersession { old, new })
      })
      .await?;
    tracing::info!(
      old = %old_id,
      new = %new_id,
      version = supersession.new.version_number,
      overridden = approval.is_some(),
      "document superseded"
    );
    Ok(supersession)
  }

  async fn review(&self, id: Uuid, decision: ReviewDecision) -> Result<Document> {
    let status = decision.status();
    let doc = self
      .write(move |tx| {
        let doc = ops::require_document(tx, id)?;
        if doc.status == DocumentStatus::Superseded || doc.is_deleted() {
          return Err(crate::error::abort(CoreError::NotReviewable(id)));
        }
        let at = encode_dt(now());
        tx.execute(
          "UPDATE documents
              SET status = ?1, reviewed_by = ?2, reviewed_at = ?3,
                  review_notes = ?4, updated_at = ?3
            WHERE document_id = ?5",
          params![
            decision.status().as_ref(),
            encode_uuid(decision.reviewer()),
            at,
            decision.notes(),
            encode_uuid(id),
          ],
        )?;
        ops::require_document(tx, id)
      })
      .await?;
    tracing::info!(document_id = %id, status = status.as_ref(), "document reviewed");
    Ok(doc)
  }

  async fn soft_delete(&self, id: Uuid) -> Result<Document> {
    let doc = self
      .write(move |tx| {
        ops::require_document(tx, id)?;
        tx.execute(
          "UPDATE documents
              SET deleted_at = COALESCE(deleted_at, ?1),
                  valid_to = CASE WHEN is_active = 1 THEN ?1 ELSE valid_to END,
                  is_active = 0,
                  updated_at = ?1
            WHERE document_id = ?2",
          params![encode_dt(now()), encode_uuid(id)],
        )?;
        ops::require_document(tx, id)
      })
      .await?;
    tracing::info!(document_id = %id, "document soft-deleted");
    Ok(doc)
  }

  async fn force_delete(&self, id: Uuid) -> Result<Document> {
    let doc = self
      .write(move |tx| {
        let doc = ops::require_document(tx, id)?;
        ops::unlink_from_chain(tx, &doc, now())?;
        tx.execute(
          "DELETE FROM documents WHERE document_id = ?1",
          params![encode_uuid(id)],
        )?;
        Ok(doc)
      })
      .await?;
    tracing::warn!(
      document_id = %id,
      path = %doc.file.path,
      "document force-deleted"
    );
    Ok(doc)
  }

  async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
    self.read(move |conn| ops::load_document(conn, id)).await
  }

  async fn supersession_chain(&self, id: Uuid) -> Result<Vec<Document>> {
    self.chain(forward_chain_sql(), id).await
  }

  async fn reverse_supersession_chain(&self, id: Uuid) -> Result<Vec<Document>> {
    self.chain(backward_chain_sql(), id).await
  }

  async fn complete_history_chain(&self, id: Uuid) -> Result<Vec<Document>> {
    let chain = self.chain(complete_chain_sql(), id).await?;
    if !is_monotonic(&chain) {
      tracing::warn!(document_id = %id, "version numbers repeat along chain");
    }
    Ok(chain)
  }

  async fn documents_for_owner(
    &self,
    owner: EntityRef,
    include_deleted: bool,
  ) -> Result<Vec<Document>> {
    self
      .read(move |conn| {
        ops::query_documents(
          conn,
          &format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d
             WHERE d.owner_type = ?1 AND d.owner_id = ?2
               AND (?3 OR d.deleted_at IS NULL)
             ORDER BY d.document_type, d.version_number, d.created_at"
          ),
          params![owner.kind.as_ref(), encode_uuid(owner.id), include_deleted],
        )
      })
      .await
  }

  async fn history_by_type(
    &self,
    owner: EntityRef,
    document_type: DocumentType,
  ) -> Result<Vec<Document>> {
    self
      .read(move |conn| {
        ops::query_documents(
          conn,
          &format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d
             WHERE d.owner_type = ?1 AND d.owner_id = ?2 AND d.document_type = ?3
             ORDER BY d.version_number, d.created_at"
          ),
          params![
            owner.kind.as_ref(),
            encode_uuid(owner.id),
            document_type.as_ref()
          ],
        )
      })
      .await
  }

  async fn active_documents(&self, owner: EntityRef) -> Result<Vec<Document>> {
    self
      .read(move |conn| {
        ops::query_documents(
          conn,
          &format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d
             WHERE d.owner_type = ?1 AND d.owner_id = ?2 AND d.is_active = 1
             ORDER BY d.document_type"
          ),
          params![owner.kind.as_ref(), encode_uuid(owner.id)],
        )
      })
      .await
  }

  async fn valid_at(
    &self,
    owner: EntityRef,
    document_type: Option<DocumentType>,
    at: DateTime<Utc>,
  ) -> Result<Vec<Document>> {
    let candidates = self
      .read(move |conn| {
        ops::query_documents(
          conn,
          &format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d
             WHERE d.owner_type = ?1 AND d.owner_id = ?2
               AND (?3 IS NULL OR d.document_type = ?3)
               AND d.valid_from IS NOT NULL AND d.valid_from <= ?4
               AND (d.deleted_at IS NULL OR d.deleted_at > ?4)"
          ),
          params![
            owner.kind.as_ref(),
            encode_uuid(owner.id),
            document_type.map(|t| t.as_ref().to_owned()),
            encode_dt(at),
          ],
        )
      })
      .await?;
    Ok(select_valid_at(candidates, at))
  }

  async fn currently_valid(&self, owner: EntityRef) -> Result<Vec<Document>> {
    self
      .read(move |conn| ops::currently_valid(conn, owner, now()))
      .await
  }

  async fn integrity_anomalies(&self) -> Result<Vec<DataIntegrityWarning>> {
    let suspects = self
      .read(|conn| {
        ops::query_documents(
          conn,
          &format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d
             WHERE (d.valid_from IS NOT NULL AND d.valid_to IS NOT NULL
                    AND d.valid_from > d.valid_to)
                OR (d.status = 'superseded' AND d.superseded_by_id IS NULL)
             ORDER BY d.created_at"
          ),
          [],
        )
      })
      .await?;

    let warnings: Vec<_> =
      suspects.iter().flat_map(DataIntegrityWarning::inspect).collect();
    for warning in &warnings {
      warning.log();
    }
    Ok(warnings)
  }
}
