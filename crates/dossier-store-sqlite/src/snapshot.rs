//! [`SnapshotStore`] for [`SqliteStore`].

use dossier_core::{
  document::{Document, DocumentType},
  entity::EntityRef,
  relation::RelationContext,
  snapshot::{Snapshot, SnapshotEntry},
  store::SnapshotStore,
};
use rusqlite::params;

use crate::{
  Result, SqliteStore,
  encode::{DOCUMENT_COLUMNS, encode_uuid, now},
  ops,
};

const USAGE_NOTE: &str = "decision snapshot";

impl SnapshotStore for SqliteStore {
  async fn create_snapshot<'a>(
    &'a self,
    decision: EntityRef,
    owner: EntityRef,
    required_types: &'a [DocumentType],
  ) -> Result<Snapshot> {
    let mut required = required_types.to_vec();
    required.sort();
    required.dedup();

    let snapshot = self
      .write(move |tx| {
        let taken_at = now();
        let current = ops::currently_valid(tx, owner, taken_at)?;

        let mut entries = Vec::new();
        let mut missing_types = Vec::new();
        for document_type in required {
          let Some(doc) = current.iter().find(|d| d.document_type == document_type)
          else {
            missing_types.push(document_type);
            continue;
          };
          let ownership = ops::attach(
            tx,
            doc,
            owner,
            RelationContext::Ownership,
            None,
            taken_at,
          )?;
          let usage = ops::attach(
            tx,
            doc,
            decision,
            RelationContext::Usage,
            Some(USAGE_NOTE),
            taken_at,
          )?;
          entries.push(SnapshotEntry {
            document_type,
            document_id: doc.document_id,
            version_number: doc.version_number,
            ownership_id: ownership.relation_id,
            usage_id: usage.relation_id,
          });
        }

        Ok(Snapshot { decision, owner, taken_at, entries, missing_types })
      })
      .await?;

    if snapshot.is_complete() {
      tracing::info!(
        decision = %decision,
        owner = %owner,
        documents = snapshot.entries.len(),
        "snapshot created"
      );
    } else {
      tracing::warn!(
        decision = %decision,
        owner = %owner,
        missing = ?snapshot.missing_types,
        "snapshot created with missing document types"
      );
    }
    Ok(snapshot)
  }

  async fn frozen_documents(&self, decision: EntityRef) -> Result<Vec<Document>> {
    self
      .read(move |conn| {
        ops::query_documents(
          conn,
          &format!(
            "SELECT {DOCUMENT_COLUMNS}
               FROM documentable_relations r
               JOIN documents d ON d.document_id = r.document_id
              WHERE r.relatable_type = ?1 AND r.relatable_id = ?2
                AND r.relation_context = ?3 AND r.deleted_at IS NULL
              ORDER BY d.document_type, d.version_number"
          ),
          params![
            decision.kind.as_ref(),
            encode_uuid(decision.id),
            RelationContext::Usage.as_ref(),
          ],
        )
      })
      .await
  }
}
