//! [`RelationStore`] for [`SqliteStore`].

use dossier_core::{
  entity::EntityRef,
  relation::{DocumentableRelation, RelationContext},
  store::RelationStore,
};
use rusqlite::params;
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{RELATION_COLUMNS, encode_dt, encode_uuid, now},
  error::abort,
  ops,
};

impl RelationStore for SqliteStore {
  async fn attach(
    &self,
    document_id: Uuid,
    relatable: EntityRef,
    context: RelationContext,
    notes: Option<String>,
  ) -> Result<DocumentableRelation> {
    let relation = self
      .write(move |tx| {
        let doc = ops::load_document(tx, document_id)?.ok_or_else(|| {
          abort(dossier_core::Error::OrphanReference(document_id))
        })?;
        ops::attach(tx, &doc, relatable, context, notes.as_deref(), now())
      })
      .await?;
    tracing::debug!(
      document_id = %document_id,
      relatable = %relatable,
      context = context.as_ref(),
      "relation attached"
    );
    Ok(relation)
  }

  async fn detach(
    &self,
    document_id: Uuid,
    relatable: EntityRef,
    context: RelationContext,
  ) -> Result<bool> {
    let changed = self
      .write(move |tx| {
        Ok(tx.execute(
          "UPDATE documentable_relations SET deleted_at = ?1
            WHERE document_id = ?2 AND relatable_type = ?3
              AND relatable_id = ?4 AND relation_context = ?5
              AND deleted_at IS NULL",
          params![
            encode_dt(now()),
            encode_uuid(document_id),
            relatable.kind.as_ref(),
            encode_uuid(relatable.id),
            context.as_ref(),
          ],
        )?)
      })
      .await?;
    if changed > 0 {
      tracing::debug!(
        document_id = %document_id,
        relatable = %relatable,
        context = context.as_ref(),
        "relation detached"
      );
    }
    Ok(changed > 0)
  }

  async fn relations_for_document(
    &self,
    document_id: Uuid,
  ) -> Result<Vec<DocumentableRelation>> {
    self
      .read(move |conn| {
        ops::query_relations(
          conn,
          &format!(
            "SELECT {RELATION_COLUMNS} FROM documentable_relations r
             WHERE r.document_id = ?1 AND r.deleted_at IS NULL
             ORDER BY r.created_at, r.relation_context"
          ),
          params![encode_uuid(document_id)],
        )
      })
      .await
  }

  async fn relations_for_relatable(
    &self,
    relatable: EntityRef,
    context: Option<RelationContext>,
  ) -> Result<Vec<DocumentableRelation>> {
    self
      .read(move |conn| {
        ops::query_relations(
          conn,
          &format!(
            "SELECT {RELATION_COLUMNS} FROM documentable_relations r
             WHERE r.relatable_type = ?1 AND r.relatable_id = ?2
               AND (?3 IS NULL OR r.relation_context = ?3)
               AND r.deleted_at IS NULL
             ORDER BY r.created_at, r.document_id"
          ),
          params![
            relatable.kind.as_ref(),
            encode_uuid(relatable.id),
            context.map(|c| c.as_ref().to_owned()),
          ],
        )
      })
      .await
  }
}
