//! Handlers for `/decisions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/decisions/:kind/:id/documents` | Documents frozen by the decision's snapshot, as stored now |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use dossier_core::{
  document::Document,
  entity::{EntityKind, EntityRef},
  store::SnapshotStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /decisions/:kind/:id/documents`
pub async fn frozen<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(EntityKind, Uuid)>,
) -> Result<Json<Vec<Document>>, ApiError>
where
  S: SnapshotStore,
{
  let docs = store
    .frozen_documents(EntityRef::new(kind, id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(docs))
}
