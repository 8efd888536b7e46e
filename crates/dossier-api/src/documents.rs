//! Handlers for `/documents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/documents/:id` | Single document, soft-deleted ones included |
//! | `GET`  | `/documents/:id/chain` | Every version in the chain, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use dossier_core::{document::Document, store::DocumentStore};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /documents/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError>
where
  S: DocumentStore,
{
  let doc = store
    .get_document(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::DocumentNotFound(id))?;
  Ok(Json(doc))
}

// ─── Chain ────────────────────────────────────────────────────────────────────

/// `GET /documents/:id/chain`
pub async fn chain<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Document>>, ApiError>
where
  S: DocumentStore,
{
  store
    .get_document(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::DocumentNotFound(id))?;

  let chain = store
    .complete_history_chain(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(chain))
}
