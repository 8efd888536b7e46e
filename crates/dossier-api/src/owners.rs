//! Handlers for `/owners` endpoints: the per-owner audit views.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/owners/:kind/:id/documents/:type/history` | Every version, by version number |
//! | `GET`  | `/owners/:kind/:id/documents/:type/valid-at` | `?at=<rfc3339>` required; 404 if nothing was on file |
//! | `GET`  | `/owners/:kind/:id/timeline` | Lifecycle events, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use dossier_core::{
  document::{Document, DocumentType},
  entity::{EntityKind, EntityRef},
  store::DocumentStore,
  timeline::TimelineEvent,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /owners/:kind/:id/documents/:type/history`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Path((kind, id, document_type)): Path<(EntityKind, Uuid, DocumentType)>,
) -> Result<Json<Vec<Document>>, ApiError>
where
  S: DocumentStore,
{
  let docs = store
    .history_by_type(EntityRef::new(kind, id), document_type)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(docs))
}

// ─── Valid at ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidAtParams {
  pub at: Option<DateTime<Utc>>,
}

/// `GET /owners/:kind/:id/documents/:type/valid-at?at=<rfc3339>`
pub async fn valid_at<S>(
  State(store): State<Arc<S>>,
  Path((kind, id, document_type)): Path<(EntityKind, Uuid, DocumentType)>,
  Query(params): Query<ValidAtParams>,
) -> Result<Json<Document>, ApiError>
where
  S: DocumentStore,
{
  let at = params
    .at
    .ok_or(ApiError::MissingParam("at"))?;
  let owner = EntityRef::new(kind, id);

  let doc = store
    .valid_at(owner, Some(document_type), at)
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .next()
    .ok_or(ApiError::NothingOnFile { owner, document_type, at })?;
  Ok(Json(doc))
}

// ─── Timeline ─────────────────────────────────────────────────────────────────

/// `GET /owners/:kind/:id/timeline`
pub async fn timeline<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(EntityKind, Uuid)>,
) -> Result<Json<Vec<TimelineEvent>>, ApiError>
where
  S: DocumentStore,
{
  let events = store
    .timeline(EntityRef::new(kind, id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events))
}
