//! Handler errors and their JSON rendering.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use dossier_core::{document::DocumentType, entity::EntityRef};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("document {0} not found")]
  DocumentNotFound(Uuid),

  #[error("no {document_type} on file for {owner} at {at}")]
  NothingOnFile {
    owner:         EntityRef,
    document_type: DocumentType,
    at:            DateTime<Utc>,
  },

  #[error("missing `{0}` parameter")]
  MissingParam(&'static str),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::DocumentNotFound(_) | Self::NothingOnFile { .. } => {
        StatusCode::NOT_FOUND
      }
      Self::MissingParam(_) => StatusCode::BAD_REQUEST,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    // Store internals stay in the log, not the response.
    let message = match &self {
      Self::Store(e) => {
        tracing::error!(error = %e, "store error while serving request");
        "internal store error".to_owned()
      }
      other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
