//! Read-only JSON API over the Dossier document history.
//!
//! Exposes an axum [`Router`] backed by any
//! [`dossier_core::store::SnapshotStore`]. Uploads go through the intake
//! service, not this API. Auth, tenancy and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", dossier_api::api_router(store.clone()))
//! ```

pub mod decisions;
pub mod documents;
pub mod error;
pub mod owners;

use std::sync::Arc;

use axum::{Router, routing::get};
use dossier_core::store::SnapshotStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: SnapshotStore + 'static,
{
  Router::new()
    // Documents
    .route("/documents/{id}", get(documents::get_one::<S>))
    .route("/documents/{id}/chain", get(documents::chain::<S>))
    // Owners
    .route(
      "/owners/{kind}/{id}/documents/{type}/history",
      get(owners::history::<S>),
    )
    .route(
      "/owners/{kind}/{id}/documents/{type}/valid-at",
      get(owners::valid_at::<S>),
    )
    .route("/owners/{kind}/{id}/timeline", get(owners::timeline::<S>))
    // Decisions
    .route("/decisions/{kind}/{id}/documents", get(decisions::frozen::<S>))
    .with_state(store)
}
