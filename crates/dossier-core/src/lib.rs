//! Domain model for versioned loan-origination documents.
//!
//! Documents, relations, validity and chain logic, plus the store traits the
//! SQLite backend implements. Nothing here touches a database or HTTP.

// Store traits use native `async fn`; callers only need `Send` futures.
#![allow(async_fn_in_trait)]

pub mod chain;
pub mod document;
pub mod entity;
pub mod error;
pub mod intake;
pub mod relation;
pub mod snapshot;
pub mod store;
pub mod timeline;
pub mod validity;

pub use error::{Error, Result};
