//! SQLite backend for the Dossier document store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The one-active-document rule lives in a
//! partial unique index; chain walks are single recursive queries.

mod encode;
mod ops;
mod relations;
mod schema;
mod snapshot;
mod store;

pub mod error;

pub use encode::DecodeError;
pub use error::{Error, Result};
pub use store::{DEFAULT_BUSY_TIMEOUT, SqliteStore};

#[cfg(test)]
mod tests;
