//! Error type for `dossier-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::encode::DecodeError;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule was violated. See [`dossier_core::Error`].
  #[error(transparent)]
  Core(#[from] dossier_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// Another writer holds the database lock past the busy timeout.
  #[error("database is busy")]
  Busy,

  #[error(transparent)]
  Decode(#[from] DecodeError),
}

impl Error {
  /// Whether the failed operation may succeed if simply retried.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Core(e) => e.is_retryable(),
      Self::Busy => true,
      Self::Database(_) | Self::Decode(_) => false,
    }
  }
}

/// Errors raised inside a `Connection::call` closure travel back boxed in
/// [`tokio_rusqlite::Error::Other`]; unbox the ones this crate put there.
impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(inner) => {
        let inner = match inner.downcast::<dossier_core::Error>() {
          Ok(core) => return Self::Core(*core),
          Err(inner) => inner,
        };
        match inner.downcast::<DecodeError>() {
          Ok(decode) => Self::Decode(*decode),
          Err(inner) => Self::Database(tokio_rusqlite::Error::Other(inner)),
        }
      }
      tokio_rusqlite::Error::Rusqlite(ref inner) if is_busy(inner) => Self::Busy,
      other => Self::Database(other),
    }
  }
}

pub(crate) fn is_busy(e: &rusqlite::Error) -> bool {
  matches!(
    e.sqlite_error_code(),
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
  )
}

/// A UNIQUE or PRIMARY KEY failure naming exactly `columns`.
pub(crate) fn is_unique_violation(e: &rusqlite::Error, columns: &str) -> bool {
  match e {
    rusqlite::Error::SqliteFailure(f, Some(msg)) => {
      f.code == ErrorCode::ConstraintViolation
        && msg.starts_with("UNIQUE constraint failed")
        && msg.ends_with(columns)
    }
    _ => false,
  }
}

/// Box a domain error so it can leave a `Connection::call` closure.
pub(crate) fn abort<E>(e: E) -> tokio_rusqlite::Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  tokio_rusqlite::Error::Other(Box::new(e))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
