//! Error type for `pantry-store-sqlite`.

use pantry_core::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule was violated (not found, conflict, forbidden, ...).
  #[error("{0}")]
  Domain(#[from] pantry_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("integer out of range in column {0}")]
  OutOfRange(&'static str),
}

impl From<pantry_core::ValidationError> for Error {
  fn from(e: pantry_core::ValidationError) -> Self { Self::Domain(e.into()) }
}

impl DomainError for Error {
  fn as_domain(&self) -> Option<&pantry_core::Error> {
    match self {
      Self::Domain(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
