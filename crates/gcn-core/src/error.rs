//! Error types for `gcn-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown instrument tag: {0:?}")]
  UnknownInstrument(String),

  #[error("unknown source kind: {0:?}")]
  UnknownSourceKind(String),

  #[error("unknown field key: {0:?}")]
  UnknownFieldKey(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of an [`EventStore`](crate::store::EventStore) operation, generic
/// over the backend's own error type.
#[derive(Debug, Error)]
pub enum StoreError<E: std::error::Error + 'static> {
  /// The backend could not produce the tables at startup.
  #[error("failed to load event tables: {0}")]
  Load(#[source] E),

  /// The durable write failed; the in-memory tables were rolled back.
  #[error("failed to persist event tables: {0}")]
  Persistence(#[source] E),
}
