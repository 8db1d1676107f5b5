//! Error type for `gcn-store`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] gcn_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row that cannot describe a record, e.g. RA without Dec.
  #[error("invalid row for {event_id}: {reason}")]
  InvalidRow { event_id: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
