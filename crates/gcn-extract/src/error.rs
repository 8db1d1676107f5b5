//! Error type for `gcn-extract`.

use gcn_core::Instrument;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A circular that names no event, trigger or designation.
  #[error("no event reference found")]
  NoEventReference,

  /// Strict mode: a recognised notice lacks fields its layout requires.
  #[error("{instrument} notice is missing {fields:?}")]
  MissingFields {
    instrument: Instrument,
    fields:     Vec<&'static str>,
  },

  #[error("malformed payload: {0}")]
  Malformed(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A built-in pattern failed to compile.
  #[error("pattern error: {0}")]
  Pattern(#[from] regex::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
