//! Error type for `gcn-sky`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("declination {0} is outside [-90, 90]")]
  InvalidDeclination(f64),

  #[error("non-finite coordinate value")]
  NonFinite,

  #[error("observer {name:?} has an invalid latitude {latitude_deg}")]
  InvalidObserver { name: String, latitude_deg: f64 },

  #[error("no observer locations configured")]
  NoObserver,

  #[error("search step must be positive")]
  InvalidStep,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
