//! Observer sites and observing constraints.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fixed ground site. Longitude is east-positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observer {
  pub name:          String,
  pub latitude_deg:  f64,
  pub longitude_deg: f64,
  #[serde(default)]
  pub elevation_m:   f64,
}

impl Observer {
  /// The 7-Dimensional Telescope at El Sauce Observatory, Chile.
  pub fn seven_dt() -> Self {
    Self {
      name:          "7DT".to_owned(),
      latitude_deg:  -30.4710,
      longitude_deg: -70.7650,
      elevation_m:   1530.0,
    }
  }

  pub(crate) fn validate(&self) -> Result<()> {
    if !self.latitude_deg.is_finite() || self.latitude_deg.abs() > 90.0 {
      return Err(Error::InvalidObserver {
        name:         self.name.clone(),
        latitude_deg: self.latitude_deg,
      });
    }
    if !self.longitude_deg.is_finite() {
      return Err(Error::NonFinite);
    }
    Ok(())
  }
}

/// What makes a target observable, and how far ahead to look.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
  pub min_altitude_deg:     f64,
  pub min_moon_sep_deg:     f64,
  /// Night-time requirement; `None` ignores the Sun.
  pub max_sun_altitude_deg: Option<f64>,
  pub horizon:              TimeDelta,
  /// Search resolution; window boundaries are exact to one step.
  pub step:                 TimeDelta,
}

impl Default for Constraints {
  fn default() -> Self {
    Self {
      min_altitude_deg:     30.0,
      min_moon_sep_deg:     30.0,
      max_sun_altitude_deg: None,
      horizon:              TimeDelta::hours(48),
      step:                 TimeDelta::seconds(60),
    }
  }
}
