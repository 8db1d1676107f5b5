//! Observability classification and forward window search.

use chrono::{DateTime, TimeDelta, Utc};
use gcn_core::Coordinates;
use serde::Serialize;

use crate::{
  ephemeris::{
    Equatorial, altitude_deg, julian_date, local_sidereal_deg, moon_position,
    normalize_deg, separation_deg, sun_position,
  },
  error::{Error, Result},
  observer::{Constraints, Observer},
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Visibility {
  ObservableNow,
  ObservableLater,
  NotObservable,
}

/// Outcome of [`evaluate`] for one target, site and instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibilityResult {
  pub observer:            String,
  pub classification:      Visibility,
  pub evaluated_at:        DateTime<Utc>,
  pub altitude_deg:        f64,
  pub moon_separation_deg: f64,
  pub sun_altitude_deg:    f64,
  /// First sample at which every constraint holds.
  pub window_start:        Option<DateTime<Utc>>,
  /// First sample after `window_start` at which one no longer holds, or the
  /// horizon end.
  pub window_end:          Option<DateTime<Utc>>,
  /// Hours left in the window when observable now.
  pub remaining_hours:     Option<f64>,
}

impl VisibilityResult {
  pub fn is_observable_now(&self) -> bool {
    self.classification == Visibility::ObservableNow
  }
}

/// Conditions at one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkySample {
  pub time:                DateTime<Utc>,
  pub altitude_deg:        f64,
  pub moon_separation_deg: f64,
  pub sun_altitude_deg:    f64,
}

impl SkySample {
  fn satisfies(&self, constraints: &Constraints) -> bool {
    self.altitude_deg >= constraints.min_altitude_deg
      && self.moon_separation_deg >= constraints.min_moon_sep_deg
      && constraints
        .max_sun_altitude_deg
        .is_none_or(|max| self.sun_altitude_deg <= max)
  }
}

fn target_position(coordinates: &Coordinates) -> Result<Equatorial> {
  let (ra, dec) = (coordinates.ra_deg, coordinates.dec_deg);
  if !ra.is_finite() || !dec.is_finite() {
    return Err(Error::NonFinite);
  }
  if dec.abs() > 90.0 {
    return Err(Error::InvalidDeclination(dec));
  }
  Ok(Equatorial { ra_deg: normalize_deg(ra), dec_deg: dec })
}

fn sample(target: Equatorial, observer: &Observer, at: DateTime<Utc>) -> SkySample {
  let jd = julian_date(at);
  let lst = local_sidereal_deg(at, observer.longitude_deg);
  SkySample {
    time:                at,
    altitude_deg:        altitude_deg(target, observer.latitude_deg, lst),
    moon_separation_deg: separation_deg(target, moon_position(jd)),
    sun_altitude_deg:    altitude_deg(sun_position(jd), observer.latitude_deg, lst),
  }
}

/// Sample count over the horizon; samples sit at `at + i * step` so that the
/// search never accumulates rounding.
fn sample_count(constraints: &Constraints) -> Result<i32> {
  let step = constraints.step.num_milliseconds();
  if step <= 0 {
    return Err(Error::InvalidStep);
  }
  let horizon = constraints.horizon.num_milliseconds().max(0);
  Ok(i32::try_from(horizon / step).unwrap_or(i32::MAX))
}

/// Classify a target for one observer at `at`.
///
/// Observable now when altitude and moon separation (and the Sun limit, if
/// set) hold at `at`; otherwise the first window inside the horizon makes it
/// observable later.
pub fn evaluate(
  coordinates: &Coordinates,
  observer: &Observer,
  at: DateTime<Utc>,
  constraints: &Constraints,
) -> Result<VisibilityResult> {
  let target = target_position(coordinates)?;
  observer.validate()?;
  let samples = sample_count(constraints)?;
  let horizon_end = at + constraints.step * samples;

  let now = sample(target, observer, at);
  let start = if now.satisfies(constraints) {
    Some(0)
  } else {
    (1..=samples).find(|&i| {
      sample(target, observer, at + constraints.step * i).satisfies(constraints)
    })
  };

  let (classification, window_start, window_end) = match start {
    None => (Visibility::NotObservable, None, None),
    Some(first) => {
      let end = (first + 1..=samples)
        .find(|&i| {
          !sample(target, observer, at + constraints.step * i).satisfies(constraints)
        })
        .map_or(horizon_end, |i| at + constraints.step * i);
      let classification = if first == 0 {
        Visibility::ObservableNow
      } else {
        Visibility::ObservableLater
      };
      (classification, Some(at + constraints.step * first), Some(end))
    }
  };

  let remaining_hours = match (classification, window_end) {
    (Visibility::ObservableNow, Some(end)) => {
      Some((end - at).num_milliseconds() as f64 / 3_600_000.0)
    }
    _ => None,
  };

  Ok(VisibilityResult {
    observer: observer.name.clone(),
    classification,
    evaluated_at: at,
    altitude_deg: now.altitude_deg,
    moon_separation_deg: now.moon_separation_deg,
    sun_altitude_deg: now.sun_altitude_deg,
    window_start,
    window_end,
    remaining_hours,
  })
}

/// [`evaluate`] for every configured site.
pub fn evaluate_all(
  coordinates: &Coordinates,
  observers: &[Observer],
  at: DateTime<Utc>,
  constraints: &Constraints,
) -> Result<Vec<VisibilityResult>> {
  if observers.is_empty() {
    return Err(Error::NoObserver);
  }
  observers
    .iter()
    .map(|o| evaluate(coordinates, o, at, constraints))
    .collect()
}

/// Conditions from `start` to `start + span` every `step`, for plotting.
pub fn altitude_series(
  coordinates: &Coordinates,
  observer: &Observer,
  start: DateTime<Utc>,
  span: TimeDelta,
  step: TimeDelta,
) -> Result<Vec<SkySample>> {
  let target = target_position(coordinates)?;
  observer.validate()?;
  let samples = sample_count(&Constraints { horizon: span, step, ..Constraints::default() })?;
  Ok(
    (0..=samples)
      .map(|i| sample(target, observer, start + step * i))
      .collect(),
  )
}
