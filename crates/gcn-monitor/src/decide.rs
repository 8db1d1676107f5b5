//! Decision Engine: whether an event warrants an observation request.

use chrono::{DateTime, TimeDelta, Utc};
use gcn_core::{EventRecord, Instrument};
use gcn_sky::{Visibility, VisibilityResult};
use serde::{Deserialize, Serialize};

/// Follow-up urgency, ordered lowest first.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
  Low,
  Normal,
  High,
  Urgent,
}

impl Priority {
  /// Fixed lookup by instrument.
  pub fn for_instrument(instrument: Instrument) -> Self {
    match instrument {
      Instrument::Amon => Priority::Urgent,
      Instrument::IceCubeCascade
      | Instrument::IceCubeGold
      | Instrument::IceCubeBronze
      | Instrument::Hawc => Priority::High,
      Instrument::SwiftBat
      | Instrument::SwiftXrt
      | Instrument::SwiftUvot
      | Instrument::FermiGbm
      | Instrument::FermiLat
      | Instrument::Calet
      | Instrument::EinsteinProbe => Priority::Normal,
      Instrument::Unknown => Priority::Low,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityPolicy {
  /// Observable-now events at or above this priority are requested.
  pub threshold:         Priority,
  /// Windows opening later than this after evaluation are suppressed.
  pub staleness_horizon: TimeDelta,
}

impl Default for PriorityPolicy {
  fn default() -> Self {
    Self {
      threshold:         Priority::Normal,
      staleness_horizon: TimeDelta::hours(12),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDecision {
  RequestNow,
  RequestScheduled { start: DateTime<Utc> },
  Suppress,
}

impl RequestDecision {
  pub fn is_request(&self) -> bool { !matches!(self, RequestDecision::Suppress) }

  /// When the observation should begin, if one is requested.
  pub fn start_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match self {
      RequestDecision::RequestNow => Some(now),
      RequestDecision::RequestScheduled { start } => Some(*start),
      RequestDecision::Suppress => None,
    }
  }
}

/// A [`RequestDecision`] with the priority it was made at and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
  pub request:  RequestDecision,
  pub priority: Priority,
  pub reason:   String,
}

pub fn decide(
  record: &EventRecord,
  visibility: &VisibilityResult,
  policy: &PriorityPolicy,
) -> Decision {
  let priority = Priority::for_instrument(record.instrument);
  let (request, reason) = if record.is_retracted() {
    (RequestDecision::Suppress, "event was retracted".to_owned())
  } else {
    match visibility.classification {
      Visibility::ObservableNow if priority >= policy.threshold => (
        RequestDecision::RequestNow,
        format!("observable now from {}", visibility.observer),
      ),
      Visibility::ObservableNow => (
        RequestDecision::Suppress,
        format!("priority {priority} is below threshold {}", policy.threshold),
      ),
      Visibility::ObservableLater => match visibility.window_start {
        Some(start) if start - visibility.evaluated_at <= policy.staleness_horizon => (
          RequestDecision::RequestScheduled { start },
          format!("observable from {} at {}", visibility.observer, start.format("%Y-%m-%d %H:%M UTC")),
        ),
        Some(start) => (
          RequestDecision::Suppress,
          format!(
            "window opens at {} beyond the {}h staleness horizon",
            start.format("%Y-%m-%d %H:%M UTC"),
            policy.staleness_horizon.num_hours()
          ),
        ),
        None => (RequestDecision::Suppress, "no window start".to_owned()),
      },
      Visibility::NotObservable => (
        RequestDecision::Suppress,
        format!("not observable from {}", visibility.observer),
      ),
    }
  };
  Decision { request, priority, reason }
}
