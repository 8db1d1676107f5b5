//! Event records, fragments and the identifiers that link them.
//!
//! A [`Fragment`] is what the extractor produces from one message. The store
//! folds fragments into [`EventRecord`]s, one per astrophysical event in each
//! of the notice, circular and combined tables.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
  str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, field::Field};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Normalised event identifier shared across notices and circulars.
///
/// Normalisation strips whitespace and upper-cases ASCII, so `GRB 250322A`
/// and `grb250322a` name the same event.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
  pub fn new(raw: impl AsRef<str>) -> Self {
    EventId(
      raw
        .as_ref()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect(),
    )
  }

  /// Identifier for a mission trigger number, e.g. `SWIFT-1287821`.
  ///
  /// Leading zeros are dropped from numeric triggers so `01709130131` and
  /// `1709130131` collide.
  pub fn trigger(mission: Mission, trigger: &str) -> Self {
    let trigger = trigger.trim();
    let trimmed = if trigger.chars().all(|c| c.is_ascii_digit()) {
      let t = trigger.trim_start_matches('0');
      if t.is_empty() { "0" } else { t }
    } else {
      trigger
    };
    EventId::new(format!("{mission}-{trimmed}"))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EventId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Source kind ─────────────────────────────────────────────────────────────

/// Which of the two independent feeds a fragment came from.
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
pub enum SourceKind {
  Notice,
  Circular,
}

impl SourceKind {
  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownSourceKind(s.to_owned()))
  }
}

// ─── Instruments ─────────────────────────────────────────────────────────────

/// Parent mission of an [`Instrument`]; the namespace of trigger numbers.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
pub enum Mission {
  Swift,
  Fermi,
  IceCube,
  #[strum(serialize = "HAWC")]
  Hawc,
  #[strum(serialize = "CALET")]
  Calet,
  EinsteinProbe,
  Unknown,
}

/// The closed set of facilities the monitor recognises.
///
/// `Unknown` doubles as the "not yet known" marker for the instrument field.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
pub enum Instrument {
  #[strum(serialize = "SwiftBAT")]
  #[serde(rename = "SwiftBAT")]
  SwiftBat,
  #[strum(serialize = "SwiftXRT")]
  #[serde(rename = "SwiftXRT")]
  SwiftXrt,
  #[strum(serialize = "SwiftUVOT")]
  #[serde(rename = "SwiftUVOT")]
  SwiftUvot,
  #[strum(serialize = "FermiGBM")]
  #[serde(rename = "FermiGBM")]
  FermiGbm,
  #[strum(serialize = "FermiLAT")]
  #[serde(rename = "FermiLAT")]
  FermiLat,
  #[strum(serialize = "AMON")]
  #[serde(rename = "AMON")]
  Amon,
  #[strum(serialize = "IceCubeCASCADE")]
  #[serde(rename = "IceCubeCASCADE")]
  IceCubeCascade,
  #[strum(serialize = "IceCubeGOLD")]
  #[serde(rename = "IceCubeGOLD")]
  IceCubeGold,
  #[strum(serialize = "IceCubeBRONZE")]
  #[serde(rename = "IceCubeBRONZE")]
  IceCubeBronze,
  #[strum(serialize = "HAWC")]
  #[serde(rename = "HAWC")]
  Hawc,
  #[strum(serialize = "CALET")]
  #[serde(rename = "CALET")]
  Calet,
  EinsteinProbe,
  Unknown,
}

impl Instrument {
  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownInstrument(s.to_owned()))
  }

  pub fn mission(self) -> Mission {
    match self {
      Instrument::SwiftBat | Instrument::SwiftXrt | Instrument::SwiftUvot => {
        Mission::Swift
      }
      Instrument::FermiGbm | Instrument::FermiLat => Mission::Fermi,
      Instrument::Amon
      | Instrument::IceCubeCascade
      | Instrument::IceCubeGold
      | Instrument::IceCubeBronze => Mission::IceCube,
      Instrument::Hawc => Mission::Hawc,
      Instrument::Calet => Mission::Calet,
      Instrument::EinsteinProbe => Mission::EinsteinProbe,
      Instrument::Unknown => Mission::Unknown,
    }
  }

  pub fn is_neutrino(self) -> bool { self.mission() == Mission::IceCube }

  pub fn is_known(self) -> bool { self != Instrument::Unknown }
}

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// J2000 sky position in degrees with an optional error radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub ra_deg:    f64,
  pub dec_deg:   f64,
  /// 90% containment radius in degrees, when the source reports one.
  pub error_deg: Option<f64>,
}

impl Coordinates {
  pub fn new(ra_deg: f64, dec_deg: f64, error_deg: Option<f64>) -> Self {
    Self { ra_deg, dec_deg, error_deg }
  }

  /// Sort key for precision: smaller is better; no error radius ranks last.
  pub fn uncertainty(&self) -> f64 {
    self
      .error_deg
      .filter(|e| e.is_finite() && *e >= 0.0)
      .unwrap_or(f64::INFINITY)
  }
}

// ─── Field keys and provenance ───────────────────────────────────────────────

/// Names a mergeable field of an [`EventRecord`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
  Instrument,
  Name,
  TriggerNum,
  Coordinates,
  EventTime,
  Retracted,
  Extra(String),
}

impl fmt::Display for FieldKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FieldKey::Instrument => f.write_str("instrument"),
      FieldKey::Name => f.write_str("name"),
      FieldKey::TriggerNum => f.write_str("trigger_num"),
      FieldKey::Coordinates => f.write_str("coordinates"),
      FieldKey::EventTime => f.write_str("event_time"),
      FieldKey::Retracted => f.write_str("retracted"),
      FieldKey::Extra(k) => write!(f, "extra.{k}"),
    }
  }
}

impl FromStr for FieldKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "instrument" => FieldKey::Instrument,
      "name" => FieldKey::Name,
      "trigger_num" => FieldKey::TriggerNum,
      "coordinates" => FieldKey::Coordinates,
      "event_time" => FieldKey::EventTime,
      "retracted" => FieldKey::Retracted,
      other => match other.strip_prefix("extra.") {
        Some(k) if !k.is_empty() => FieldKey::Extra(k.to_owned()),
        _ => return Err(Error::UnknownFieldKey(other.to_owned())),
      },
    })
  }
}

/// Which source last set a field, and when that fragment was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
  pub source:        SourceKind,
  pub received_time: DateTime<Utc>,
}

// ─── Fragment ────────────────────────────────────────────────────────────────

/// The structured output of extracting one raw message.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
  pub event_id:      EventId,
  /// Other identifiers the same event may already be stored under.
  pub aliases:       Vec<EventId>,
  pub source_kind:   SourceKind,
  pub instrument:    Instrument,
  pub name:          Field<String>,
  pub trigger_num:   Field<String>,
  pub coordinates:   Field<Coordinates>,
  pub event_time:    Field<DateTime<Utc>>,
  pub received_time: DateTime<Utc>,
  pub retracted:     Field<bool>,
  pub raw_text:      String,
  pub extra_fields:  BTreeMap<String, Field<String>>,
}

impl Fragment {
  /// A fragment with every optional field unknown.
  pub fn new(
    event_id: EventId,
    source_kind: SourceKind,
    received_time: DateTime<Utc>,
    raw_text: impl Into<String>,
  ) -> Self {
    Self {
      event_id,
      aliases: Vec::new(),
      source_kind,
      instrument: Instrument::Unknown,
      name: Field::Unknown,
      trigger_num: Field::Unknown,
      coordinates: Field::Unknown,
      event_time: Field::Unknown,
      received_time,
      retracted: Field::Unknown,
      raw_text: raw_text.into(),
      extra_fields: BTreeMap::new(),
    }
  }

  /// Dedup key over `(event_id, source_kind, received_time, raw_text)`.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.event_id.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(self.source_kind.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(self.received_time.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(self.raw_text.as_bytes());
    hex::encode(hasher.finalize())
  }
}

// ─── EventRecord ─────────────────────────────────────────────────────────────

/// Merged state of one event within one table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
  pub event_id:      EventId,
  pub aliases:       BTreeSet<EventId>,
  /// Provisional display name assigned when the event was first seen.
  pub designation:   String,
  /// Source of the most recent fragment folded into this row.
  pub source_kind:   SourceKind,
  pub instrument:    Instrument,
  pub name:          Field<String>,
  pub trigger_num:   Field<String>,
  pub coordinates:   Field<Coordinates>,
  pub event_time:    Field<DateTime<Utc>>,
  pub received_time: DateTime<Utc>,
  pub first_seen:    DateTime<Utc>,
  pub retracted:     Field<bool>,
  pub raw_text:      String,
  pub extra_fields:  BTreeMap<String, Field<String>>,
  pub provenance:    BTreeMap<FieldKey, Provenance>,
  pub fingerprints:  BTreeSet<String>,
}

impl EventRecord {
  /// A row with nothing known yet, ready to be refined by its first fragment.
  pub fn empty(
    event_id: EventId,
    designation: String,
    source_kind: SourceKind,
    received_time: DateTime<Utc>,
  ) -> Self {
    Self {
      aliases: BTreeSet::from([event_id.clone()]),
      event_id,
      designation,
      source_kind,
      instrument: Instrument::Unknown,
      name: Field::Unknown,
      trigger_num: Field::Unknown,
      coordinates: Field::Unknown,
      event_time: Field::Unknown,
      received_time,
      first_seen: received_time,
      retracted: Field::Unknown,
      raw_text: String::new(),
      extra_fields: BTreeMap::new(),
      provenance: BTreeMap::new(),
      fingerprints: BTreeSet::new(),
    }
  }

  /// The reported event name if known, otherwise the provisional designation.
  pub fn display_name(&self) -> &str {
    self
      .name
      .known()
      .map(String::as_str)
      .unwrap_or(&self.designation)
  }

  pub fn is_retracted(&self) -> bool { self.retracted == Field::Known(true) }

  pub fn extra(&self, key: &str) -> Option<&str> {
    self
      .extra_fields
      .get(key)
      .and_then(Field::known)
      .map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn event_ids_normalise_names() {
    assert_eq!(EventId::new("GRB 250322A"), EventId::new("grb250322a"));
    assert_eq!(EventId::new(" GRB  250322A ").as_str(), "GRB250322A");
  }

  #[test]
  fn trigger_ids_drop_leading_zeros() {
    let a = EventId::trigger(Mission::EinsteinProbe, "01709130131");
    let b = EventId::trigger(Mission::EinsteinProbe, "1709130131");
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "EINSTEINPROBE-1709130131");
    assert_eq!(
      EventId::trigger(Mission::Swift, "1287821").as_str(),
      "SWIFT-1287821"
    );
  }

  #[test]
  fn instrument_tags_round_trip() {
    use strum::IntoEnumIterator;
    for inst in Instrument::iter() {
      assert_eq!(Instrument::parse(&inst.to_string()).unwrap(), inst);
    }
    assert!(Instrument::parse("Hubble").is_err());
  }

  #[test]
  fn field_keys_round_trip() {
    for key in [
      FieldKey::Instrument,
      FieldKey::Coordinates,
      FieldKey::Extra("energy".into()),
    ] {
      assert_eq!(key.to_string().parse::<FieldKey>().unwrap(), key);
    }
    assert!("extra.".parse::<FieldKey>().is_err());
  }

  #[test]
  fn missing_error_radius_is_least_precise() {
    let a = Coordinates::new(1.0, 2.0, Some(5.0));
    let b = Coordinates::new(1.0, 2.0, None);
    assert!(a.uncertainty() < b.uncertainty());
  }

  #[test]
  fn fingerprint_depends_on_raw_text() {
    let t = Utc::now();
    let a = Fragment::new(EventId::new("GRB1"), SourceKind::Notice, t, "x");
    let mut b = a.clone();
    assert_eq!(a.fingerprint(), b.fingerprint());
    b.raw_text.push('y');
    assert_ne!(a.fingerprint(), b.fingerprint());
  }
}
