//! Fixed-format notice extraction.
//!
//! Pipeline:
//!   raw &str
//!     └─ KeyValues::parse()   → (KEY, value) pairs
//!          └─ layout(instrument) → which keys hold which field
//!               └─ field parsers  → Fragment
//!
//! Einstein Probe alerts are JSON and bypass the key/value stage.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use gcn_core::{
  Coordinates, EventId, Field, Fragment, Instrument, Mission, SourceKind,
};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::{
  error::{Error, Result},
  values::{digest_id, error_radius, first_token, leading_number, strip_unit},
};

// ─── Layouts ─────────────────────────────────────────────────────────────────

/// Which notice keys carry each field for one instrument family.
///
/// Every list is tried in order; the first key present wins.
pub(crate) struct Layout {
  trigger: &'static [&'static str],
  date:    &'static [&'static str],
  time:    &'static [&'static str],
  ra:      &'static [&'static str],
  dec:     &'static [&'static str],
  error:   &'static [&'static str],
  /// `(extra field name, notice key)`
  extras:  &'static [(&'static str, &'static str)],
}

const SWIFT_BAT: Layout = Layout {
  trigger: &["TRIGGER_NUM"],
  date:    &["GRB_DATE"],
  time:    &["GRB_TIME"],
  ra:      &["GRB_RA"],
  dec:     &["GRB_DEC"],
  error:   &["GRB_ERROR"],
  extras:  &[],
};

const SWIFT_IMAGING: Layout = Layout {
  trigger: &["TRIGGER_NUM"],
  date:    &["GRB_DATE", "IMG_START_DATE"],
  time:    &["GRB_TIME", "IMG_START_TIME"],
  ra:      &["GRB_RA"],
  dec:     &["GRB_DEC"],
  error:   &["GRB_ERROR"],
  extras:  &[],
};

const FERMI: Layout = Layout {
  trigger: &["TRIGGER_NUM"],
  date:    &["GRB_DATE"],
  time:    &["GRB_TIME"],
  ra:      &["GRB_RA"],
  dec:     &["GRB_DEC"],
  error:   &["GRB_ERROR"],
  extras:  &[("lc_url", "LC_URL")],
};

const AMON: Layout = Layout {
  trigger: &["EVENT_NUM"],
  date:    &["DISCOVERY_DATE"],
  time:    &["DISCOVERY_TIME"],
  ra:      &["SRC_RA"],
  dec:     &["SRC_DEC"],
  error:   &["SRC_ERROR"],
  extras:  &[
    ("run_num", "RUN_NUM"),
    ("far", "FAR"),
    ("coinc_pair", "COINC_PAIR"),
    ("delta_t", "DELTA_T"),
  ],
};

const ICECUBE_TRACK: Layout = Layout {
  trigger: &["EVENT_NUM"],
  date:    &["DISCOVERY_DATE"],
  time:    &["DISCOVERY_TIME"],
  ra:      &["SRC_RA"],
  dec:     &["SRC_DEC"],
  error:   &["SRC_ERROR", "SRC_ERROR90"],
  extras:  &[
    ("run_num", "RUN_NUM"),
    ("energy", "ENERGY"),
    ("signalness", "SIGNALNESS"),
    ("far", "FAR"),
  ],
};

const ICECUBE_CASCADE: Layout = Layout {
  trigger: &["EVENT_NUM"],
  date:    &["DISCOVERY_DATE"],
  time:    &["DISCOVERY_TIME"],
  ra:      &["SRC_RA"],
  dec:     &["SRC_DEC"],
  error:   &["SRC_ERROR", "SRC_ERROR90"],
  extras:  &[
    ("run_num", "RUN_NUM"),
    ("event_name", "EVENT_NAME"),
    ("energy", "ENERGY"),
    ("signalness", "SIGNALNESS"),
    ("far", "FAR"),
  ],
};

const HAWC: Layout = Layout {
  trigger: &["EVENT_NUM"],
  date:    &["DISCOVERY_DATE"],
  time:    &["DISCOVERY_TIME"],
  ra:      &["SRC_RA"],
  dec:     &["SRC_DEC"],
  error:   &["SRC_ERROR"],
  extras:  &[("run_num", "RUN_NUM"), ("far", "FAR")],
};

const CALET: Layout = Layout {
  trigger: &["TRIGGER_NUM"],
  date:    &["TRIGGER_DATE"],
  time:    &["TRIGGER_TIME"],
  ra:      &["POINT_RA"],
  dec:     &["POINT_DEC"],
  error:   &[],
  extras:  &[],
};

/// Probe every known key so unknown facilities still yield what they can.
const GENERIC: Layout = Layout {
  trigger: &["TRIGGER_NUM", "EVENT_NUM"],
  date:    &["GRB_DATE", "IMG_START_DATE", "DISCOVERY_DATE", "TRIGGER_DATE"],
  time:    &["GRB_TIME", "IMG_START_TIME", "DISCOVERY_TIME", "TRIGGER_TIME"],
  ra:      &["GRB_RA", "SRC_RA", "POINT_RA"],
  dec:     &["GRB_DEC", "SRC_DEC", "POINT_DEC"],
  error:   &["GRB_ERROR", "SRC_ERROR", "SRC_ERROR90"],
  extras:  &[("notice_type", "NOTICE_TYPE")],
};

pub(crate) fn layout(instrument: Instrument) -> &'static Layout {
  match instrument {
    Instrument::SwiftBat => &SWIFT_BAT,
    Instrument::SwiftXrt | Instrument::SwiftUvot => &SWIFT_IMAGING,
    Instrument::FermiGbm | Instrument::FermiLat => &FERMI,
    Instrument::Amon => &AMON,
    Instrument::IceCubeGold | Instrument::IceCubeBronze => &ICECUBE_TRACK,
    Instrument::IceCubeCascade => &ICECUBE_CASCADE,
    Instrument::Hawc => &HAWC,
    Instrument::Calet => &CALET,
    Instrument::EinsteinProbe | Instrument::Unknown => &GENERIC,
  }
}

// ─── Key/value lines ─────────────────────────────────────────────────────────

/// `KEY: value` pairs in document order. Repeated keys (COMMENTS) are kept.
pub(crate) struct KeyValues<'a> {
  pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> KeyValues<'a> {
  pub(crate) fn parse(raw: &'a str) -> Self {
    let pairs = raw
      .lines()
      .filter_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        let is_key = !key.is_empty()
          && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        is_key.then(|| (key, value.trim()))
      })
      .collect();
    Self { pairs }
  }

  pub(crate) fn get(&self, key: &str) -> Option<&'a str> {
    self
      .pairs
      .iter()
      .find(|(k, _)| *k == key)
      .map(|(_, v)| *v)
  }

  pub(crate) fn first_of(&self, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| self.get(k))
  }
}

// ─── Patterns ────────────────────────────────────────────────────────────────

/// Compiled patterns for the date-like notice values.
pub(crate) struct Patterns {
  /// `25/05/20` (YY/MM/DD) anywhere in a date value.
  date:        Regex,
  /// `{10:30:15.25}` inside a time value.
  time:        Regex,
  /// `Thu 20 May 25 10:30:15 UT`; the weekday is ignored.
  notice_date: Regex,
}

impl Patterns {
  pub(crate) fn new() -> Result<Self> {
    Ok(Self {
      date:        Regex::new(r"(\d{2})/(\d{2})/(\d{2})")?,
      time:        Regex::new(r"\{\s*(\d{1,2}:\d{2}:\d{2}(?:\.\d+)?)\s*\}")?,
      notice_date: Regex::new(
        r"(\d{1,2})\s+([A-Za-z]{3})\s+(\d{2})\s+(\d{2}:\d{2}:\d{2})",
      )?,
    })
  }

  fn date(&self, value: &str) -> Option<NaiveDate> {
    let caps = self.date.captures(value)?;
    let yy: i32 = caps[1].parse().ok()?;
    let mm: u32 = caps[2].parse().ok()?;
    let dd: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
  }

  fn time(&self, value: &str) -> Option<NaiveTime> {
    let caps = self.time.captures(value)?;
    NaiveTime::parse_from_str(&caps[1], "%H:%M:%S%.f").ok()
  }

  fn notice_date(&self, value: &str) -> Option<DateTime<Utc>> {
    let caps = self.notice_date.captures(value)?;
    let text = format!("{} {} {} {}", &caps[1], &caps[2], &caps[3], &caps[4]);
    NaiveDateTime::parse_from_str(&text, "%d %b %y %H:%M:%S")
      .ok()
      .map(|dt| dt.and_utc())
  }
}

// ─── Text notices ────────────────────────────────────────────────────────────

pub(crate) fn extract_text(
  patterns: &Patterns,
  instrument: Instrument,
  raw: &str,
  received_time: DateTime<Utc>,
  strict: bool,
) -> Result<Fragment> {
  let kv = KeyValues::parse(raw);
  let layout = layout(instrument);
  let mission = instrument.mission();

  let trigger = kv
    .first_of(layout.trigger)
    .and_then(first_token)
    .map(str::to_owned);

  let event_time = match (
    kv.first_of(layout.date).and_then(|v| patterns.date(v)),
    kv.first_of(layout.time).and_then(|v| patterns.time(v)),
  ) {
    (Some(d), Some(t)) => Some(d.and_time(t).and_utc()),
    _ => None,
  };

  let coordinates = match (
    kv.first_of(layout.ra).and_then(leading_number),
    kv.first_of(layout.dec).and_then(leading_number),
  ) {
    (Some(ra), Some(dec)) => {
      let error = kv.first_of(layout.error).and_then(error_radius);
      Some(Coordinates::new(ra, dec, error))
    }
    _ => None,
  };

  if strict && instrument.is_known() {
    let mut missing = Vec::new();
    if trigger.is_none() {
      missing.push("trigger");
    }
    if event_time.is_none() {
      missing.push("event_time");
    }
    if coordinates.is_none() {
      missing.push("coordinates");
    }
    if !missing.is_empty() {
      return Err(Error::MissingFields { instrument, fields: missing });
    }
  }

  let event_id = match &trigger {
    Some(t) => EventId::trigger(mission, t),
    None => {
      debug!(%instrument, "notice has no trigger number; using payload digest");
      digest_id(mission, raw)
    }
  };

  let mut fragment =
    Fragment::new(event_id, SourceKind::Notice, received_time, raw);
  fragment.instrument = instrument;
  fragment.trigger_num = trigger.into();
  fragment.event_time = event_time.into();
  fragment.coordinates = coordinates.into();

  let mut extras: BTreeMap<String, Field<String>> = BTreeMap::new();
  extras.insert(
    "notice_date".to_owned(),
    kv.get("NOTICE_DATE")
      .and_then(|v| patterns.notice_date(v))
      .map(|dt| dt.to_rfc3339())
      .into(),
  );
  for (name, key) in layout.extras {
    let value = kv
      .get(key)
      .map(strip_unit)
      .filter(|v| !v.is_empty())
      .map(str::to_owned);
    extras.insert((*name).to_owned(), value.into());
  }

  // Cascade notices carry their own public name.
  if let Some(Field::Known(name)) = extras.get("event_name") {
    fragment.name = Field::Known(name.clone());
    fragment.aliases.push(EventId::new(name));
  }
  fragment.extra_fields = extras;

  Ok(fragment)
}

// ─── Einstein Probe ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct EinsteinProbeAlert {
  #[serde(default)]
  trigger_time: Option<String>,
  #[serde(default)]
  id:           Vec<serde_json::Value>,
  #[serde(default)]
  ra:           Option<f64>,
  #[serde(default)]
  dec:          Option<f64>,
  #[serde(default)]
  ra_dec_error: Option<f64>,
  #[serde(default)]
  instrument:   Option<String>,
}

pub(crate) fn extract_einstein_probe(
  raw: &str,
  received_time: DateTime<Utc>,
  strict: bool,
) -> Result<Fragment> {
  let alert: EinsteinProbeAlert = serde_json::from_str(raw)?;

  let trigger = alert.id.first().and_then(|v| match v {
    serde_json::Value::String(s) => Some(s.trim().to_owned()),
    serde_json::Value::Number(n) => Some(n.to_string()),
    _ => None,
  });
  let event_time = alert
    .trigger_time
    .as_deref()
    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
    .map(|dt| dt.with_timezone(&Utc));
  let coordinates = match (alert.ra, alert.dec) {
    (Some(ra), Some(dec)) => Some(Coordinates::new(ra, dec, alert.ra_dec_error)),
    _ => None,
  };

  if strict && (trigger.is_none() || event_time.is_none() || coordinates.is_none())
  {
    let mut fields = Vec::new();
    if trigger.is_none() {
      fields.push("trigger");
    }
    if event_time.is_none() {
      fields.push("event_time");
    }
    if coordinates.is_none() {
      fields.push("coordinates");
    }
    return Err(Error::MissingFields {
      instrument: Instrument::EinsteinProbe,
      fields,
    });
  }

  let event_id = match &trigger {
    Some(t) => EventId::trigger(Mission::EinsteinProbe, t),
    None => digest_id(Mission::EinsteinProbe, raw),
  };
  let mut fragment =
    Fragment::new(event_id, SourceKind::Notice, received_time, raw);
  fragment.instrument = Instrument::EinsteinProbe;
  fragment.trigger_num = trigger.into();
  fragment.event_time = event_time.into();
  fragment.coordinates = coordinates.into();
  fragment
    .extra_fields
    .insert("ep_instrument".into(), alert.instrument.into());
  Ok(fragment)
}
