//! Best-effort extraction from human-written circulars.
//!
//! Circulars arrive as JSON envelopes (`subject`, `body`, `circularId`,
//! `createdOn`). A payload that is not JSON is treated as a bare body so a
//! pasted circular still gets a chance to link.

use chrono::{DateTime, Utc};
use gcn_core::{
  Coordinates, EventId, Field, Fragment, Instrument, Mission, SourceKind,
};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::{
  error::{Error, Result},
  values::{dms_to_degrees, from_millis, hms_to_degrees, to_degrees, valid_position},
};

// ─── Envelope ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
  #[serde(default)]
  subject:     String,
  #[serde(default)]
  body:        String,
  #[serde(default)]
  circular_id: Option<u64>,
  #[serde(default)]
  created_on:  Option<i64>,
  /// Set by the circulars archive when it already knows the event.
  #[serde(default)]
  event_id:    Option<String>,
}

// ─── Patterns ────────────────────────────────────────────────────────────────

fn ci(pattern: &str) -> std::result::Result<Regex, regex::Error> {
  RegexBuilder::new(pattern)
    .case_insensitive(true)
    .dot_matches_new_line(true)
    .build()
}

/// Compiled circular patterns, built once per extractor.
pub(crate) struct Patterns {
  grb_name:      Regex,
  ep_name:       Regex,
  at_name:       Regex,
  behalf:        Regex,
  /// `(pattern, instrument)`, most specific first.
  facilities:    Vec<(Regex, Instrument)>,
  swift_trigger: Vec<Regex>,
  fermi_trigger: Vec<Regex>,
  ep_trigger:    Vec<Regex>,
  decimal_pos:   Regex,
  ra_sexa:       Regex,
  dec_sexa:      Regex,
  pos_error:     Regex,
  redshift:      Vec<Regex>,
  host:          Regex,
  false_trigger: Regex,
}

impl Patterns {
  pub(crate) fn new() -> Result<Self> {
    Ok(Self {
      grb_name: Regex::new(r"\b(?:GRB|grb)\s?(\d{6}[A-Za-z]{1,2})\b")?,
      ep_name: Regex::new(r"\bEP\s?(\d{6}[a-z])\b")?,
      at_name: Regex::new(r"\bAT\s?(20\d{2}[a-z]{2,3})\b")?,
      behalf: ci(r"on\s+behalf\s+of\s+the\s+([\w\s\-/]+?)\s+(?:team|collaboration)")?,
      facilities: vec![
        (ci(r"Swift[\s/\-]?UVOT")?, Instrument::SwiftUvot),
        (ci(r"Swift[\s/\-]?XRT")?, Instrument::SwiftXrt),
        (ci(r"Swift[\s/\-]?BAT|\bBAT\s+trigger")?, Instrument::SwiftBat),
        (ci(r"Fermi[\s/\-]?LAT|Large\s+Area\s+Telescope")?, Instrument::FermiLat),
        (
          ci(r"Fermi[\s/\-]?GBM|Gamma-ray\s+Burst\s+Monitor")?,
          Instrument::FermiGbm,
        ),
        (
          ci(r"Einstein\s+Probe|\bEP[\s/\-]?(?:WXT|FXT)\b")?,
          Instrument::EinsteinProbe,
        ),
        (ci(r"IceCube[\s\-]?Cascade")?, Instrument::IceCubeCascade),
        (ci(r"\bAMON\b")?, Instrument::Amon),
        (ci(r"\bHAWC\b")?, Instrument::Hawc),
        (ci(r"\bCALET\b")?, Instrument::Calet),
      ],
      swift_trigger: vec![
        ci(r"(?:Swift|BAT)\s+trigger\s*(?:=|:|#|number)?\s*(\d{5,})")?,
        ci(r"Trigger\s+Number\s*:\s*(\d{5,})")?,
      ],
      fermi_trigger: vec![
        ci(r"trigger\s+(\d{9})\s*/\s*\d{9}")?,
        ci(r"(?:GBM|Fermi)[^.]{0,80}?trigger\s*#?\s*(\d{9})")?,
      ],
      ep_trigger: vec![
        ci(r"EP[\s\-/]?WXT\s+trigger\s+#?(\d{6,})")?,
        ci(r"\bID\s*[:=]\s*\[?\s*['\x22]?(\d{6,})")?,
      ],
      decimal_pos: ci(
        r"RA\s*,\s*Dec\.?\s*(?:\(J2000\))?\s*=\s*([0-9]+(?:\.[0-9]+)?)\s*,\s*([-+]?[0-9]+(?:\.[0-9]+)?)",
      )?,
      ra_sexa: ci(r"RA\s*\(J2000\)\s*:\s*(\d{1,2})h\s*(\d{1,2})m\s*([\d.]+)s")?,
      dec_sexa: ci(r"Dec\s*\(J2000\)\s*:\s*([-+]?)(\d{1,2})d\s*(\d{1,2})'\s*([\d.]+)")?,
      pos_error: ci(
        r#"(?:uncertainty|error\s+radius|error)\s+of\s+([0-9]+(?:\.[0-9]+)?)\s*(arcsec|arcmin|deg|degrees|"|')"#,
      )?,
      redshift: vec![
        ci(
          r"redshift\s+(?:of\s+)?(?:z\s*[=~]\s*)?([0-9]*\.[0-9]+)(?:\s*(?:±|\+/-|\+-)\s*([0-9]*\.[0-9]+))?",
        )?,
        ci(r"\bz\s*[=~]\s*([0-9]*\.[0-9]+)(?:\s*(?:±|\+/-|\+-)\s*([0-9]*\.[0-9]+))?")?,
      ],
      host: ci(r"([^.;\n]*host\s+galaxy[^.;\n]*)")?,
      false_trigger: ci(
        r"\b(?:is\s+not\s+a\s+GRB|not\s+due\s+to\s+a\s+GRB|false\s+trigger|retraction|not\s+a\s+real\s+(?:source|event))",
      )?,
    })
  }

  fn event_name(&self, text: &str) -> Option<String> {
    if let Some(c) = self.grb_name.captures(text) {
      return Some(format!("GRB {}", c[1].to_ascii_uppercase()));
    }
    if let Some(c) = self.ep_name.captures(text) {
      return Some(format!("EP{}", &c[1]));
    }
    self.at_name.captures(text).map(|c| format!("AT{}", &c[1]))
  }

  fn facility(&self, text: &str) -> Option<Instrument> {
    self
      .facilities
      .iter()
      .find(|(re, _)| re.is_match(text))
      .map(|(_, i)| *i)
  }

  fn trigger(&self, mission: Mission, text: &str) -> Option<String> {
    let patterns = match mission {
      Mission::Swift => &self.swift_trigger,
      Mission::Fermi => &self.fermi_trigger,
      Mission::EinsteinProbe => &self.ep_trigger,
      _ => return None,
    };
    patterns
      .iter()
      .find_map(|re| re.captures(text))
      .map(|c| c[1].to_owned())
  }

  fn position(&self, body: &str) -> Option<Coordinates> {
    let (ra, dec, tail) = if let Some(c) = self.decimal_pos.captures(body) {
      let ra: f64 = c[1].parse().ok()?;
      let dec: f64 = c[2].parse().ok()?;
      (ra, dec, c.get(0).map_or(body.len(), |m| m.end()))
    } else {
      let r = self.ra_sexa.captures(body)?;
      let d = self.dec_sexa.captures(body)?;
      let ra = hms_to_degrees(r[1].parse().ok()?, r[2].parse().ok()?, r[3].parse().ok()?);
      let dec = dms_to_degrees(
        &d[1] == "-",
        d[2].parse().ok()?,
        d[3].parse().ok()?,
        d[4].parse().ok()?,
      );
      (ra, dec, d.get(0).map_or(body.len(), |m| m.end()))
    };
    if !valid_position(ra, dec) {
      return None;
    }
    // The error statement follows the position.
    let error = self.pos_error.captures(&body[tail..]).and_then(|c| {
      let value: f64 = c[1].parse().ok()?;
      let unit = match &c[2] {
        "degrees" => "deg",
        other => other,
      };
      Some(to_degrees(value, unit))
    });
    Some(Coordinates::new(ra, dec, error))
  }

  fn redshift(&self, body: &str) -> Option<(String, Option<String>)> {
    self.redshift.iter().find_map(|re| {
      let c = re.captures(body)?;
      Some((c[1].to_owned(), c.get(2).map(|m| m.as_str().to_owned())))
    })
  }

  fn host(&self, body: &str) -> Option<String> {
    let c = self.host.captures(body)?;
    let sentence: String = c[1].split_whitespace().collect::<Vec<_>>().join(" ");
    (!sentence.is_empty()).then(|| sentence.chars().take(200).collect())
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

pub(crate) fn extract(
  patterns: &Patterns,
  raw: &str,
  received_time: DateTime<Utc>,
) -> Result<Fragment> {
  let envelope = match serde_json::from_str::<Envelope>(raw) {
    Ok(env) => env,
    Err(_) => Envelope { body: raw.to_owned(), ..Envelope::default() },
  };
  let subject = envelope.subject.trim();
  let body = envelope.body.as_str();

  let name = envelope
    .event_id
    .as_deref()
    .and_then(|id| patterns.event_name(id))
    .or_else(|| patterns.event_name(subject))
    .or_else(|| patterns.event_name(body));

  let behalf = patterns
    .behalf
    .captures(body)
    .map(|c| c[1].to_owned())
    .unwrap_or_default();
  let instrument = patterns
    .facility(subject)
    .or_else(|| patterns.facility(&behalf))
    .or_else(|| patterns.facility(body))
    .unwrap_or(Instrument::Unknown);
  let mission = instrument.mission();

  let full_text = format!("{subject}\n{body}");
  let trigger = patterns.trigger(mission, &full_text);
  let trigger_id = trigger.as_deref().map(|t| EventId::trigger(mission, t));

  let event_id = match (&name, &trigger_id) {
    (Some(n), _) => EventId::new(n),
    (None, Some(t)) => t.clone(),
    (None, None) => return Err(Error::NoEventReference),
  };

  let mut fragment =
    Fragment::new(event_id, SourceKind::Circular, received_time, raw);
  fragment.instrument = instrument;
  fragment.name = name.clone().into();
  fragment.trigger_num = trigger.into();
  fragment.coordinates = patterns.position(body).into();
  if patterns.false_trigger.is_match(subject) || patterns.false_trigger.is_match(body)
  {
    fragment.retracted = Field::Known(true);
  }
  if let (Some(_), Some(t)) = (&name, trigger_id) {
    fragment.aliases.push(t);
  }

  let (redshift, redshift_error) = match patterns.redshift(body) {
    Some((z, e)) => (Some(z), e),
    None => (None, None),
  };
  let extras = &mut fragment.extra_fields;
  extras.insert(
    "circular_id".into(),
    envelope.circular_id.map(|id| id.to_string()).into(),
  );
  extras.insert(
    "subject".into(),
    Some(subject.to_owned()).filter(|s| !s.is_empty()).into(),
  );
  extras.insert(
    "created_on".into(),
    envelope
      .created_on
      .and_then(from_millis)
      .map(|dt| dt.to_rfc3339())
      .into(),
  );
  extras.insert("redshift".into(), redshift.into());
  extras.insert("redshift_error".into(), redshift_error.into());
  extras.insert("host_info".into(), patterns.host(body).into());

  Ok(fragment)
}
