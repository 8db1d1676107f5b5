//! Encoding and decoding between domain records and flat table rows.
//!
//! Both backends store the same row shape. Timestamps are RFC 3339 strings,
//! unknown fields are empty cells (`NULL` in SQLite), and the structured
//! columns (aliases, extras, provenance, fingerprints) are compact JSON.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use gcn_core::{
  Coordinates, EventId, EventRecord, Field, FieldKey, Instrument, Provenance,
  SourceKind, store::UnlinkedMessage,
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column order shared by the CSV header and the SQLite tables.
pub const RECORD_COLUMNS: &[&str] = &[
  "event_id",
  "designation",
  "source_kind",
  "instrument",
  "name",
  "trigger_num",
  "ra_deg",
  "dec_deg",
  "error_deg",
  "event_time",
  "received_time",
  "first_seen",
  "retracted",
  "aliases",
  "extra_fields",
  "provenance",
  "fingerprints",
  "raw_text",
];

/// One event row as plain column values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
  pub event_id:      String,
  pub designation:   String,
  pub source_kind:   String,
  pub instrument:    String,
  pub name:          Option<String>,
  pub trigger_num:   Option<String>,
  pub ra_deg:        Option<f64>,
  pub dec_deg:       Option<f64>,
  pub error_deg:     Option<f64>,
  pub event_time:    Option<String>,
  pub received_time: String,
  pub first_seen:    String,
  pub retracted:     Option<bool>,
  pub aliases:       String,
  pub extra_fields:  String,
  pub provenance:    String,
  pub fingerprints:  String,
  pub raw_text:      String,
}

impl RawRecord {
  pub fn from_record(r: &EventRecord) -> Result<Self> {
    let coords = r.coordinates.known();
    let extras: BTreeMap<&str, Option<&str>> = r
      .extra_fields
      .iter()
      .map(|(k, v)| (k.as_str(), v.known().map(String::as_str)))
      .collect();
    let provenance: BTreeMap<String, &Provenance> = r
      .provenance
      .iter()
      .map(|(k, p)| (k.to_string(), p))
      .collect();

    Ok(Self {
      event_id:      r.event_id.to_string(),
      designation:   r.designation.clone(),
      source_kind:   r.source_kind.to_string(),
      instrument:    r.instrument.to_string(),
      name:          r.name.known().cloned(),
      trigger_num:   r.trigger_num.known().cloned(),
      ra_deg:        coords.map(|c| c.ra_deg),
      dec_deg:       coords.map(|c| c.dec_deg),
      error_deg:     coords.and_then(|c| c.error_deg),
      event_time:    r.event_time.known().map(|t| encode_dt(*t)),
      received_time: encode_dt(r.received_time),
      first_seen:    encode_dt(r.first_seen),
      retracted:     r.retracted.known().copied(),
      aliases:       serde_json::to_string(&r.aliases)?,
      extra_fields:  serde_json::to_string(&extras)?,
      provenance:    serde_json::to_string(&provenance)?,
      fingerprints:  serde_json::to_string(&r.fingerprints)?,
      raw_text:      r.raw_text.clone(),
    })
  }

  pub fn into_record(self) -> Result<EventRecord> {
    let coordinates = match (self.ra_deg, self.dec_deg) {
      (Some(ra), Some(dec)) => Field::Known(Coordinates::new(ra, dec, self.error_deg)),
      (None, None) => Field::Unknown,
      _ => {
        return Err(Error::InvalidRow {
          event_id: self.event_id,
          reason:   "only one of ra_deg/dec_deg is set".into(),
        });
      }
    };

    let extras: BTreeMap<String, Option<String>> =
      serde_json::from_str(&self.extra_fields)?;
    let provenance: BTreeMap<String, Provenance> =
      serde_json::from_str(&self.provenance)?;
    let provenance = provenance
      .into_iter()
      .map(|(k, p)| -> Result<(FieldKey, Provenance)> { Ok((k.parse()?, p)) })
      .collect::<Result<BTreeMap<_, _>>>()?;
    let aliases: BTreeSet<EventId> = serde_json::from_str(&self.aliases)?;
    let fingerprints: BTreeSet<String> = serde_json::from_str(&self.fingerprints)?;

    Ok(EventRecord {
      event_id: EventId::new(&self.event_id),
      aliases,
      designation: self.designation,
      source_kind: SourceKind::parse(&self.source_kind)?,
      instrument: Instrument::parse(&self.instrument)?,
      name: self.name.into(),
      trigger_num: self.trigger_num.into(),
      coordinates,
      event_time: self.event_time.as_deref().map(decode_dt).transpose()?.into(),
      received_time: decode_dt(&self.received_time)?,
      first_seen: decode_dt(&self.first_seen)?,
      retracted: self.retracted.into(),
      raw_text: self.raw_text,
      extra_fields: extras.into_iter().map(|(k, v)| (k, v.into())).collect(),
      provenance,
      fingerprints,
    })
  }
}

/// One row of the `unlinked` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUnlinked {
  pub topic:         String,
  pub source_kind:   String,
  pub reason:        String,
  pub received_time: String,
  pub raw_text:      String,
}

impl RawUnlinked {
  pub fn from_message(m: &UnlinkedMessage) -> Self {
    Self {
      topic:         m.topic.clone(),
      source_kind:   m.source_kind.to_string(),
      reason:        m.reason.clone(),
      received_time: encode_dt(m.received_time),
      raw_text:      m.raw_text.clone(),
    }
  }

  pub fn into_message(self) -> Result<UnlinkedMessage> {
    Ok(UnlinkedMessage {
      topic:         self.topic,
      source_kind:   SourceKind::parse(&self.source_kind)?,
      reason:        self.reason,
      received_time: decode_dt(&self.received_time)?,
      raw_text:      self.raw_text,
    })
  }
}

/// Index decoded rows by event id.
pub fn index(rows: Vec<RawRecord>) -> Result<BTreeMap<EventId, EventRecord>> {
  rows
    .into_iter()
    .map(|raw| -> Result<(EventId, EventRecord)> {
      let record = raw.into_record()?;
      Ok((record.event_id.clone(), record))
    })
    .collect()
}
