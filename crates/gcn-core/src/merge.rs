//! Per-field refinement of an [`EventRecord`] by an incoming [`Fragment`].
//!
//! Rules, applied field by field:
//!
//! - An `Unknown` incoming value never overwrites anything.
//! - A known value fills an `Unknown` slot unconditionally.
//! - Coordinates are replaced only by a strictly smaller error radius. Equal
//!   radii fall back to recency.
//! - Every other field is replaced only by a strictly newer `received_time`.
//! - Remaining ties with differing values are a [`MergeConflict`]: the
//!   configured authoritative source wins against the other source, and the
//!   existing value is kept against its own source.
//!
//! Everything here is pure; the store logs the conflicts it gets back.

use std::cmp::Ordering;

use crate::{
  event::{
    Coordinates, EventRecord, FieldKey, Fragment, Instrument, Provenance,
    SourceKind,
  },
  field::Field,
};

// ─── Outcome types ───────────────────────────────────────────────────────────

/// How a merge changed the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
  Created,
  UpdatedSameSource,
  UpdatedCrossSource,
  DuplicateIgnored,
}

/// Configuration for the merge tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
  pub authoritative_source: SourceKind,
}

impl Default for MergePolicy {
  fn default() -> Self {
    Self { authoritative_source: SourceKind::Notice }
  }
}

/// A field whose precedence could not be decided by precision or recency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
  pub field:    FieldKey,
  pub existing: Provenance,
  pub incoming: Provenance,
  /// Whether the tie-break replaced the existing value.
  pub replaced: bool,
}

/// Result of folding one fragment into one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refinement {
  pub changed:   Vec<FieldKey>,
  pub conflicts: Vec<MergeConflict>,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Fold `fragment` into `record` in place.
pub fn refine(
  record: &mut EventRecord,
  fragment: &Fragment,
  policy: &MergePolicy,
) -> Refinement {
  let incoming = Provenance {
    source:        fragment.source_kind,
    received_time: fragment.received_time,
  };
  let mut out = Refinement::default();

  // The instrument uses `Unknown` as its own marker.
  let mut instrument = known_instrument(record.instrument);
  refine_by_recency(
    FieldKey::Instrument,
    &mut instrument,
    &known_instrument(fragment.instrument),
    record,
    incoming,
    policy,
    &mut out,
  );
  if let Field::Known(i) = instrument {
    record.instrument = i;
  }

  let mut name = std::mem::take(&mut record.name);
  refine_by_recency(
    FieldKey::Name,
    &mut name,
    &fragment.name,
    record,
    incoming,
    policy,
    &mut out,
  );
  record.name = name;

  let mut trigger = std::mem::take(&mut record.trigger_num);
  refine_by_recency(
    FieldKey::TriggerNum,
    &mut trigger,
    &fragment.trigger_num,
    record,
    incoming,
    policy,
    &mut out,
  );
  record.trigger_num = trigger;

  let mut event_time = record.event_time;
  refine_by_recency(
    FieldKey::EventTime,
    &mut event_time,
    &fragment.event_time,
    record,
    incoming,
    policy,
    &mut out,
  );
  record.event_time = event_time;

  let mut retracted = record.retracted;
  refine_by_recency(
    FieldKey::Retracted,
    &mut retracted,
    &fragment.retracted,
    record,
    incoming,
    policy,
    &mut out,
  );
  record.retracted = retracted;

  refine_coordinates(record, &fragment.coordinates, incoming, policy, &mut out);

  for (key, value) in &fragment.extra_fields {
    let field_key = FieldKey::Extra(key.clone());
    let mut current = record.extra_fields.remove(key).unwrap_or_default();
    refine_by_recency(
      field_key, &mut current, value, record, incoming, policy, &mut out,
    );
    record.extra_fields.insert(key.clone(), current);
  }

  // Record-level bookkeeping follows the newest fragment.
  if fragment.received_time >= record.received_time || record.raw_text.is_empty()
  {
    record.received_time = fragment.received_time.max(record.received_time);
    record.source_kind = fragment.source_kind;
    record.raw_text.clone_from(&fragment.raw_text);
  }
  record.aliases.insert(fragment.event_id.clone());
  record.aliases.extend(fragment.aliases.iter().cloned());

  out
}

// ─── Field rules ─────────────────────────────────────────────────────────────

fn known_instrument(i: Instrument) -> Field<Instrument> {
  if i.is_known() { Field::Known(i) } else { Field::Unknown }
}

/// Outcome of comparing an incoming known value with an existing one.
enum Verdict {
  Keep,
  Replace,
  Tie,
}

fn by_recency(existing: Option<&Provenance>, incoming: &Provenance) -> Verdict {
  match existing {
    None => Verdict::Replace,
    Some(cur) => match incoming.received_time.cmp(&cur.received_time) {
      Ordering::Greater => Verdict::Replace,
      Ordering::Less => Verdict::Keep,
      Ordering::Equal => Verdict::Tie,
    },
  }
}

fn refine_by_recency<T: Clone + PartialEq>(
  key: FieldKey,
  current: &mut Field<T>,
  incoming_value: &Field<T>,
  record: &mut EventRecord,
  incoming: Provenance,
  policy: &MergePolicy,
  out: &mut Refinement,
) {
  let Field::Known(new) = incoming_value else {
    return;
  };
  let verdict = match &*current {
    Field::Unknown => Verdict::Replace,
    Field::Known(old) if old == new => return,
    Field::Known(_) => by_recency(record.provenance.get(&key), &incoming),
  };
  if decide(verdict, &key, record, incoming, policy, out) {
    *current = Field::Known(new.clone());
    record.provenance.insert(key.clone(), incoming);
    out.changed.push(key);
  }
}

fn refine_coordinates(
  record: &mut EventRecord,
  incoming_value: &Field<Coordinates>,
  incoming: Provenance,
  policy: &MergePolicy,
  out: &mut Refinement,
) {
  let Field::Known(new) = incoming_value else {
    return;
  };
  let key = FieldKey::Coordinates;
  let verdict = match &record.coordinates {
    Field::Unknown => Verdict::Replace,
    Field::Known(old) if old == new => return,
    Field::Known(old) => {
      match new.uncertainty().partial_cmp(&old.uncertainty()) {
        Some(Ordering::Less) => Verdict::Replace,
        Some(Ordering::Greater) => Verdict::Keep,
        // Equal radii (or both missing) fall back to recency.
        _ => by_recency(record.provenance.get(&key), &incoming),
      }
    }
  };
  if decide(verdict, &key, record, incoming, policy, out) {
    record.coordinates = Field::Known(*new);
    record.provenance.insert(key.clone(), incoming);
    out.changed.push(key);
  }
}

/// Resolve a verdict to "replace or not", breaking ties deterministically.
fn decide(
  verdict: Verdict,
  key: &FieldKey,
  record: &EventRecord,
  incoming: Provenance,
  policy: &MergePolicy,
  out: &mut Refinement,
) -> bool {
  match verdict {
    Verdict::Replace => true,
    Verdict::Keep => false,
    Verdict::Tie => {
      let existing = record.provenance.get(key).copied().unwrap_or(incoming);
      let replaced = existing.source != incoming.source
        && incoming.source == policy.authoritative_source;
      out.conflicts.push(MergeConflict {
        field: key.clone(),
        existing,
        incoming,
        replaced,
      });
      replaced
    }
  }
}
