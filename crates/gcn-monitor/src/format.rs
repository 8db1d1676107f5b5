//! Human-readable notification text for a merged event.

use chrono::{DateTime, Utc};
use gcn_core::{EventRecord, FieldKey, merge::ChangeKind};
use gcn_sky::{Visibility, VisibilityResult};

pub fn format_time(t: DateTime<Utc>) -> String { t.format("%Y-%m-%d %H:%M:%S UTC").to_string() }

/// Right ascension in degrees as `HH:MM:SS.ss`.
pub fn ra_hms(ra_deg: f64) -> String {
  let day = 24 * 3600 * 100;
  let cs = ((ra_deg.rem_euclid(360.0) / 15.0 * 3600.0 * 100.0).round() as i64) % day;
  format!(
    "{:02}:{:02}:{:02}.{:02}",
    cs / 360_000,
    cs / 6_000 % 60,
    cs / 100 % 60,
    cs % 100
  )
}

/// Declination in degrees as `±DD:MM:SS.s`.
pub fn dec_dms(dec_deg: f64) -> String {
  let sign = if dec_deg < 0.0 { '-' } else { '+' };
  let ds = (dec_deg.abs() * 3600.0 * 10.0).round() as i64;
  format!(
    "{sign}{:02}:{:02}:{:02}.{}",
    ds / 36_000,
    ds / 600 % 60,
    ds / 10 % 60,
    ds % 10
  )
}

fn section(out: &mut String, title: &str, lines: &[String]) {
  if lines.is_empty() {
    return;
  }
  out.push_str(&format!("*[{title}]*\n> {}\n\n", lines.join("\n> ")));
}

fn visibility_line(v: &VisibilityResult) -> String {
  let conditions = format!(
    "alt {:.1} deg, moon {:.1} deg",
    v.altitude_deg, v.moon_separation_deg
  );
  match (v.classification, v.window_start, v.window_end) {
    (Visibility::ObservableNow, _, Some(end)) => format!(
      "{}: observable now until {} ({conditions}, {:.1} h left)",
      v.observer,
      format_time(end),
      v.remaining_hours.unwrap_or_default()
    ),
    (Visibility::ObservableLater, Some(start), Some(end)) => format!(
      "{}: observable later, {} to {} ({conditions})",
      v.observer,
      format_time(start),
      format_time(end)
    ),
    _ => format!("{}: not observable within the search horizon ({conditions})", v.observer),
  }
}

/// Render the record and per-site visibility as sectioned text.
pub fn summary(
  record: &EventRecord,
  change: ChangeKind,
  changed_fields: &[FieldKey],
  visibility: &[VisibilityResult],
) -> String {
  let mut out = String::new();
  let headline = match change {
    ChangeKind::Created => "New event",
    ChangeKind::UpdatedSameSource | ChangeKind::UpdatedCrossSource => "Event update",
    ChangeKind::DuplicateIgnored => "Duplicate",
  };
  out.push_str(&format!("*{headline}: {}*\n\n", record.display_name()));

  let mut basic = vec![
    format!("TITLE: {}", record.display_name()),
    format!("EVENT ID: {}", record.event_id),
    format!("FACILITY: {}", record.instrument),
    format!("SOURCE: {}", record.source_kind),
  ];
  if let Some(trigger) = record.trigger_num.known() {
    basic.push(format!("TRIGGER: {trigger}"));
  }
  if record.is_retracted() {
    basic.push("STATUS: RETRACTED".to_owned());
  }
  section(&mut out, "BASIC INFO", &basic);

  let location = match record.coordinates.known() {
    Some(c) => {
      let mut lines = vec![
        format!("RA: {:.2} deg ({})", c.ra_deg, ra_hms(c.ra_deg)),
        format!("DEC: {:.2} deg ({})", c.dec_deg, dec_dms(c.dec_deg)),
      ];
      if let Some(e) = c.error_deg {
        lines.push(format!("ERROR: {e:.4} deg ({:.1} arcsec)", e * 3600.0));
      }
      lines
    }
    None => vec!["POSITION: unknown".to_owned()],
  };
  section(&mut out, "LOCATION", &location);

  let mut timing = Vec::new();
  if let Some(t) = record.event_time.known() {
    timing.push(format!("EVENT TIME: {}", format_time(*t)));
  }
  timing.push(format!("RECEIVED: {}", format_time(record.received_time)));
  timing.push(format!("FIRST SEEN: {}", format_time(record.first_seen)));
  section(&mut out, "TIMING", &timing);

  let analysis: Vec<String> = record
    .extra_fields
    .iter()
    .filter_map(|(k, v)| v.known().map(|v| format!("{}: {v}", k.to_uppercase())))
    .collect();
  section(&mut out, "ANALYSIS", &analysis);

  let visibility_lines: Vec<String> = if visibility.is_empty() {
    vec!["not evaluated".to_owned()]
  } else {
    visibility.iter().map(visibility_line).collect()
  };
  section(&mut out, "VISIBILITY", &visibility_lines);

  if matches!(change, ChangeKind::UpdatedSameSource | ChangeKind::UpdatedCrossSource)
    && !changed_fields.is_empty()
  {
    let fields: Vec<String> = changed_fields.iter().map(FieldKey::to_string).collect();
    section(&mut out, "UPDATED", &[fields.join(", ")]);
  }

  out.trim_end().to_owned()
}
