//! Low-level value parsers shared by the notice and circular extractors.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use gcn_core::{EventId, Mission};

/// Parse the number at the start of `s`, e.g. `150.1234d {...}` → 150.1234.
pub(crate) fn leading_number(s: &str) -> Option<f64> {
  let s = s.trim_start();
  let end = s
    .char_indices()
    .find(|(i, c)| {
      !(c.is_ascii_digit()
        || *c == '.'
        || ((*c == '+' || *c == '-')
          && (*i == 0 || matches!(s[..*i].chars().last(), Some('e' | 'E'))))
        || ((*c == 'e' || *c == 'E') && *i > 0))
    })
    .map(|(i, _)| i)
    .unwrap_or(s.len());
  s[..end].parse().ok()
}

/// Convert an error radius to degrees. Unrecognised units are taken as
/// degrees.
pub(crate) fn to_degrees(value: f64, unit: &str) -> f64 {
  match unit.trim().to_ascii_lowercase().as_str() {
    "arcsec" | "\"" | "''" => value / 3600.0,
    "arcmin" | "'" => value / 60.0,
    _ => value,
  }
}

/// Parse a notice error field such as `3.5 [arcsec radius]`.
pub(crate) fn error_radius(s: &str) -> Option<f64> {
  let value = leading_number(s)?;
  let unit = s
    .split_once('[')
    .map(|(_, rest)| {
      rest
        .split(|c: char| c.is_whitespace() || c == ']')
        .next()
        .unwrap_or("")
    })
    .unwrap_or("deg");
  Some(to_degrees(value, unit))
}

/// Strip a trailing `[unit]` annotation from a notice value.
pub(crate) fn strip_unit(s: &str) -> &str {
  s.split('[').next().unwrap_or(s).trim()
}

/// First whitespace-delimited token, if any.
pub(crate) fn first_token(s: &str) -> Option<&str> { s.split_whitespace().next() }

pub(crate) fn hms_to_degrees(h: f64, m: f64, s: f64) -> f64 {
  (h + m / 60.0 + s / 3600.0) * 15.0
}

pub(crate) fn dms_to_degrees(negative: bool, d: f64, m: f64, s: f64) -> f64 {
  let v = d.abs() + m / 60.0 + s / 3600.0;
  if negative { -v } else { v }
}

pub(crate) fn valid_position(ra: f64, dec: f64) -> bool {
  ra.is_finite() && dec.is_finite() && (0.0..=360.0).contains(&ra) && dec.abs() <= 90.0
}

/// Identifier of last resort: a digest of the payload under the mission.
pub(crate) fn digest_id(mission: Mission, raw: &str) -> EventId {
  let digest = hex::encode(Sha256::digest(raw.as_bytes()));
  EventId::new(format!("{mission}-{}", &digest[..12]))
}

/// Milliseconds since the epoch, as sent in circular envelopes.
pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn leading_number_handles_notice_shapes() {
    assert_eq!(leading_number("150.1234d {+10h 00m 30s} (J2000)"), Some(150.1234));
    assert_eq!(leading_number("-25.5678d {-25d 34' 04\"}"), Some(-25.5678));
    assert_eq!(leading_number("2.14e+02 [TeV]"), Some(214.0));
    assert_eq!(leading_number("6.23e-01 [dn]"), Some(0.623));
    assert_eq!(leading_number("n/a"), None);
  }

  #[test]
  fn error_radius_converts_units() {
    assert_eq!(error_radius("3.0 [arcmin radius]"), Some(0.05));
    assert_eq!(error_radius("36.0 [arcsec radius, 90% containment]"), Some(0.01));
    assert_eq!(error_radius("2.5 [deg radius]"), Some(2.5));
    assert_eq!(error_radius("0.5"), Some(0.5));
  }

  #[test]
  fn sexagesimal_conversion() {
    let ra = hms_to_degrees(7.0, 7.0, 2.52);
    assert!((ra - 106.7605).abs() < 1e-3);
    let dec = dms_to_degrees(false, 7.0, 11.0, 35.3);
    assert!((dec - 7.19314).abs() < 1e-4);
    assert!(dms_to_degrees(true, 0.0, 30.0, 0.0) < 0.0);
  }

  #[test]
  fn digest_ids_are_stable() {
    let a = digest_id(Mission::Unknown, "payload");
    let b = digest_id(Mission::Unknown, "payload");
    assert_eq!(a, b);
    assert!(a.as_str().starts_with("UNKNOWN-"));
    assert_eq!(a.as_str().len(), "UNKNOWN-".len() + 12);
  }
}
