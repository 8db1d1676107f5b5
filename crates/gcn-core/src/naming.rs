//! Provisional event designations (`GRB 250322A`, `EP 250321a`,
//! `IceCube-250320A`).
//!
//! A designation is assigned once, when the combined table first sees an
//! event, and never changes. A name reported later by a circular takes
//! precedence for display via [`EventRecord::display_name`].
//!
//! [`EventRecord::display_name`]: crate::event::EventRecord::display_name

use chrono::NaiveDate;

use crate::event::{Instrument, Mission};

/// Prefix and letter case used for a family of designations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignationStyle {
  Grb,
  EinsteinProbe,
  Neutrino,
}

impl DesignationStyle {
  pub fn for_instrument(instrument: Instrument) -> Self {
    match instrument.mission() {
      Mission::EinsteinProbe => DesignationStyle::EinsteinProbe,
      Mission::IceCube => DesignationStyle::Neutrino,
      _ => DesignationStyle::Grb,
    }
  }

  fn prefix(self) -> &'static str {
    match self {
      DesignationStyle::Grb => "GRB ",
      DesignationStyle::EinsteinProbe => "EP ",
      DesignationStyle::Neutrino => "IceCube-",
    }
  }

  fn lowercase(self) -> bool { self == DesignationStyle::EinsteinProbe }
}

/// Pick the first unused designation for `date` in `style`.
///
/// Suffixes run `A..Z`, then `AA..ZZ`, in the style's letter case.
pub fn allocate<'a>(
  style: DesignationStyle,
  date: NaiveDate,
  existing: impl IntoIterator<Item = &'a str>,
) -> String {
  let stem = format!("{}{}", style.prefix(), date.format("%y%m%d"));
  let taken: Vec<&str> = existing
    .into_iter()
    .filter_map(|d| d.strip_prefix(stem.as_str()))
    .collect();

  let mut index = 0usize;
  loop {
    let suffix = suffix(index, style.lowercase());
    if !taken.contains(&suffix.as_str()) {
      return format!("{stem}{suffix}");
    }
    index += 1;
  }
}

/// Bijective base-26 letters: 0 → A, 25 → Z, 26 → AA.
fn suffix(mut index: usize, lowercase: bool) -> String {
  let base = if lowercase { b'a' } else { b'A' };
  let mut letters = Vec::new();
  loop {
    letters.push(base + (index % 26) as u8);
    if index < 26 {
      break;
    }
    index = index / 26 - 1;
  }
  letters.reverse();
  String::from_utf8_lossy(&letters).into_owned()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 3, 22).unwrap() }

  #[test]
  fn first_designation_of_the_day() {
    let name = allocate(DesignationStyle::Grb, day(), []);
    assert_eq!(name, "GRB 250322A");
  }

  #[test]
  fn skips_taken_letters() {
    let existing = ["GRB 250322A", "GRB 250322B", "GRB 250321C"];
    let name = allocate(DesignationStyle::Grb, day(), existing);
    assert_eq!(name, "GRB 250322C");
  }

  #[test]
  fn einstein_probe_uses_lowercase() {
    let name = allocate(DesignationStyle::EinsteinProbe, day(), ["EP 250322a"]);
    assert_eq!(name, "EP 250322b");
  }

  #[test]
  fn neutrino_prefix() {
    let style = DesignationStyle::for_instrument(Instrument::IceCubeGold);
    assert_eq!(allocate(style, day(), []), "IceCube-250322A");
  }

  #[test]
  fn suffix_rolls_over_to_two_letters() {
    assert_eq!(suffix(25, false), "Z");
    assert_eq!(suffix(26, false), "AA");
    assert_eq!(suffix(27, false), "AB");
    assert_eq!(suffix(26 * 27 - 1, false), "ZZ");
  }
}
