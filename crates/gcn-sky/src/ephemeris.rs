//! Low-precision solar and lunar ephemeris and horizon geometry.
//!
//! Series are the Astronomical Almanac low-precision formulae: the Sun to
//! about 0.01 deg and the Moon to about 0.3 deg between 1950 and 2050. The
//! Moon is geocentric and no refraction is applied.

use chrono::{DateTime, Utc};

/// Julian date of the Unix epoch.
const JD_UNIX_EPOCH: f64 = 2_440_587.5;
/// Julian date of J2000.0.
const JD_J2000: f64 = 2_451_545.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Equatorial position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
  pub ra_deg:  f64,
  pub dec_deg: f64,
}

/// Wrap an angle into [0, 360).
pub fn normalize_deg(angle: f64) -> f64 {
  let wrapped = angle.rem_euclid(360.0);
  // rem_euclid can round up to exactly 360 for tiny negative inputs.
  if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Millisecond resolution keeps the result a pure function of the instant.
pub fn julian_date(at: DateTime<Utc>) -> f64 {
  JD_UNIX_EPOCH + at.timestamp_millis() as f64 / MS_PER_DAY
}

fn centuries_since_j2000(jd: f64) -> f64 { (jd - JD_J2000) / 36_525.0 }

/// Greenwich mean sidereal time in degrees (IAU 1982).
pub fn gmst_deg(jd: f64) -> f64 {
  let d = jd - JD_J2000;
  let t = centuries_since_j2000(jd);
  normalize_deg(
    280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
      - t * t * t / 38_710_000.0,
  )
}

/// Local mean sidereal time in degrees; longitude is east-positive.
pub fn local_sidereal_deg(at: DateTime<Utc>, longitude_deg: f64) -> f64 {
  normalize_deg(gmst_deg(julian_date(at)) + longitude_deg)
}

fn mean_obliquity_deg(jd: f64) -> f64 {
  23.439_291 - 0.013_004_2 * centuries_since_j2000(jd)
}

fn sin_deg(x: f64) -> f64 { x.to_radians().sin() }

fn ecliptic_to_equatorial(lambda_deg: f64, beta_deg: f64, jd: f64) -> Equatorial {
  let (lambda, beta) = (lambda_deg.to_radians(), beta_deg.to_radians());
  let eps = mean_obliquity_deg(jd).to_radians();
  let ra = (lambda.sin() * eps.cos() - beta.tan() * eps.sin()).atan2(lambda.cos());
  let dec =
    (beta.sin() * eps.cos() + beta.cos() * eps.sin() * lambda.sin()).asin();
  Equatorial { ra_deg: normalize_deg(ra.to_degrees()), dec_deg: dec.to_degrees() }
}

/// Apparent solar position.
pub fn sun_position(jd: f64) -> Equatorial {
  let n = jd - JD_J2000;
  let mean_longitude = normalize_deg(280.460 + 0.985_647_4 * n);
  let mean_anomaly = normalize_deg(357.528 + 0.985_600_3 * n);
  let lambda = mean_longitude
    + 1.915 * sin_deg(mean_anomaly)
    + 0.020 * sin_deg(2.0 * mean_anomaly);
  ecliptic_to_equatorial(lambda, 0.0, jd)
}

/// Geocentric lunar position.
pub fn moon_position(jd: f64) -> Equatorial {
  let t = centuries_since_j2000(jd);
  let lambda = 218.32 + 481_267.881 * t
    + 6.29 * sin_deg(135.0 + 477_198.87 * t)
    - 1.27 * sin_deg(259.3 - 413_335.36 * t)
    + 0.66 * sin_deg(235.7 + 890_534.22 * t)
    + 0.21 * sin_deg(269.9 + 954_397.74 * t)
    - 0.19 * sin_deg(357.5 + 35_999.05 * t)
    - 0.11 * sin_deg(186.5 + 966_404.03 * t);
  let beta = 5.13 * sin_deg(93.3 + 483_202.02 * t)
    + 0.28 * sin_deg(228.2 + 960_400.89 * t)
    - 0.28 * sin_deg(318.3 + 6_003.15 * t)
    - 0.17 * sin_deg(217.6 - 407_332.21 * t);
  ecliptic_to_equatorial(normalize_deg(lambda), beta, jd)
}

/// Altitude above the horizon in degrees.
pub fn altitude_deg(
  target: Equatorial,
  latitude_deg: f64,
  local_sidereal_deg: f64,
) -> f64 {
  let hour_angle = (local_sidereal_deg - target.ra_deg).to_radians();
  let (lat, dec) = (latitude_deg.to_radians(), target.dec_deg.to_radians());
  let sin_alt = lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.cos();
  sin_alt.clamp(-1.0, 1.0).asin().to_degrees()
}

/// Great-circle separation in degrees (Vincenty form, stable near 0 and 180).
pub fn separation_deg(a: Equatorial, b: Equatorial) -> f64 {
  let (ra1, dec1) = (a.ra_deg.to_radians(), a.dec_deg.to_radians());
  let (ra2, dec2) = (b.ra_deg.to_radians(), b.dec_deg.to_radians());
  let dra = ra2 - ra1;
  let num = (dec2.cos() * dra.sin())
    .hypot(dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * dra.cos());
  let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * dra.cos();
  num.atan2(den).to_degrees()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
  }

  #[test]
  fn julian_date_of_j2000() {
    assert_eq!(julian_date(utc(2000, 1, 1, 12, 0)), JD_J2000);
  }

  #[test]
  fn gmst_at_j2000() {
    assert!((gmst_deg(JD_J2000) - 280.460_618_37).abs() < 1e-9);
  }

  #[test]
  fn normalize_wraps_negative_angles() {
    assert_eq!(normalize_deg(-10.0), 350.0);
    assert_eq!(normalize_deg(370.0), 10.0);
    assert_eq!(normalize_deg(360.0), 0.0);
  }

  #[test]
  fn sun_at_june_solstice() {
    let sun = sun_position(julian_date(utc(2025, 6, 21, 2, 42)));
    assert!((sun.dec_deg - 23.44).abs() < 0.05, "{sun:?}");
    assert!((sun.ra_deg - 90.0).abs() < 0.1, "{sun:?}");
  }

  #[test]
  fn sun_at_march_equinox() {
    let sun = sun_position(julian_date(utc(2025, 3, 20, 9, 1)));
    assert!(sun.dec_deg.abs() < 0.05, "{sun:?}");
  }

  #[test]
  fn moon_matches_reference_position() {
    // 1992-04-12 00:00: RA 134.688 deg, Dec +13.768 deg (full theory).
    let moon = moon_position(2_448_724.5);
    assert!((moon.ra_deg - 134.688).abs() < 0.3, "{moon:?}");
    assert!((moon.dec_deg - 13.768).abs() < 0.3, "{moon:?}");
  }

  #[test]
  fn separation_basics() {
    let origin = Equatorial { ra_deg: 0.0, dec_deg: 0.0 };
    let east = Equatorial { ra_deg: 90.0, dec_deg: 0.0 };
    let north = Equatorial { ra_deg: 123.0, dec_deg: 90.0 };
    let south = Equatorial { ra_deg: 0.0, dec_deg: -90.0 };
    assert!((separation_deg(origin, east) - 90.0).abs() < 1e-9);
    assert!((separation_deg(north, south) - 180.0).abs() < 1e-9);
    assert!(separation_deg(east, east).abs() < 1e-12);
  }

  #[test]
  fn object_on_meridian_at_own_latitude_is_at_zenith() {
    let target = Equatorial { ra_deg: 42.0, dec_deg: -30.0 };
    assert!((altitude_deg(target, -30.0, 42.0) - 90.0).abs() < 1e-9);
    // Twelve hours later it culminates below the pole.
    assert!((altitude_deg(target, -30.0, 222.0) + 30.0).abs() < 1e-9);
  }
}
