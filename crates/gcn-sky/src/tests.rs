use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use gcn_core::Coordinates;

use crate::{
  Constraints, Error, Observer, Visibility, altitude_series,
  ephemeris::{julian_date, local_sidereal_deg, moon_position},
  evaluate, evaluate_all,
};

fn site() -> Observer { Observer::seven_dt() }

/// Local night at El Sauce, a day before new moon.
fn night() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 5, 26, 3, 0, 0).unwrap() }

fn at_zenith(at: DateTime<Utc>) -> Coordinates {
  let site = site();
  Coordinates::new(
    local_sidereal_deg(at, site.longitude_deg),
    site.latitude_deg,
    None,
  )
}

#[test]
fn identical_inputs_give_identical_results() {
  let target = Coordinates::new(301.37, -30.0, Some(0.5));
  let a = evaluate(&target, &site(), night(), &Constraints::default()).unwrap();
  let b = evaluate(&target, &site(), night(), &Constraints::default()).unwrap();
  assert_eq!(a, b);
}

#[test]
fn rising_target_is_observable_later_at_crossing() {
  // About 20 deg up in the east and climbing.
  let target = Coordinates::new(301.37, -30.0, None);
  let r = evaluate(&target, &site(), night(), &Constraints::default()).unwrap();

  assert_eq!(r.classification, Visibility::ObservableLater);
  assert!((r.altitude_deg - 20.0).abs() < 0.1, "{}", r.altitude_deg);
  assert!(r.moon_separation_deg > 30.0);
  assert_eq!(r.window_start, Some(night() + TimeDelta::minutes(50)));
  assert_eq!(r.window_end, Some(night() + TimeDelta::minutes(614)));
  assert_eq!(r.remaining_hours, None);
  assert_eq!(r.evaluated_at, night());
}

#[test]
fn overhead_target_is_observable_now() {
  let r = evaluate(
    &at_zenith(night()),
    &site(),
    night(),
    &Constraints::default(),
  )
  .unwrap();
  assert_eq!(r.classification, Visibility::ObservableNow);
  assert!(r.altitude_deg > 89.9);
  assert_eq!(r.window_start, Some(night()));
  assert_eq!(r.window_end, Some(night() + TimeDelta::minutes(283)));
  let hours = r.remaining_hours.unwrap();
  assert!((hours - 283.0 / 60.0).abs() < 1e-9);
}

#[test]
fn target_that_never_clears_the_limit_is_not_observable() {
  // Dec +80 culminates below the horizon from latitude -30.
  let target = Coordinates::new(10.0, 80.0, None);
  let r = evaluate(&target, &site(), night(), &Constraints::default()).unwrap();
  assert_eq!(r.classification, Visibility::NotObservable);
  assert!(r.window_start.is_none());
  assert!(r.window_end.is_none());
  assert!(r.altitude_deg < 0.0);
}

#[test]
fn target_next_to_the_moon_is_not_observable_now() {
  let at = Utc.with_ymd_and_hms(2025, 5, 20, 4, 0, 0).unwrap();
  let moon = moon_position(julian_date(at));
  let target = Coordinates::new(moon.ra_deg, moon.dec_deg, None);
  let r = evaluate(&target, &site(), at, &Constraints::default()).unwrap();
  assert!(r.moon_separation_deg < 1e-6);
  assert_ne!(r.classification, Visibility::ObservableNow);
}

#[test]
fn sun_limit_excludes_daytime() {
  let noon = Utc.with_ymd_and_hms(2025, 5, 26, 18, 0, 0).unwrap();
  let target = at_zenith(noon);

  let ignoring_sun =
    evaluate(&target, &site(), noon, &Constraints::default()).unwrap();
  assert_eq!(ignoring_sun.classification, Visibility::ObservableNow);
  assert!(ignoring_sun.sun_altitude_deg > 0.0);

  let night_only = Constraints {
    max_sun_altitude_deg: Some(-18.0),
    ..Constraints::default()
  };
  let r = evaluate(&target, &site(), noon, &night_only).unwrap();
  assert_ne!(r.classification, Visibility::ObservableNow);
}

#[test]
fn right_ascension_is_normalized() {
  let c = Constraints::default();
  let wrapped = evaluate(&Coordinates::new(370.0, -20.0, None), &site(), night(), &c)
    .unwrap();
  let plain = evaluate(&Coordinates::new(10.0, -20.0, None), &site(), night(), &c)
    .unwrap();
  assert_eq!(wrapped.classification, plain.classification);
  assert_eq!(wrapped.window_start, plain.window_start);
  assert!((wrapped.altitude_deg - plain.altitude_deg).abs() < 1e-9);
}

#[test]
fn invalid_inputs_are_errors() {
  let c = Constraints::default();
  let err = evaluate(&Coordinates::new(10.0, 95.0, None), &site(), night(), &c)
    .unwrap_err();
  assert!(matches!(err, Error::InvalidDeclination(d) if d == 95.0));

  let err = evaluate(&Coordinates::new(f64::NAN, 0.0, None), &site(), night(), &c)
    .unwrap_err();
  assert!(matches!(err, Error::NonFinite));

  let mut bad_site = site();
  bad_site.latitude_deg = -120.0;
  let err = evaluate(&Coordinates::new(10.0, 0.0, None), &bad_site, night(), &c)
    .unwrap_err();
  assert!(matches!(err, Error::InvalidObserver { .. }));

  let zero_step = Constraints { step: TimeDelta::zero(), ..c };
  let err = evaluate(&Coordinates::new(10.0, 0.0, None), &site(), night(), &zero_step)
    .unwrap_err();
  assert!(matches!(err, Error::InvalidStep));
}

#[test]
fn evaluate_all_needs_an_observer() {
  let target = Coordinates::new(10.0, 0.0, None);
  let err = evaluate_all(&target, &[], night(), &Constraints::default()).unwrap_err();
  assert!(matches!(err, Error::NoObserver));

  let second = Observer { name: "north".into(), latitude_deg: 30.0, ..site() };
  let results =
    evaluate_all(&target, &[site(), second], night(), &Constraints::default())
      .unwrap();
  assert_eq!(results.len(), 2);
  assert_eq!(results[0].observer, "7DT");
  assert_eq!(results[1].observer, "north");
}

#[test]
fn altitude_series_spans_inclusive_range() {
  let series = altitude_series(
    &Coordinates::new(301.37, -30.0, None),
    &site(),
    night(),
    TimeDelta::hours(2),
    TimeDelta::minutes(10),
  )
  .unwrap();
  assert_eq!(series.len(), 13);
  assert_eq!(series[0].time, night());
  assert_eq!(series[12].time, night() + TimeDelta::hours(2));
  // Rising throughout.
  assert!(series.windows(2).all(|w| w[1].altitude_deg > w[0].altitude_deg));
}

#[test]
fn classification_serializes_snake_case() {
  let json = serde_json::to_string(&Visibility::ObservableLater).unwrap();
  assert_eq!(json, "\"observable_later\"");
  assert_eq!(Visibility::NotObservable.to_string(), "not_observable");
}
