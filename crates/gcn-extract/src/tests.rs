//! Extraction against representative notices and circulars.

use chrono::{DateTime, TimeZone, Utc};
use gcn_core::{EventId, Field, Instrument, Mission, SourceKind};

use crate::{Error, ExtractOptions, Extractor, MessageKind};

fn extractor() -> Extractor {
  Extractor::new(ExtractOptions::default()).expect("patterns compile")
}

fn received() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 5, 20, 13, 0, 0).unwrap()
}

fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

// ─── Notices ─────────────────────────────────────────────────────────────────

const SWIFT_XRT: &str = "TITLE:           GCN/SWIFT NOTICE
NOTICE_DATE:     Thu 20 May 25 10:30:15 UT
NOTICE_TYPE:     Swift-XRT Position
TRIGGER_NUM:     1234567
GRB_RA:          150.1234d {+10h 00m 30s} (J2000)
GRB_DEC:         -25.5678d {-25d 34' 04\"} (J2000)
GRB_ERROR:       3.5 [arcsec radius]
IMG_START_DATE:  25/05/20
IMG_START_TIME:  37815.25 SOD {10:30:15.25} UT
COMMENTS:        Swift-XRT Coordinates - Initial position.
";

const FERMI_GBM: &str = "TITLE:           GCN/FERMI NOTICE
NOTICE_DATE:     Thu 20 May 25 11:01:00 UT
NOTICE_TYPE:     Fermi-GBM Final Position
TRIGGER_NUM:     769999999
GRB_RA:          180.1000d {+12h 00m 24s} (J2000)
GRB_DEC:         -30.1000d {-30d 06' 00\"} (J2000)
GRB_ERROR:       2.5 [deg radius]
GRB_DATE:        20815 TJD;   140 DOY;   25/05/20
GRB_TIME:        39600.00 SOD {11:00:00.00} UT
LC_URL:          http://heasarc.gsfc.nasa.gov/FTP/fermi/data/gbm/triggers/2025/test.gif
";

const ICECUBE_GOLD: &str = "TITLE:           GCN/AMON NOTICE
NOTICE_DATE:     Thu 20 May 25 12:00:00 UT
NOTICE_TYPE:     ICECUBE_Astrotrack_GOLD
        EVENT_NUM:       12345678
RUN_NUM:         139876
DISCOVERY_DATE:  25/05/20
DISCOVERY_TIME:  43200.00 {12:00:00.00} UT
SRC_RA:          150.0000d {+10h 00m 00s} (J2000)
SRC_DEC:         +10.0000d {+10d 00' 00\"} (J2000)
SRC_ERROR:       0.5 [deg radius]
ENERGY:          2.14e+02 [TeV]
SIGNALNESS:      6.23e-01 [dn]
FAR:             3.54 [yr^-1]
";

const ICECUBE_CASCADE: &str = "TITLE:           GCN/AMON NOTICE
NOTICE_DATE:     Tue 20 May 25 12:00:00 UT
NOTICE_TYPE:     ICECUBE_Cascade
EVENT_NUM:       77
EVENT_NAME:      IceCubeCascade-250520A
DISCOVERY_DATE:  25/05/20
DISCOVERY_TIME:  43200.00 {12:00:00.00} UT
SRC_RA:          45.0000d {+03h 00m 00s} (J2000)
SRC_DEC:         -20.0000d {-20d 00' 00\"} (J2000)
SRC_ERROR:       6.1 [deg radius, stat+sys, 50% containment]
ENERGY:          145.2 [TeV]
";

const CALET: &str = "TITLE:           GCN/CALET NOTICE
NOTICE_DATE:     Tue 20 May 25 09:00:00 UT
TRIGGER_NUM:     1400000000
TRIGGER_DATE:    20815 TJD;   140 DOY;   25/05/20
TRIGGER_TIME:    30000.00 SOD {08:20:00.00} UT
POINT_RA:        200.5000d {+13h 22m 00s} (J2000)
POINT_DEC:       +15.2500d {+15d 15' 00\"} (J2000)
";

#[test]
fn swift_xrt_notice() {
  let f = extractor()
    .extract_message("gcn.classic.text.SWIFT_XRT_POSITION", SWIFT_XRT, received())
    .unwrap();

  assert_eq!(f.source_kind, SourceKind::Notice);
  assert_eq!(f.instrument, Instrument::SwiftXrt);
  assert_eq!(f.event_id, EventId::trigger(Mission::Swift, "1234567"));
  assert_eq!(f.trigger_num, Field::Known("1234567".into()));

  let c = f.coordinates.known().copied().unwrap();
  assert!(close(c.ra_deg, 150.1234));
  assert!(close(c.dec_deg, -25.5678));
  assert!(close(c.error_deg.unwrap(), 3.5 / 3600.0));

  let t = f.event_time.known().copied().unwrap();
  assert_eq!(t.to_rfc3339(), "2025-05-20T10:30:15.250+00:00");
  assert_eq!(
    f.extra_fields["notice_date"],
    Field::Known("2025-05-20T10:30:15+00:00".into())
  );
  assert_eq!(f.raw_text, SWIFT_XRT);
}

#[test]
fn fermi_gbm_notice_with_degrees_and_url() {
  let f = extractor()
    .extract_message("gcn.classic.text.FERMI_GBM_FIN_POS", FERMI_GBM, received())
    .unwrap();
  assert_eq!(f.instrument, Instrument::FermiGbm);
  assert_eq!(f.event_id.as_str(), "FERMI-769999999");
  assert_eq!(f.coordinates.known().unwrap().error_deg, Some(2.5));
  assert_eq!(
    f.event_time.known().unwrap().to_rfc3339(),
    "2025-05-20T11:00:00+00:00"
  );
  assert!(
    f.extra_fields["lc_url"]
      .known()
      .is_some_and(|u| u.ends_with("test.gif"))
  );
}

#[test]
fn icecube_gold_notice_extras() {
  let f = extractor()
    .extract_message(
      "gcn.classic.text.ICECUBE_ASTROTRACK_GOLD",
      ICECUBE_GOLD,
      received(),
    )
    .unwrap();
  assert_eq!(f.instrument, Instrument::IceCubeGold);
  assert_eq!(f.event_id.as_str(), "ICECUBE-12345678");
  assert_eq!(f.extra_fields["energy"], Field::Known("2.14e+02".into()));
  assert_eq!(f.extra_fields["signalness"], Field::Known("6.23e-01".into()));
  assert_eq!(f.extra_fields["far"], Field::Known("3.54".into()));
  assert_eq!(f.extra_fields["run_num"], Field::Known("139876".into()));
  let c = f.coordinates.known().copied().unwrap();
  assert!(close(c.dec_deg, 10.0));
  assert_eq!(c.error_deg, Some(0.5));
}

#[test]
fn cascade_notice_carries_its_name() {
  let f = extractor()
    .extract_message("gcn.classic.text.ICECUBE_CASCADE", ICECUBE_CASCADE, received())
    .unwrap();
  assert_eq!(f.name, Field::Known("IceCubeCascade-250520A".into()));
  assert!(f.aliases.contains(&EventId::new("IceCubeCascade-250520A")));
  assert_eq!(f.extra_fields["energy"], Field::Known("145.2".into()));
  assert_eq!(f.coordinates.known().unwrap().error_deg, Some(6.1));
  // Keys the cascade layout lists but the notice omits are explicit unknowns.
  assert_eq!(f.extra_fields["signalness"], Field::Unknown);
}

#[test]
fn calet_notice_has_no_error_radius() {
  let f = extractor()
    .extract_message("gcn.classic.text.CALET_GBM_FLT_LC", CALET, received())
    .unwrap();
  let c = f.coordinates.known().copied().unwrap();
  assert!(close(c.ra_deg, 200.5));
  assert_eq!(c.error_deg, None);
  assert_eq!(
    f.event_time.known().unwrap().to_rfc3339(),
    "2025-05-20T08:20:00+00:00"
  );
}

#[test]
fn einstein_probe_json_alert() {
  let raw = r#"{"instrument":"WXT","trigger_time":"2025-01-13T01:20:44.949Z",
    "id":["01709130131"],"ra":94.224,"dec":56.893,"ra_dec_error":0.05094559}"#;
  let f = extractor()
    .extract_message("gcn.notices.einstein_probe.wxt.alert", raw, received())
    .unwrap();
  assert_eq!(f.instrument, Instrument::EinsteinProbe);
  assert_eq!(f.event_id.as_str(), "EINSTEINPROBE-1709130131");
  assert_eq!(f.trigger_num, Field::Known("01709130131".into()));
  let c = f.coordinates.known().copied().unwrap();
  assert!(close(c.ra_deg, 94.224));
  assert_eq!(c.error_deg, Some(0.05094559));
  assert_eq!(
    f.event_time.known().unwrap().to_rfc3339(),
    "2025-01-13T01:20:44.949+00:00"
  );
  assert_eq!(f.extra_fields["ep_instrument"], Field::Known("WXT".into()));
}

#[test]
fn einstein_probe_rejects_non_json() {
  let err = extractor()
    .extract_message("gcn.notices.einstein_probe.wxt.alert", "not json", received())
    .unwrap_err();
  assert!(matches!(err, Error::Json(_)));
}

#[test]
fn unrecognised_instrument_still_yields_a_fragment() {
  let raw = "TITLE: GCN/INTEGRAL NOTICE\nTRIGGER_NUM: 9001\nGRB_RA: 10.0d (J2000)\n";
  let f = extractor()
    .extract_message("gcn.classic.text.INTEGRAL_SPIACS", raw, received())
    .unwrap();
  assert_eq!(f.instrument, Instrument::Unknown);
  assert_eq!(f.event_id.as_str(), "UNKNOWN-9001");
  assert_eq!(f.raw_text, raw);
  assert_eq!(f.coordinates, Field::Unknown);
  assert_eq!(
    f.extra_fields["topic"],
    Field::Known("gcn.classic.text.INTEGRAL_SPIACS".into())
  );
}

#[test]
fn unrecognised_notice_without_trigger_uses_digest() {
  let f = extractor()
    .extract_message("gcn.classic.text.MYSTERY", "free text only", received())
    .unwrap();
  assert!(f.event_id.as_str().starts_with("UNKNOWN-"));
  let again = extractor()
    .extract_message("gcn.classic.text.MYSTERY", "free text only", received())
    .unwrap();
  assert_eq!(f.event_id, again.event_id);
}

#[test]
fn strict_mode_rejects_incomplete_known_notices() {
  let strict = Extractor::new(ExtractOptions { strict: true }).unwrap();
  let raw = "TITLE: GCN/SWIFT NOTICE\nTRIGGER_NUM: 1\n";
  let err = strict
    .extract(raw, MessageKind::Notice(Instrument::SwiftBat), received())
    .unwrap_err();
  match err {
    Error::MissingFields { instrument, fields } => {
      assert_eq!(instrument, Instrument::SwiftBat);
      assert_eq!(fields, vec!["event_time", "coordinates"]);
    }
    other => panic!("unexpected error: {other}"),
  }
  // The same notice is accepted leniently with unknown markers.
  let f = extractor()
    .extract(raw, MessageKind::Notice(Instrument::SwiftBat), received())
    .unwrap();
  assert_eq!(f.coordinates, Field::Unknown);
  assert_eq!(f.event_time, Field::Unknown);
}

// ─── Circulars ───────────────────────────────────────────────────────────────

fn circular(subject: &str, body: &str, id: u64) -> String {
  serde_json::json!({
    "subject": subject,
    "body": body,
    "circularId": id,
    "createdOn": 1742679229556_i64,
    "submitter": "someone",
  })
  .to_string()
}

#[test]
fn circular_with_enhanced_xrt_position() {
  let raw = circular(
    "GRB 250322A: Enhanced Swift-XRT position",
    "M.R. Goad, J.P. Osborne, A.P. Beardmore and P.A. Evans (U. Leicester)
report on behalf of the Swift-XRT team.
Using 1707 s of XRT Photon Counting mode data and 1 UVOT
images for GRB 250322A, we find an astrometrically corrected X-ray
position (using the XRT-UVOT alignment and matching UVOT field sources
to the USNO-B1 catalogue): RA, Dec = 106.76048, +7.19313 which is equivalent
to:
RA (J2000): 07h 07m 2.52s
Dec (J2000): +07d 11' 35.3\"
with an uncertainty of 2.6 arcsec (radius, 90% confidence).",
    39841,
  );
  let f = extractor()
    .extract_message("gcn.circulars", &raw, received())
    .unwrap();

  assert_eq!(f.source_kind, SourceKind::Circular);
  assert_eq!(f.event_id.as_str(), "GRB250322A");
  assert_eq!(f.name, Field::Known("GRB 250322A".into()));
  assert_eq!(f.instrument, Instrument::SwiftXrt);
  let c = f.coordinates.known().copied().unwrap();
  assert!(close(c.ra_deg, 106.76048));
  assert!(close(c.dec_deg, 7.19313));
  assert!(close(c.error_deg.unwrap(), 2.6 / 3600.0));
  assert_eq!(f.extra_fields["circular_id"], Field::Known("39841".into()));
  assert_eq!(f.retracted, Field::Unknown);
}

#[test]
fn circular_with_sexagesimal_position_only() {
  let raw = circular(
    "GRB 250101B: Swift-XRT afterglow",
    "RA (J2000): 07h 07m 2.52s\nDec (J2000): -07d 11' 35.3\"\nwith an uncertainty of 3.0 arcsec",
    40000,
  );
  let f = extractor()
    .extract_message("gcn.circulars", &raw, received())
    .unwrap();
  let c = f.coordinates.known().copied().unwrap();
  assert!((c.ra_deg - 106.7605).abs() < 1e-3);
  assert!((c.dec_deg + 7.19314).abs() < 1e-4);
  assert!(close(c.error_deg.unwrap(), 3.0 / 3600.0));
}

#[test]
fn circular_with_redshift_and_host() {
  let raw = circular(
    "GRB 250322A: VLT/X-shooter redshift confirmation of the putative host galaxy ",
    "We detect a bright continuum in the VIS and NIR arms and identify multiple emission lines, including H_alpha, H_beta, NII, OII, SII, at a common redshift of 0.4215±0.0005, consistent with measurement by Fong et al. (GCN 39852). We estimated that the chance coincidence between the bright galaxy and the XRT localization is <2% (Bloom et al. 2002), supporting it as a likely host galaxy of the GRB.",
    39859,
  );
  let f = extractor()
    .extract_message("gcn.circulars", &raw, received())
    .unwrap();
  assert_eq!(f.event_id.as_str(), "GRB250322A");
  assert_eq!(f.extra_fields["redshift"], Field::Known("0.4215".into()));
  assert_eq!(f.extra_fields["redshift_error"], Field::Known("0.0005".into()));
  assert!(
    f.extra_fields["host_info"]
      .known()
      .is_some_and(|h| h.contains("likely host galaxy"))
  );
  assert_eq!(f.coordinates, Field::Unknown);
}

#[test]
fn fermi_false_trigger_links_by_trigger_number() {
  let raw = circular(
    "Fermi Gamma-ray Burst Monitor trigger 763509110/250312911 is not a GRB",
    "L. Scotton (UAH) reports on behalf of the Fermi Gamma-ray Burst Monitor Team:
\"The Fermi Gamma-ray Burst Monitor (GBM) trigger 763509110/250312911 at 21:51:45.47 UT
on 12 March 2025, tentatively classified as a GRB, is in fact not due
to a GRB. This trigger is likely due to SAA entry.\"",
    39696,
  );
  let f = extractor()
    .extract_message("gcn.circulars", &raw, received())
    .unwrap();
  assert_eq!(f.instrument, Instrument::FermiGbm);
  assert_eq!(f.event_id, EventId::trigger(Mission::Fermi, "763509110"));
  assert_eq!(f.name, Field::Unknown);
  assert_eq!(f.retracted, Field::Known(true));
}

#[test]
fn lat_circular_names_event_and_aliases_gbm_trigger() {
  let raw = circular(
    "GRB 250320B: Fermi-LAT detection",
    "On March 20, 2025, Fermi-LAT detected high-energy emission from GRB 250320B, which was also detected by Fermi-GBM (trigger 764205327 / 250320969, GCN 39792).
The best LAT on-ground location is found to be:
RA, Dec = 244.66, -30.37 (J2000)
with an error radius of 0.3 deg (90 % containment, statistical error only).",
    39819,
  );
  let f = extractor()
    .extract_message("gcn.circulars", &raw, received())
    .unwrap();
  assert_eq!(f.instrument, Instrument::FermiLat);
  assert_eq!(f.event_id.as_str(), "GRB250320B");
  assert_eq!(f.trigger_num, Field::Known("764205327".into()));
  assert!(f.aliases.contains(&EventId::new("FERMI-764205327")));
  let c = f.coordinates.known().copied().unwrap();
  assert!(close(c.ra_deg, 244.66));
  assert!(close(c.dec_deg, -30.37));
  assert_eq!(c.error_deg, Some(0.3));
}

#[test]
fn einstein_probe_circular_name() {
  let raw = circular(
    "EP250321a: EP detection of a fast X-ray transient",
    "The Einstein Probe team reports the detection of EP250321a.",
    39900,
  );
  let f = extractor()
    .extract_message("gcn.circulars", &raw, received())
    .unwrap();
  assert_eq!(f.name, Field::Known("EP250321a".into()));
  assert_eq!(f.instrument, Instrument::EinsteinProbe);
}

#[test]
fn circular_without_reference_is_an_error() {
  let raw = circular(
    "Call for observing proposals",
    "The observatory announces its next proposal cycle.",
    1,
  );
  let err = extractor()
    .extract_message("gcn.circulars", &raw, received())
    .unwrap_err();
  assert!(matches!(err, Error::NoEventReference));
}

#[test]
fn plain_text_circular_is_read_as_body() {
  let f = extractor()
    .extract_message(
      "gcn.circulars",
      "GRB 250101A: optical afterglow candidate",
      received(),
    )
    .unwrap();
  assert_eq!(f.event_id.as_str(), "GRB250101A");
}
