//! Mapping from feed topic names to the parser that handles them.

use gcn_core::Instrument;

/// Topic carrying human-written circulars.
pub const CIRCULARS_TOPIC: &str = "gcn.circulars";

/// Dedicated liveness topic; messages on it carry no event data.
pub const HEARTBEAT_TOPIC: &str = "gcn.heartbeat";

/// Every notice topic with a dedicated parser, plus the circulars topic.
pub const MONITORED_TOPICS: &[&str] = &[
  "gcn.classic.text.SWIFT_BAT_GRB_POS_ACK",
  "gcn.classic.text.SWIFT_XRT_POSITION",
  "gcn.classic.text.SWIFT_UVOT_POS",
  "gcn.classic.text.FERMI_GBM_GND_POS",
  "gcn.classic.text.FERMI_GBM_FIN_POS",
  "gcn.classic.text.FERMI_GBM_FLT_POS",
  "gcn.classic.text.FERMI_LAT_OFFLINE",
  "gcn.classic.text.AMON_NU_EM_COINC",
  "gcn.classic.text.ICECUBE_CASCADE",
  "gcn.classic.text.ICECUBE_ASTROTRACK_GOLD",
  "gcn.classic.text.ICECUBE_ASTROTRACK_BRONZE",
  "gcn.classic.text.HAWC_BURST_MONITOR",
  "gcn.classic.text.CALET_GBM_FLT_LC",
  "gcn.notices.einstein_probe.wxt.alert",
  CIRCULARS_TOPIC,
];

// Longer suffixes first where one contains another.
const NOTICE_SUFFIXES: &[(&str, Instrument)] = &[
  ("SWIFT_BAT_GRB_POS_ACK", Instrument::SwiftBat),
  ("SWIFT_XRT_POSITION", Instrument::SwiftXrt),
  ("SWIFT_UVOT_POS", Instrument::SwiftUvot),
  ("FERMI_GBM_GND_POS", Instrument::FermiGbm),
  ("FERMI_GBM_FIN_POS", Instrument::FermiGbm),
  ("FERMI_GBM_FLT_POS", Instrument::FermiGbm),
  ("FERMI_LAT_OFFLINE", Instrument::FermiLat),
  ("AMON_NU_EM_COINC", Instrument::Amon),
  ("ICECUBE_CASCADE", Instrument::IceCubeCascade),
  ("ICECUBE_ASTROTRACK_GOLD", Instrument::IceCubeGold),
  ("ICECUBE_ASTROTRACK_BRONZE", Instrument::IceCubeBronze),
  ("HAWC_BURST_MONITOR", Instrument::Hawc),
  ("CALET_GBM_FLT_LC", Instrument::Calet),
  ("einstein_probe", Instrument::EinsteinProbe),
];

/// Which parser a message on a topic goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
  Circular,
  /// A notice; `Instrument::Unknown` for unrecognised topics.
  Notice(Instrument),
}

pub fn classify_topic(topic: &str) -> MessageKind {
  if topic == CIRCULARS_TOPIC || topic.ends_with(".circulars") {
    return MessageKind::Circular;
  }
  let instrument = NOTICE_SUFFIXES
    .iter()
    .find(|(suffix, _)| topic.contains(suffix))
    .map(|(_, i)| *i)
    .unwrap_or(Instrument::Unknown);
  MessageKind::Notice(instrument)
}

/// Test and simulation streams carry fabricated events.
pub fn is_test_topic(topic: &str) -> bool { topic.contains("_TEST") }
