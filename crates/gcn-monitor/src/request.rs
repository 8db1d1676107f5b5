//! Target-of-opportunity request documents.

use chrono::{DateTime, Utc};
use gcn_core::{EventRecord, Instrument};
use gcn_sky::{Visibility, VisibilityResult};
use serde::{Deserialize, Serialize};

use crate::{
  decide::{Decision, Priority},
  format::{dec_dms, format_time, ra_hms},
};

/// Observation settings used unless an event type overrides them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
  pub requester:       String,
  pub single_exposure: u32,
  pub image_count:     u32,
  pub obsmode:         String,
  pub filters:         Vec<String>,
  pub telescopes:      u32,
  pub abort:           String,
  pub priority:        String,
  pub gain:            String,
  pub radius:          String,
  pub binning:         String,
}

impl Default for RequestDefaults {
  fn default() -> Self {
    Self {
      requester:       "gcn-monitor".to_owned(),
      single_exposure: 100,
      image_count:     3,
      obsmode:         "Deep".to_owned(),
      filters:         vec!["r".to_owned(), "i".to_owned()],
      telescopes:      1,
      abort:           "Yes".to_owned(),
      priority:        "High".to_owned(),
      gain:            "High".to_owned(),
      radius:          "0".to_owned(),
      binning:         "1".to_owned(),
    }
  }
}

/// The document posted to the request endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
  pub requester:           String,
  pub target:              String,
  pub observer:            String,
  pub ra:                  String,
  pub dec:                 String,
  pub ra_deg:              f64,
  pub dec_deg:             f64,
  pub single_exposure:     u32,
  pub image_count:         u32,
  /// Total exposure in seconds.
  pub exposure:            u32,
  pub obsmode:             String,
  pub selected_filters:    Vec<String>,
  pub selected_tel_number: u32,
  pub abort_observation:   String,
  pub priority:            String,
  pub gain:                String,
  pub radius:              String,
  pub binning:             String,
  pub obs_start_time:      String,
  pub comments:            String,
}

fn visibility_note(v: &VisibilityResult) -> String {
  match (v.classification, v.window_start, v.window_end) {
    (Visibility::ObservableNow, _, Some(end)) => {
      format!("currently observable until {}", format_time(end))
    }
    (Visibility::ObservableLater, Some(start), _) => {
      format!("observable from {}", format_time(start))
    }
    _ => "not observable".to_owned(),
  }
}

/// Build the request for `decision`, or `None` when nothing should be
/// requested or the position is unknown.
pub fn build_request(
  decision: &Decision,
  record: &EventRecord,
  visibility: &VisibilityResult,
  defaults: &RequestDefaults,
) -> Option<RequestPayload> {
  let start: DateTime<Utc> = decision.request.start_time(visibility.evaluated_at)?;
  let coords = record.coordinates.known()?;

  let mut p = RequestPayload {
    requester:           defaults.requester.clone(),
    target:              record.display_name().to_owned(),
    observer:            visibility.observer.clone(),
    ra:                  ra_hms(coords.ra_deg),
    dec:                 dec_dms(coords.dec_deg),
    ra_deg:              coords.ra_deg,
    dec_deg:             coords.dec_deg,
    single_exposure:     defaults.single_exposure,
    image_count:         defaults.image_count,
    exposure:            0,
    obsmode:             defaults.obsmode.clone(),
    selected_filters:    defaults.filters.clone(),
    selected_tel_number: defaults.telescopes,
    abort_observation:   defaults.abort.clone(),
    priority:            defaults.priority.clone(),
    gain:                defaults.gain.clone(),
    radius:              defaults.radius.clone(),
    binning:             defaults.binning.clone(),
    obs_start_time:      start.format("%Y-%m-%d %H:%M:%S").to_string(),
    comments:            String::new(),
  };

  let note = match record.instrument {
    Instrument::IceCubeCascade => {
      let error = coords.error_deg.unwrap_or(1.0);
      p.single_exposure = 60;
      p.image_count = 9;
      p.obsmode = "Mosaic".to_owned();
      p.selected_filters = vec!["r".to_owned()];
      p.radius = format!("{:.2}", error.min(2.0));
      Some(format!(
        "Cascade neutrino with a {error:.2} deg error radius; tile the error region."
      ))
    }
    Instrument::IceCubeGold => {
      p.single_exposure = 180;
      p.image_count = 5;
      Some("Gold neutrino track; deep imaging.".to_owned())
    }
    Instrument::IceCubeBronze => {
      p.single_exposure = 120;
      p.image_count = 3;
      Some("Bronze neutrino track; standard follow-up.".to_owned())
    }
    Instrument::Amon => {
      p.single_exposure = 150;
      p.image_count = 5;
      Some("Neutrino-EM coincidence; immediate follow-up.".to_owned())
    }
    _ => None,
  };
  if decision.priority == Priority::Urgent {
    p.priority = "Urgent".to_owned();
    p.abort_observation = "Yes".to_owned();
  }
  p.exposure = p.single_exposure * p.image_count;

  let mut comments = format!(
    "Event {}. Facility: {}. Trigger: {}. Visibility: {}. {}.",
    record.display_name(),
    record.instrument,
    record.trigger_num.known().map_or("unknown", String::as_str),
    visibility_note(visibility),
    decision.reason,
  );
  if let Some(note) = note {
    comments.push(' ');
    comments.push_str(&note);
  }
  comments.push_str(" Automatic ToO request from the GCN alert monitor.");
  p.comments = comments;
  Some(p)
}
