//! Runtime configuration, deserialised from `config.toml` and `GCN__*`
//! environment variables.

use std::{path::PathBuf, time::Duration};

use chrono::TimeDelta;
use gcn_core::{SourceKind, merge::MergePolicy};
use gcn_extract::{
  ExtractOptions,
  topic::{HEARTBEAT_TOPIC, MONITORED_TOPICS},
};
use gcn_sky::{Constraints, Observer};
use serde::Deserialize;
use thiserror::Error;

use crate::{
  consumer::ConsumerConfig,
  decide::{Priority, PriorityPolicy},
  request::RequestDefaults,
};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("at least one observer is required")]
  NoObservers,

  #[error("at least one feed topic is required")]
  NoTopics,

  #[error("visibility.step_secs must be between 1 and 86400, got {0}")]
  InvalidStep(i64),

  #[error("visibility.horizon_hours must be between 1 and 8760, got {0}")]
  InvalidHorizon(i64),

  #[error("decision.staleness_hours must be between 0 and 8760, got {0}")]
  InvalidStaleness(i64),
}

/// Longest sampling step: one day.
const MAX_STEP_SECS: i64 = 86_400;
/// Longest search horizon or staleness window: one year.
const MAX_HOURS: i64 = 8_760;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
  pub feed:       FeedConfig,
  pub store:      StoreConfig,
  pub extract:    ExtractConfig,
  pub observers:  Vec<Observer>,
  pub visibility: VisibilityConfig,
  pub decision:   DecisionConfig,
  pub request:    RequestDefaults,
  pub sinks:      SinksConfig,
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      feed:       FeedConfig::default(),
      store:      StoreConfig::default(),
      extract:    ExtractConfig::default(),
      observers:  vec![Observer::seven_dt()],
      visibility: VisibilityConfig::default(),
      decision:   DecisionConfig::default(),
      request:    RequestDefaults::default(),
      sinks:      SinksConfig::default(),
    }
  }
}

impl MonitorConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.observers.is_empty() {
      return Err(ConfigError::NoObservers);
    }
    if self.feed.topics.is_empty() {
      return Err(ConfigError::NoTopics);
    }
    let step = self.visibility.step_secs;
    if !(1..=MAX_STEP_SECS).contains(&step) {
      return Err(ConfigError::InvalidStep(step));
    }
    let horizon = self.visibility.horizon_hours;
    if !(1..=MAX_HOURS).contains(&horizon) {
      return Err(ConfigError::InvalidHorizon(horizon));
    }
    let staleness = self.decision.staleness_hours;
    if !(0..=MAX_HOURS).contains(&staleness) {
      return Err(ConfigError::InvalidStaleness(staleness));
    }
    Ok(())
  }
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
  /// Root of the spool directory tree written by the feed client.
  pub spool_dir:              PathBuf,
  pub topics:                 Vec<String>,
  pub heartbeat_topic:        String,
  pub heartbeat_timeout_secs: u64,
  pub poll_timeout_ms:        u64,
  pub scan_interval_ms:       u64,
  pub initial_backoff_secs:   u64,
  pub max_backoff_secs:       u64,
  pub include_test_topics:    bool,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      spool_dir:              PathBuf::from("~/.gcn-monitor/spool"),
      topics:                 MONITORED_TOPICS.iter().map(|t| t.to_string()).collect(),
      heartbeat_topic:        HEARTBEAT_TOPIC.to_owned(),
      heartbeat_timeout_secs: 300,
      poll_timeout_ms:        1000,
      scan_interval_ms:       500,
      initial_backoff_secs:   1,
      max_backoff_secs:       60,
      include_test_topics:    false,
    }
  }
}

impl FeedConfig {
  pub fn consumer_config(&self) -> ConsumerConfig {
    ConsumerConfig {
      topics:              self.topics.clone(),
      heartbeat_topic:     self.heartbeat_topic.clone(),
      heartbeat_timeout:   Duration::from_secs(self.heartbeat_timeout_secs),
      poll_timeout:        Duration::from_millis(self.poll_timeout_ms),
      initial_backoff:     Duration::from_secs(self.initial_backoff_secs),
      max_backoff:         Duration::from_secs(self.max_backoff_secs),
      include_test_topics: self.include_test_topics,
    }
  }

  pub fn scan_interval(&self) -> Duration { Duration::from_millis(self.scan_interval_ms) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  Csv,
  Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub backend:              StoreBackend,
  /// Directory for CSV tables, or the database file for SQLite.
  pub path:                 PathBuf,
  pub authoritative_source: SourceKind,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      backend:              StoreBackend::Csv,
      path:                 PathBuf::from("~/.gcn-monitor/tables"),
      authoritative_source: SourceKind::Notice,
    }
  }
}

impl StoreConfig {
  pub fn merge_policy(&self) -> MergePolicy {
    MergePolicy { authoritative_source: self.authoritative_source }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
  pub strict: bool,
}

impl ExtractConfig {
  pub fn options(&self) -> ExtractOptions { ExtractOptions { strict: self.strict } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
  pub min_altitude_deg:     f64,
  pub min_moon_sep_deg:     f64,
  pub max_sun_altitude_deg: Option<f64>,
  pub horizon_hours:        i64,
  pub step_secs:            i64,
}

impl Default for VisibilityConfig {
  fn default() -> Self {
    Self {
      min_altitude_deg:     30.0,
      min_moon_sep_deg:     30.0,
      max_sun_altitude_deg: Some(-18.0),
      horizon_hours:        48,
      step_secs:            60,
    }
  }
}

impl VisibilityConfig {
  pub fn constraints(&self) -> Constraints {
    Constraints {
      min_altitude_deg:     self.min_altitude_deg,
      min_moon_sep_deg:     self.min_moon_sep_deg,
      max_sun_altitude_deg: self.max_sun_altitude_deg,
      horizon:              TimeDelta::hours(self.horizon_hours),
      step:                 TimeDelta::seconds(self.step_secs),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
  pub threshold:       Priority,
  pub staleness_hours: i64,
}

impl Default for DecisionConfig {
  fn default() -> Self {
    Self { threshold: Priority::Normal, staleness_hours: 12 }
  }
}

impl DecisionConfig {
  pub fn policy(&self) -> PriorityPolicy {
    PriorityPolicy {
      threshold:         self.threshold,
      staleness_horizon: TimeDelta::hours(self.staleness_hours),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
  /// Chat webhook receiving notification text.
  pub notify_url:    Option<String>,
  /// Endpoint receiving request documents.
  pub request_url:   Option<String>,
  /// Deliver requests, not just prepare them.
  pub send_requests: bool,
  pub timeout_secs:  u64,
}

impl Default for SinksConfig {
  fn default() -> Self {
    Self {
      notify_url:    None,
      request_url:   None,
      send_requests: false,
      timeout_secs:  30,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid_and_observe_from_7dt() {
    let cfg = MonitorConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.observers, vec![Observer::seven_dt()]);
    assert_eq!(cfg.visibility.constraints().step, TimeDelta::seconds(60));
    assert_eq!(cfg.decision.policy(), PriorityPolicy::default());
    assert!(cfg.feed.topics.iter().any(|t| t == "gcn.circulars"));
  }

  #[test]
  fn partial_sections_keep_their_defaults() {
    let cfg: MonitorConfig = serde_json::from_value(serde_json::json!({
      "store": { "backend": "sqlite", "path": "/tmp/events.db" },
      "decision": { "threshold": "high" },
      "observers": [{ "name": "north", "latitude_deg": 31.9, "longitude_deg": -111.6 }],
    }))
    .unwrap();
    assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
    assert_eq!(cfg.store.authoritative_source, SourceKind::Notice);
    assert_eq!(cfg.decision.threshold, Priority::High);
    assert_eq!(cfg.decision.staleness_hours, 12);
    assert_eq!(cfg.observers[0].elevation_m, 0.0);
    assert_eq!(cfg.feed.heartbeat_timeout_secs, 300);
  }

  #[test]
  fn empty_observer_list_is_rejected() {
    let cfg = MonitorConfig { observers: Vec::new(), ..MonitorConfig::default() };
    assert!(matches!(cfg.validate(), Err(ConfigError::NoObservers)));
  }

  #[test]
  fn visibility_ranges_are_checked() {
    let negative_step = MonitorConfig {
      visibility: VisibilityConfig { step_secs: -60, ..VisibilityConfig::default() },
      ..MonitorConfig::default()
    };
    assert!(matches!(negative_step.validate(), Err(ConfigError::InvalidStep(-60))));

    let zero_step = MonitorConfig {
      visibility: VisibilityConfig { step_secs: 0, ..VisibilityConfig::default() },
      ..MonitorConfig::default()
    };
    assert!(matches!(zero_step.validate(), Err(ConfigError::InvalidStep(0))));

    let endless = MonitorConfig {
      visibility: VisibilityConfig { horizon_hours: i64::MAX, ..VisibilityConfig::default() },
      ..MonitorConfig::default()
    };
    assert!(matches!(endless.validate(), Err(ConfigError::InvalidHorizon(i64::MAX))));
  }

  #[test]
  fn negative_staleness_is_rejected() {
    let cfg = MonitorConfig {
      decision: DecisionConfig { staleness_hours: -1, ..DecisionConfig::default() },
      ..MonitorConfig::default()
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidStaleness(-1))));

    let fresh_only = MonitorConfig {
      decision: DecisionConfig { staleness_hours: 0, ..DecisionConfig::default() },
      ..MonitorConfig::default()
    };
    assert!(fresh_only.validate().is_ok());
  }
}
