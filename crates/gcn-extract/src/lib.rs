//! Record extraction: raw notice or circular text → [`Fragment`].
//!
//! Notices are fixed-format `KEY: value` documents (or JSON for Einstein
//! Probe) with one field layout per instrument. Circulars are free text and
//! are mined with patterns for event names, trigger numbers, positions and
//! follow-up facts. Known fields that cannot be read become
//! [`Field::Unknown`](gcn_core::Field) rather than errors.

mod circular;
mod notice;
mod values;

pub mod error;
pub mod topic;

pub use error::{Error, Result};
pub use topic::{MessageKind, classify_topic, is_test_topic};

use chrono::{DateTime, Utc};
use gcn_core::{Fragment, Instrument};

/// Options that change how strictly notices are read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
  /// Reject recognised notices that lack a trigger, time or position.
  pub strict: bool,
}

/// Stateless per message; holds only compiled patterns.
pub struct Extractor {
  options:  ExtractOptions,
  notice:   notice::Patterns,
  circular: circular::Patterns,
}

impl Extractor {
  pub fn new(options: ExtractOptions) -> Result<Self> {
    Ok(Self {
      options,
      notice: notice::Patterns::new()?,
      circular: circular::Patterns::new()?,
    })
  }

  /// Extract a fragment from `raw_text` using the parser for `kind`.
  pub fn extract(
    &self,
    raw_text: &str,
    kind: MessageKind,
    received_time: DateTime<Utc>,
  ) -> Result<Fragment> {
    match kind {
      MessageKind::Circular => {
        circular::extract(&self.circular, raw_text, received_time)
      }
      MessageKind::Notice(Instrument::EinsteinProbe) => {
        notice::extract_einstein_probe(raw_text, received_time, self.options.strict)
      }
      MessageKind::Notice(instrument) => notice::extract_text(
        &self.notice,
        instrument,
        raw_text,
        received_time,
        self.options.strict,
      ),
    }
  }

  /// Route by topic name, then [`extract`](Self::extract).
  pub fn extract_message(
    &self,
    topic: &str,
    raw_text: &str,
    received_time: DateTime<Utc>,
  ) -> Result<Fragment> {
    let mut fragment =
      self.extract(raw_text, classify_topic(topic), received_time)?;
    if fragment.instrument == Instrument::Unknown
      && fragment.source_kind == gcn_core::SourceKind::Notice
    {
      fragment
        .extra_fields
        .insert("topic".into(), gcn_core::Field::Known(topic.to_owned()));
    }
    Ok(fragment)
  }
}

#[cfg(test)]
mod tests;
