//! One message, start to finish: extract, merge, evaluate, decide, deliver.
//!
//! The pipeline is the consumer's [`Handler`]. A message counts as handled
//! once its fragment (or its unlinked raw form) is durably stored; sink
//! failures are logged and never cause redelivery.

use chrono::{DateTime, Utc};
use gcn_core::{
  EventId, EventRecord, FieldKey, SourceKind, StoreError,
  merge::ChangeKind,
  store::{EventStore, TableStorage, UnlinkedMessage},
};
use gcn_extract::{Extractor, MessageKind, classify_topic};
use gcn_sky::{Constraints, Observer, VisibilityResult, evaluate_all};
use tracing::{debug, error, info, warn};

use crate::{
  consumer::{ConnectionEvent, Disposition, Handler},
  decide::{Decision, PriorityPolicy, decide},
  feed::FeedMessage,
  format::summary,
  request::{RequestDefaults, build_request},
  sink::Sink,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub observers:     Vec<Observer>,
  pub constraints:   Constraints,
  pub policy:        PriorityPolicy,
  pub request:       RequestDefaults,
  pub send_requests: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      observers:     vec![Observer::seven_dt()],
      constraints:   Constraints::default(),
      policy:        PriorityPolicy::default(),
      request:       RequestDefaults::default(),
      send_requests: false,
    }
  }
}

/// What processing one message did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  /// Extraction failed; the raw message was stored unlinked.
  Unlinked { reason: String },
  Duplicate { event_id: EventId },
  Merged {
    event_id:  EventId,
    change:    ChangeKind,
    /// One decision per observer, in configuration order.
    decisions: Vec<(String, Decision)>,
    /// Requests handed to the sink.
    requests:  usize,
  },
}

pub struct Pipeline<S, K> {
  extractor: Extractor,
  store:     EventStore<S>,
  config:    PipelineConfig,
  sink:      K,
}

impl<S: TableStorage, K: Sink> Pipeline<S, K> {
  pub fn new(
    extractor: Extractor,
    store: EventStore<S>,
    config: PipelineConfig,
    sink: K,
  ) -> Self {
    Self { extractor, store, config, sink }
  }

  pub fn store(&self) -> &EventStore<S> { &self.store }

  pub fn sink(&self) -> &K { &self.sink }

  /// Process one raw payload received on `topic`.
  ///
  /// Only a failed durable write is an error; the caller should offer the
  /// same message again.
  pub async fn process(
    &mut self,
    topic: &str,
    raw: &str,
    received_time: DateTime<Utc>,
  ) -> Result<Outcome, StoreError<S::Error>> {
    let fragment = match self.extractor.extract_message(topic, raw, received_time) {
      Ok(f) => f,
      Err(e) => {
        let reason = e.to_string();
        return self.preserve(topic, raw, received_time, reason).await;
      }
    };
    let source = fragment.source_kind;

    let merged = match self.store.merge(fragment).await {
      Ok(m) => m,
      Err(e) => {
        error!(topic, %source, error = %e, "merge was not persisted");
        debug!(topic, raw, "payload of unpersisted merge");
        return Err(e);
      }
    };
    let record = &merged.record;
    let event_id = record.event_id.clone();

    if merged.change == ChangeKind::DuplicateIgnored {
      debug!(%event_id, %source, "duplicate message");
      return Ok(Outcome::Duplicate { event_id });
    }
    info!(
      %event_id,
      %source,
      change = %merged.change,
      name = record.display_name(),
      "event merged"
    );

    let visibility = self.visibility(record, received_time);
    let decisions: Vec<(String, Decision)> = visibility
      .iter()
      .map(|v| (v.observer.clone(), decide(record, v, &self.config.policy)))
      .collect();
    for (observer, d) in &decisions {
      info!(
        %event_id,
        observer = %observer,
        priority = %d.priority,
        decision = ?d.request,
        reason = %d.reason,
        "request decision"
      );
    }

    let text = summary(record, merged.change, &merged.changed_fields, &visibility);
    if let Err(e) = self.sink.notify(&text).await {
      warn!(%event_id, error = %e, "notification failed");
    }

    // Requests follow new events and new positions only.
    let position_changed = merged.change == ChangeKind::Created
      || merged.changed_fields.contains(&FieldKey::Coordinates);
    let mut requests = 0;
    if position_changed {
      for (v, (_, decision)) in visibility.iter().zip(&decisions) {
        let Some(payload) = build_request(decision, record, v, &self.config.request) else {
          continue;
        };
        match self.sink.request(&payload, self.config.send_requests).await {
          Ok(()) => requests += 1,
          Err(e) => warn!(%event_id, observer = %v.observer, error = %e, "request delivery failed"),
        }
      }
    }

    Ok(Outcome::Merged {
      event_id,
      change: merged.change,
      decisions,
      requests,
    })
  }

  /// Visibility from every observer; empty when the position is unknown or
  /// cannot be evaluated.
  fn visibility(&self, record: &EventRecord, at: DateTime<Utc>) -> Vec<VisibilityResult> {
    let Some(coordinates) = record.coordinates.known() else {
      return Vec::new();
    };
    match evaluate_all(coordinates, &self.config.observers, at, &self.config.constraints) {
      Ok(results) => results,
      Err(e) => {
        warn!(event_id = %record.event_id, error = %e, "visibility not computed");
        Vec::new()
      }
    }
  }

  async fn preserve(
    &mut self,
    topic: &str,
    raw: &str,
    received_time: DateTime<Utc>,
    reason: String,
  ) -> Result<Outcome, StoreError<S::Error>> {
    let source_kind = match classify_topic(topic) {
      MessageKind::Circular => SourceKind::Circular,
      MessageKind::Notice(_) => SourceKind::Notice,
    };
    warn!(topic, source = %source_kind, %reason, "message not linked to an event");
    debug!(topic, raw, "unlinked payload");

    self
      .store
      .preserve_unlinked(UnlinkedMessage {
        topic: topic.to_owned(),
        source_kind,
        reason: reason.clone(),
        received_time,
        raw_text: raw.to_owned(),
      })
      .await?;
    Ok(Outcome::Unlinked { reason })
  }
}

impl<S: TableStorage, K: Sink> Handler for Pipeline<S, K> {
  async fn handle<'a>(&'a mut self, message: &'a FeedMessage) -> Disposition {
    match self
      .process(&message.topic, &message.payload, message.received_time)
      .await
    {
      Ok(_) => Disposition::Done,
      Err(e) => {
        error!(
          topic = %message.topic,
          offset = message.offset,
          error = %e,
          "message left uncommitted for redelivery"
        );
        Disposition::Retry
      }
    }
  }

  async fn connection_changed(&mut self, event: ConnectionEvent) {
    let text = match event {
      ConnectionEvent::Lost => "GCN feed connection lost; reconnecting.",
      ConnectionEvent::Restored => "GCN feed connection restored.",
    };
    if let Err(e) = self.sink.notify(text).await {
      warn!(%event, error = %e, "connection notification failed");
    }
  }
}
