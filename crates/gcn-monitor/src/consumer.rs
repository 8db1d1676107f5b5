//! Stream Consumer: the long-running loop that pulls messages off a
//! [`FeedTransport`] and hands them to a [`Handler`] one at a time.
//!
//! Delivery is at-least-once. A message is committed only after the handler
//! reports it [`Disposition::Done`]; anything else drops the connection so
//! the transport redelivers it after the backoff.

use std::{
  collections::{BTreeMap, BTreeSet},
  future::Future,
  time::Duration,
};

use gcn_extract::topic::{HEARTBEAT_TOPIC, MONITORED_TOPICS, is_test_topic};
use thiserror::Error;
use tokio::{sync::broadcast, time::Instant};
use tracing::{debug, info, trace, warn};

use crate::feed::{ConnectionError, FeedMessage, FeedTransport};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
  pub topics:              Vec<String>,
  pub heartbeat_topic:     String,
  /// Silence longer than this marks the connection stalled.
  pub heartbeat_timeout:   Duration,
  /// Upper bound on a single poll.
  pub poll_timeout:        Duration,
  pub initial_backoff:     Duration,
  pub max_backoff:         Duration,
  pub include_test_topics: bool,
}

impl Default for ConsumerConfig {
  fn default() -> Self {
    Self {
      topics:              MONITORED_TOPICS.iter().map(|t| t.to_string()).collect(),
      heartbeat_topic:     HEARTBEAT_TOPIC.to_owned(),
      heartbeat_timeout:   Duration::from_secs(300),
      poll_timeout:        Duration::from_secs(1),
      initial_backoff:     Duration::from_secs(1),
      max_backoff:         Duration::from_secs(60),
      include_test_topics: false,
    }
  }
}

#[derive(Debug, Error)]
pub enum ConsumerError {
  #[error("no feed topics configured")]
  NoTopics,
}

// ─── Connection state ────────────────────────────────────────────────────────

/// Exponential reconnect delay with a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
  initial: Duration,
  max:     Duration,
  current: Duration,
}

impl Backoff {
  pub fn new(initial: Duration, max: Duration) -> Self {
    Self { initial, max, current: initial.min(max) }
  }

  /// The delay to wait now; doubles the one after it.
  pub fn next_delay(&mut self) -> Duration {
    let delay = self.current;
    self.current = (self.current * 2).min(self.max);
    delay
  }

  pub fn reset(&mut self) { self.current = self.initial.min(self.max); }

  pub fn current(&self) -> Duration { self.current }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionStatus {
  Disconnected,
  Connected,
  Backoff,
}

/// Everything the consumer knows about its connection.
#[derive(Debug, Clone)]
pub struct ConnectionState {
  pub status:        ConnectionStatus,
  pub last_activity: Option<Instant>,
  /// Consecutive sessions that ended in an error.
  pub attempts:      u32,
  pub backoff:       Backoff,
  /// Offsets committed per topic. Exact, not a high-water mark: a lower
  /// offset can still be pending after a higher one was committed.
  committed:         BTreeMap<String, BTreeSet<u64>>,
  /// Messages this session has dispatched successfully.
  session_messages:  u64,
  outage_reported:   bool,
}

impl ConnectionState {
  pub fn new(backoff: Backoff) -> Self {
    Self {
      status: ConnectionStatus::Disconnected,
      last_activity: None,
      attempts: 0,
      backoff,
      committed: BTreeMap::new(),
      session_messages: 0,
      outage_reported: false,
    }
  }

  /// Highest committed offset on `topic`.
  pub fn committed_offset(&self, topic: &str) -> Option<u64> {
    self.committed.get(topic).and_then(|set| set.last().copied())
  }

  pub fn is_committed(&self, message: &FeedMessage) -> bool {
    self
      .committed
      .get(&message.topic)
      .is_some_and(|set| set.contains(&message.offset))
  }

  pub fn record_commit(&mut self, message: &FeedMessage) {
    self
      .committed
      .entry(message.topic.clone())
      .or_default()
      .insert(message.offset);
  }

  /// Time since the last message or connect.
  pub fn idle(&self, now: Instant) -> Duration {
    self
      .last_activity
      .map(|t| now.saturating_duration_since(t))
      .unwrap_or_default()
  }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

/// What the consumer should do with a message after handling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
  /// Fully processed; commit the offset.
  Done,
  /// Not processed; leave uncommitted and reconnect.
  Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionEvent {
  Lost,
  Restored,
}

/// Receives messages from the consumer, in arrival order.
pub trait Handler: Send {
  fn handle<'a>(
    &'a mut self,
    message: &'a FeedMessage,
  ) -> impl Future<Output = Disposition> + Send + 'a;

  /// Called once when an outage starts and once when it ends.
  fn connection_changed(
    &mut self,
    event: ConnectionEvent,
  ) -> impl Future<Output = ()> + Send + '_;
}

// ─── Consumer ────────────────────────────────────────────────────────────────

pub struct Consumer<T> {
  transport: T,
  config:    ConsumerConfig,
  state:     ConnectionState,
}

impl<T: FeedTransport> Consumer<T> {
  pub fn new(transport: T, config: ConsumerConfig) -> Self {
    let backoff = Backoff::new(config.initial_backoff, config.max_backoff);
    Self { transport, config, state: ConnectionState::new(backoff) }
  }

  pub fn state(&self) -> &ConnectionState { &self.state }

  pub fn transport(&self) -> &T { &self.transport }

  /// Consume until `shutdown` fires. Connection failures are retried
  /// forever; only an empty topic list is an error.
  pub async fn run<H: Handler>(
    &mut self,
    handler: &mut H,
    mut shutdown: broadcast::Receiver<()>,
  ) -> Result<(), ConsumerError> {
    if self.config.topics.is_empty() {
      return Err(ConsumerError::NoTopics);
    }
    let mut subscription = self.config.topics.clone();
    if !subscription.contains(&self.config.heartbeat_topic) {
      subscription.push(self.config.heartbeat_topic.clone());
    }

    loop {
      if shutdown.try_recv().is_ok() {
        info!("feed consumer: shutdown signal received");
        break;
      }

      match self.session(&subscription, handler, &mut shutdown).await {
        Ok(()) => {
          info!("feed consumer: clean shutdown");
          break;
        }
        Err(e) => {
          self.transport.close().await;
          let was_connected = self.state.status == ConnectionStatus::Connected;
          self.state.status = ConnectionStatus::Backoff;
          self.state.attempts += 1;

          let redelivery = matches!(e, ConnectionError::Redeliver { .. });
          if was_connected && !redelivery && !self.state.outage_reported {
            self.state.outage_reported = true;
            handler.connection_changed(ConnectionEvent::Lost).await;
          }

          let delay = self.state.backoff.next_delay();
          warn!(
            error = %e,
            attempt = self.state.attempts,
            "feed connection error, reconnecting in {delay:?}"
          );
          tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => {
              info!("feed consumer: shutdown during reconnect");
              break;
            }
          }
        }
      }
    }

    self.transport.close().await;
    self.state.status = ConnectionStatus::Disconnected;
    Ok(())
  }

  /// One connection's lifetime. `Ok` only on shutdown.
  async fn session<H: Handler>(
    &mut self,
    topics: &[String],
    handler: &mut H,
    shutdown: &mut broadcast::Receiver<()>,
  ) -> Result<(), ConnectionError> {
    self.transport.connect(topics).await?;
    self.state.status = ConnectionStatus::Connected;
    self.state.last_activity = Some(Instant::now());
    self.state.session_messages = 0;
    info!(topics = topics.len(), "feed connected");

    if self.state.outage_reported {
      self.state.outage_reported = false;
      handler.connection_changed(ConnectionEvent::Restored).await;
    }

    loop {
      let idle = self.state.idle(Instant::now());
      if idle >= self.config.heartbeat_timeout {
        return Err(ConnectionError::Stalled { idle });
      }
      let wait = self.config.poll_timeout.min(self.config.heartbeat_timeout - idle);

      let polled = tokio::select! {
        polled = self.transport.poll(wait) => polled?,
        _ = shutdown.recv() => return Ok(()),
      };
      let Some(message) = polled else { continue };

      self.state.last_activity = Some(Instant::now());
      self.dispatch(handler, &message).await?;

      // The backoff resets on the first commit, not the first delivery.
      self.state.session_messages += 1;
      if self.state.session_messages == 1 {
        self.state.backoff.reset();
        self.state.attempts = 0;
      }
    }
  }

  async fn dispatch<H: Handler>(
    &mut self,
    handler: &mut H,
    message: &FeedMessage,
  ) -> Result<(), ConnectionError> {
    let topic = message.topic.as_str();
    let offset = message.offset;

    if topic == self.config.heartbeat_topic {
      trace!(offset, "heartbeat");
      return self.commit(message).await;
    }
    if !self.config.include_test_topics && is_test_topic(topic) {
      debug!(topic, offset, "skipping test topic");
      return self.commit(message).await;
    }
    if self.state.is_committed(message) {
      debug!(topic, offset, "already committed, skipping");
      return self.commit(message).await;
    }

    match handler.handle(message).await {
      Disposition::Done => self.commit(message).await,
      Disposition::Retry => Err(ConnectionError::Redeliver {
        topic: topic.to_owned(),
        offset,
      }),
    }
  }

  async fn commit(&mut self, message: &FeedMessage) -> Result<(), ConnectionError> {
    self.transport.commit(message).await?;
    self.state.record_commit(message);
    Ok(())
  }
}
