//! Inbound feed transports.
//!
//! A [`FeedTransport`] delivers opaque text payloads tagged with a topic and
//! a per-topic offset. Offsets only advance when the consumer commits, so a
//! message that was delivered but not committed comes back after a
//! reconnect.

mod memory;
mod spool;

pub use memory::MemoryFeed;
pub use spool::SpoolFeed;

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// One message as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
  pub topic:         String,
  pub offset:        u64,
  pub payload:       String,
  pub received_time: DateTime<Utc>,
}

/// Transient feed failure. Never fatal; the consumer backs off and
/// reconnects.
#[derive(Debug, Error)]
pub enum ConnectionError {
  #[error("feed unreachable: {0}")]
  Unreachable(String),

  #[error("feed connection closed")]
  Closed,

  #[error("no feed activity for {idle:?}")]
  Stalled { idle: Duration },

  /// The handler could not finish a message; it stays uncommitted.
  #[error("message {topic}@{offset} was not processed; reconnecting for redelivery")]
  Redeliver { topic: String, offset: u64 },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// A topic-based subscription with explicit commits.
pub trait FeedTransport: Send {
  /// Open a subscription to `topics`. Uncommitted messages are delivered
  /// again from the start.
  fn connect<'a>(
    &'a mut self,
    topics: &'a [String],
  ) -> impl Future<Output = Result<(), ConnectionError>> + Send + 'a;

  /// Wait up to `timeout` for the next message.
  fn poll(
    &mut self,
    timeout: Duration,
  ) -> impl Future<Output = Result<Option<FeedMessage>, ConnectionError>> + Send + '_;

  /// Mark `message` as consumed so it is never delivered again.
  fn commit<'a>(
    &'a mut self,
    message: &'a FeedMessage,
  ) -> impl Future<Output = Result<(), ConnectionError>> + Send + 'a;

  /// Drop the subscription. Safe to call when not connected.
  fn close(&mut self) -> impl Future<Output = ()> + Send + '_;
}
