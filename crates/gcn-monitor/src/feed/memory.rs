//! [`MemoryFeed`]: a scripted in-process feed.

use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use chrono::{DateTime, Utc};

use super::{ConnectionError, FeedMessage, FeedTransport};

#[derive(Debug, Default)]
struct State {
  /// Published and not yet committed, in publish order.
  pending:       Vec<FeedMessage>,
  cursor:        usize,
  topics:        Vec<String>,
  connected:     bool,
  severed:       bool,
  connects:      u32,
  failing:       u32,
  next_offset:   BTreeMap<String, u64>,
  committed:     Vec<(String, u64)>,
}

/// Feed whose messages are published by the caller.
///
/// Behaves like a broker with at-least-once delivery: every connect restarts
/// delivery at the oldest uncommitted message. Clones share state, so a test
/// can script and inspect the feed while the consumer owns a handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
  inner: Arc<Mutex<State>>,
}

impl MemoryFeed {
  pub fn new() -> Self { Self::default() }

  fn state(&self) -> MutexGuard<'_, State> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Append a message to `topic` and return its offset.
  pub fn publish(
    &self,
    topic: &str,
    payload: impl Into<String>,
    received_time: DateTime<Utc>,
  ) -> u64 {
    let mut s = self.state();
    let offset = s.next_offset.entry(topic.to_owned()).or_insert(0);
    let assigned = *offset;
    *offset += 1;
    s.pending.push(FeedMessage {
      topic: topic.to_owned(),
      offset: assigned,
      payload: payload.into(),
      received_time,
    });
    assigned
  }

  /// Make the next `n` connection attempts fail.
  pub fn fail_next_connects(&self, n: u32) { self.state().failing = n; }

  /// Drop the current connection; the next poll reports it closed.
  pub fn sever(&self) { self.state().severed = true; }

  /// Successful connections so far.
  pub fn connects(&self) -> u32 { self.state().connects }

  /// Every `(topic, offset)` committed, in commit order.
  pub fn committed(&self) -> Vec<(String, u64)> { self.state().committed.clone() }

  /// Messages not yet committed.
  pub fn pending(&self) -> usize { self.state().pending.len() }
}

impl FeedTransport for MemoryFeed {
  async fn connect<'a>(&'a mut self, topics: &'a [String]) -> Result<(), ConnectionError> {
    let mut s = self.state();
    if s.failing > 0 {
      s.failing -= 1;
      return Err(ConnectionError::Unreachable("scripted connect failure".into()));
    }
    s.topics = topics.to_vec();
    s.cursor = 0;
    s.connected = true;
    s.severed = false;
    s.connects += 1;
    Ok(())
  }

  async fn poll(&mut self, timeout: Duration) -> Result<Option<FeedMessage>, ConnectionError> {
    let next = {
      let mut s = self.state();
      if s.severed {
        s.severed = false;
        s.connected = false;
      }
      if !s.connected {
        return Err(ConnectionError::Closed);
      }
      let start = s.cursor;
      let found = s.pending[start..]
        .iter()
        .position(|m| s.topics.contains(&m.topic))
        .map(|i| start + i);
      match found {
        Some(i) => {
          s.cursor = i + 1;
          Some(s.pending[i].clone())
        }
        None => {
          s.cursor = s.pending.len();
          None
        }
      }
    };
    if next.is_none() {
      tokio::time::sleep(timeout).await;
    }
    Ok(next)
  }

  async fn commit<'a>(&'a mut self, message: &'a FeedMessage) -> Result<(), ConnectionError> {
    let mut s = self.state();
    if !s.connected {
      return Err(ConnectionError::Closed);
    }
    if let Some(i) = s
      .pending
      .iter()
      .position(|m| m.topic == message.topic && m.offset == message.offset)
    {
      s.pending.remove(i);
      if i < s.cursor {
        s.cursor -= 1;
      }
    }
    s.committed.push((message.topic.clone(), message.offset));
    Ok(())
  }

  async fn close(&mut self) { self.state().connected = false; }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap() }

  #[tokio::test(start_paused = true)]
  async fn uncommitted_messages_are_redelivered_after_reconnect() {
    let mut feed = MemoryFeed::new();
    feed.publish("a", "one", at());
    feed.publish("a", "two", at());
    let topics = vec!["a".to_owned()];

    feed.connect(&topics).await.unwrap();
    let first = feed.poll(Duration::from_secs(1)).await.unwrap().unwrap();
    feed.commit(&first).await.unwrap();
    let second = feed.poll(Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(second.payload, "two");
    feed.close().await;

    feed.connect(&topics).await.unwrap();
    let again = feed.poll(Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(again, second);
    assert_eq!(feed.committed(), vec![("a".to_owned(), 0)]);
  }

  #[tokio::test(start_paused = true)]
  async fn unsubscribed_topics_are_not_delivered() {
    let mut feed = MemoryFeed::new();
    feed.publish("other", "x", at());
    feed.connect(&["a".to_owned()]).await.unwrap();
    assert!(feed.poll(Duration::from_secs(1)).await.unwrap().is_none());
    assert_eq!(feed.pending(), 1);
  }

  #[tokio::test]
  async fn severed_connection_reports_closed() {
    let mut feed = MemoryFeed::new();
    feed.fail_next_connects(1);
    assert!(feed.connect(&["a".to_owned()]).await.is_err());
    feed.connect(&["a".to_owned()]).await.unwrap();
    feed.sever();
    assert!(matches!(
      feed.poll(Duration::from_secs(1)).await,
      Err(ConnectionError::Closed)
    ));
    assert_eq!(feed.connects(), 1);
  }
}
