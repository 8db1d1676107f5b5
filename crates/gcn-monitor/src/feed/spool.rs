//! [`SpoolFeed`]: a directory tree filled by an external feed client.
//!
//! Layout: `<root>/<topic>/<offset>` holds one payload per file. Committing
//! moves the file to `<root>/<topic>/committed/<offset>`. The file's
//! modification time is the message's received time.

use std::{
  collections::BTreeSet,
  path::{Path, PathBuf},
  time::{Duration, SystemTime},
};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use super::{ConnectionError, FeedMessage, FeedTransport};

const COMMITTED_DIR: &str = "committed";

#[derive(Debug)]
struct Candidate {
  modified: SystemTime,
  topic:    String,
  offset:   u64,
  path:     PathBuf,
}

/// Feed backed by a spool directory.
#[derive(Debug)]
pub struct SpoolFeed {
  root:          PathBuf,
  scan_interval: Duration,
  topics:        Vec<String>,
  /// Delivered in this session and not yet committed.
  delivered:     BTreeSet<(String, u64)>,
  connected:     bool,
}

impl SpoolFeed {
  pub fn new(root: impl Into<PathBuf>, scan_interval: Duration) -> Self {
    Self {
      root: root.into(),
      scan_interval,
      topics: Vec::new(),
      delivered: BTreeSet::new(),
      connected: false,
    }
  }

  pub fn root(&self) -> &Path { &self.root }

  fn topic_dir(&self, topic: &str) -> PathBuf { self.root.join(topic) }

  /// The next message to deliver: each topic's lowest undelivered offset,
  /// and among those heads the earliest modified.
  ///
  /// Offsets order a topic. Modification times only interleave topics, so a
  /// file touched after it was spooled never jumps ahead of a lower offset.
  async fn next_pending(&self) -> Result<Option<Candidate>, ConnectionError> {
    let mut best: Option<Candidate> = None;
    for topic in &self.topics {
      let Some(head) = self.topic_head(topic).await? else { continue };
      let earlier = best
        .as_ref()
        .is_none_or(|b| (head.modified, &head.topic) < (b.modified, &b.topic));
      if earlier {
        best = Some(head);
      }
    }
    Ok(best)
  }

  /// Lowest undelivered offset in `topic`.
  async fn topic_head(&self, topic: &str) -> Result<Option<Candidate>, ConnectionError> {
    let mut head: Option<(u64, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(self.topic_dir(topic)).await?;
    while let Some(entry) = entries.next_entry().await? {
      let Some(offset) = entry
        .file_name()
        .to_str()
        .and_then(|name| name.parse::<u64>().ok())
      else {
        continue;
      };
      if self.delivered.contains(&(topic.to_owned(), offset)) {
        continue;
      }
      if head.as_ref().is_some_and(|(lowest, _)| *lowest < offset) {
        continue;
      }
      if !entry.file_type().await?.is_file() {
        continue;
      }
      head = Some((offset, entry.path()));
    }

    let Some((offset, path)) = head else { return Ok(None) };
    let modified = tokio::fs::metadata(&path).await?.modified()?;
    Ok(Some(Candidate { modified, topic: topic.to_owned(), offset, path }))
  }
}

impl FeedTransport for SpoolFeed {
  async fn connect<'a>(&'a mut self, topics: &'a [String]) -> Result<(), ConnectionError> {
    let meta = tokio::fs::metadata(&self.root).await.map_err(|e| {
      ConnectionError::Unreachable(format!("{}: {e}", self.root.display()))
    })?;
    if !meta.is_dir() {
      return Err(ConnectionError::Unreachable(format!(
        "{} is not a directory",
        self.root.display()
      )));
    }
    for topic in topics {
      tokio::fs::create_dir_all(self.topic_dir(topic).join(COMMITTED_DIR)).await?;
    }
    self.topics = topics.to_vec();
    self.delivered.clear();
    self.connected = true;
    debug!(root = %self.root.display(), topics = topics.len(), "spool subscribed");
    Ok(())
  }

  async fn poll(&mut self, timeout: Duration) -> Result<Option<FeedMessage>, ConnectionError> {
    if !self.connected {
      return Err(ConnectionError::Closed);
    }
    let deadline = Instant::now() + timeout;
    loop {
      if let Some(c) = self.next_pending().await? {
        let payload = tokio::fs::read_to_string(&c.path).await?;
        self.delivered.insert((c.topic.clone(), c.offset));
        return Ok(Some(FeedMessage {
          topic: c.topic,
          offset: c.offset,
          payload,
          received_time: DateTime::<Utc>::from(c.modified),
        }));
      }
      let now = Instant::now();
      if now >= deadline {
        return Ok(None);
      }
      tokio::time::sleep(self.scan_interval.min(deadline - now)).await;
    }
  }

  async fn commit<'a>(&'a mut self, message: &'a FeedMessage) -> Result<(), ConnectionError> {
    if !self.connected {
      return Err(ConnectionError::Closed);
    }
    let dir = self.topic_dir(&message.topic);
    let name = message.offset.to_string();
    tokio::fs::rename(dir.join(&name), dir.join(COMMITTED_DIR).join(&name)).await?;
    self.delivered.remove(&(message.topic.clone(), message.offset));
    Ok(())
  }

  async fn close(&mut self) {
    self.connected = false;
    self.delivered.clear();
  }
}
