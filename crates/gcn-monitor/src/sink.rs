//! Outbound delivery of notifications and observation requests.

use std::{future::Future, time::Duration};

use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::request::RequestPayload;

#[derive(Debug, Error)]
pub enum SinkError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{url} returned {status}")]
  Status {
    url:    String,
    status: reqwest::StatusCode,
  },
}

/// Where notification text and request documents go.
pub trait Sink: Send + Sync {
  fn notify<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<(), SinkError>> + Send + 'a;

  /// Deliver `payload`. With `send == false` the request is only recorded.
  fn request<'a>(
    &'a self,
    payload: &'a RequestPayload,
    send: bool,
  ) -> impl Future<Output = Result<(), SinkError>> + Send + 'a;
}

// ─── Dry run ─────────────────────────────────────────────────────────────────

/// Logs everything and delivers nothing.
#[derive(Debug, Clone, Default)]
pub struct DryRunSink;

impl Sink for DryRunSink {
  async fn notify<'a>(&'a self, text: &'a str) -> Result<(), SinkError> {
    info!("notification (dry run):\n{text}");
    Ok(())
  }

  async fn request<'a>(&'a self, payload: &'a RequestPayload, send: bool) -> Result<(), SinkError> {
    info!(
      target_name = %payload.target,
      observer = %payload.observer,
      start = %payload.obs_start_time,
      send,
      "observation request (dry run)"
    );
    Ok(())
  }
}

// ─── Webhook ─────────────────────────────────────────────────────────────────

/// Posts notifications as `{"text": ...}` and requests as their JSON
/// document.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct WebhookSink {
  client:      Client,
  notify_url:  Option<String>,
  request_url: Option<String>,
}

impl WebhookSink {
  pub fn new(
    notify_url: Option<String>,
    request_url: Option<String>,
    timeout: Duration,
  ) -> Result<Self, SinkError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, notify_url, request_url })
  }

  async fn post<T: Serialize + Sync + ?Sized>(&self, url: &str, body: &T) -> Result<(), SinkError> {
    let resp = self.client.post(url).json(body).send().await?;
    if !resp.status().is_success() {
      return Err(SinkError::Status { url: url.to_owned(), status: resp.status() });
    }
    Ok(())
  }
}

impl Sink for WebhookSink {
  async fn notify<'a>(&'a self, text: &'a str) -> Result<(), SinkError> {
    match &self.notify_url {
      Some(url) => self.post(url, &json!({ "text": text })).await,
      None => Ok(()),
    }
  }

  async fn request<'a>(&'a self, payload: &'a RequestPayload, send: bool) -> Result<(), SinkError> {
    match (&self.request_url, send) {
      (Some(url), true) => {
        self.post(url, payload).await?;
        info!(target_name = %payload.target, observer = %payload.observer, "observation request sent");
        Ok(())
      }
      _ => {
        info!(
          target_name = %payload.target,
          observer = %payload.observer,
          "observation request prepared, not sent"
        );
        Ok(())
      }
    }
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// The sink chosen at startup.
#[derive(Debug, Clone)]
pub enum Sinks {
  DryRun(DryRunSink),
  Webhook(WebhookSink),
}

impl Sink for Sinks {
  async fn notify<'a>(&'a self, text: &'a str) -> Result<(), SinkError> {
    match self {
      Sinks::DryRun(s) => s.notify(text).await,
      Sinks::Webhook(s) => s.notify(text).await,
    }
  }

  async fn request<'a>(&'a self, payload: &'a RequestPayload, send: bool) -> Result<(), SinkError> {
    match self {
      Sinks::DryRun(s) => s.request(payload, send).await,
      Sinks::Webhook(s) => s.request(payload, send).await,
    }
  }
}
