//! The GCN alert monitor: stream consumer, decision engine, outbound
//! formatting and the pipeline that wires them to the extractor, the event
//! store and the visibility engine.

pub mod consumer;
pub mod decide;
pub mod feed;
pub mod format;
pub mod pipeline;
pub mod request;
pub mod settings;
pub mod sink;

pub use consumer::{Consumer, ConsumerConfig, Handler};
pub use pipeline::{Outcome, Pipeline, PipelineConfig};
pub use settings::MonitorConfig;
pub use sink::{DryRunSink, Sink, Sinks, WebhookSink};
