//! Core types and trait definitions for the GCN alert monitor.
//!
//! This crate holds the event data model, the per-field merge policy and the
//! [`EventStore`](store::EventStore) that owns all reconciliation. It performs
//! no I/O of its own; durable backends implement
//! [`TableStorage`](store::TableStorage) in `gcn-store`.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod field;
pub mod memory;
pub mod merge;
pub mod naming;
pub mod store;

pub use error::{Error, Result, StoreError};
pub use event::{
  Coordinates, EventId, EventRecord, FieldKey, Fragment, Instrument, Mission,
  Provenance, SourceKind,
};
pub use field::Field;
