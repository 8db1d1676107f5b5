//! [`MemoryStorage`]: a non-durable [`TableStorage`] for tests and dry runs.

use std::{
  convert::Infallible,
  future::Future,
  sync::{Arc, Mutex, PoisonError},
};

use crate::store::{Commit, TableStorage, Tables};

/// Keeps the last persisted tables in memory.
///
/// Cloning is cheap; clones share the same snapshot, so a test can keep a
/// handle while the store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
  inner: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
  pub fn new() -> Self { Self::default() }

  /// Start from pre-existing tables, as if loaded from disk.
  pub fn with_tables(tables: Tables) -> Self {
    Self { inner: Arc::new(Mutex::new(tables)) }
  }

  /// The tables as of the last successful persist.
  pub fn snapshot(&self) -> Tables {
    self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

impl TableStorage for MemoryStorage {
  type Error = Infallible;

  fn load(&self) -> impl Future<Output = Result<Tables, Self::Error>> + Send + '_ {
    async move { Ok(self.snapshot()) }
  }

  fn persist<'a>(
    &'a self,
    tables: &'a Tables,
    _commit: Commit<'a>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a {
    async move {
      *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = tables.clone();
      Ok(())
    }
  }
}
