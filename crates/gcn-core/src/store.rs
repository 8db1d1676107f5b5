//! The [`EventStore`] and the [`TableStorage`] trait it persists through.
//!
//! The store keeps the notice, circular and combined tables in memory and is
//! the only writer to them. Every successful merge is followed by a durable
//! write through the backend; a failed write rolls the in-memory tables back
//! so that redelivery of the same message merges it again.

use std::{
  collections::{BTreeMap, btree_map::Entry},
  future::Future,
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
  error::StoreError,
  event::{EventId, EventRecord, FieldKey, Fragment, SourceKind},
  merge::{self, ChangeKind, MergePolicy},
  naming::{self, DesignationStyle},
};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// A raw message that could not be linked to any event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkedMessage {
  pub topic:         String,
  pub source_kind:   SourceKind,
  pub reason:        String,
  pub received_time: DateTime<Utc>,
  pub raw_text:      String,
}

/// The complete persisted state of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
  pub notices:   BTreeMap<EventId, EventRecord>,
  pub circulars: BTreeMap<EventId, EventRecord>,
  pub combined:  BTreeMap<EventId, EventRecord>,
  pub unlinked:  Vec<UnlinkedMessage>,
}

impl Tables {
  pub fn source(&self, kind: SourceKind) -> &BTreeMap<EventId, EventRecord> {
    match kind {
      SourceKind::Notice => &self.notices,
      SourceKind::Circular => &self.circulars,
    }
  }

  pub fn source_mut(
    &mut self,
    kind: SourceKind,
  ) -> &mut BTreeMap<EventId, EventRecord> {
    match kind {
      SourceKind::Notice => &mut self.notices,
      SourceKind::Circular => &mut self.circulars,
    }
  }

  /// The combined view, most recently received first.
  pub fn combined_latest_first(&self) -> Vec<&EventRecord> {
    let mut rows: Vec<&EventRecord> = self.combined.values().collect();
    rows.sort_by(|a, b| {
      b.received_time
        .cmp(&a.received_time)
        .then_with(|| a.event_id.cmp(&b.event_id))
    });
    rows
  }
}

/// What changed in the tables handed to [`TableStorage::persist`].
#[derive(Debug, Clone, Copy)]
pub enum Commit<'a> {
  /// One event's source row and combined row were written.
  Merge {
    event_id: &'a EventId,
    source:   SourceKind,
  },
  /// The last entry of [`Tables::unlinked`] was appended.
  Unlinked,
}

// ─── Storage trait ───────────────────────────────────────────────────────────

/// Durable backend for the event tables.
///
/// Backends may rewrite everything on each commit (flat files) or apply only
/// the rows named by the [`Commit`] (databases).
pub trait TableStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read every table. An empty backend yields [`Tables::default`].
  fn load(&self) -> impl Future<Output = Result<Tables, Self::Error>> + Send + '_;

  /// Make `tables` durable after the change described by `commit`.
  fn persist<'a>(
    &'a self,
    tables: &'a Tables,
    commit: Commit<'a>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Result of [`EventStore::merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
  /// The combined row after the merge.
  pub record:         EventRecord,
  pub change:         ChangeKind,
  /// Fields of the combined row that the fragment set or replaced.
  pub changed_fields: Vec<FieldKey>,
}

/// Canonical event-id to merged-record mapping; sole writer of all tables.
pub struct EventStore<S> {
  storage: S,
  tables:  Tables,
  aliases: BTreeMap<EventId, EventId>,
  policy:  MergePolicy,
}

impl<S: TableStorage> EventStore<S> {
  /// Load the tables from `storage` and rebuild the alias index.
  pub async fn open(
    storage: S,
    policy: MergePolicy,
  ) -> Result<Self, StoreError<S::Error>> {
    let tables = storage.load().await.map_err(StoreError::Load)?;
    let mut store = Self {
      storage,
      tables,
      aliases: BTreeMap::new(),
      policy,
    };
    let rows: Vec<(EventId, Vec<EventId>)> = store
      .tables
      .combined
      .values()
      .map(|r| (r.event_id.clone(), r.aliases.iter().cloned().collect()))
      .collect();
    for (id, aliases) in rows {
      store.register_aliases(&id, aliases);
    }
    info!(
      events = store.tables.combined.len(),
      unlinked = store.tables.unlinked.len(),
      "event store opened"
    );
    Ok(store)
  }

  pub fn tables(&self) -> &Tables { &self.tables }

  pub fn storage(&self) -> &S { &self.storage }

  /// Look up a combined record by any identifier it is known under.
  pub fn get(&self, id: &EventId) -> Option<&EventRecord> {
    let canonical = self.aliases.get(id).unwrap_or(id);
    self.tables.combined.get(canonical)
  }

  /// Fold one fragment into its source table and the combined view, then
  /// persist.
  pub async fn merge(
    &mut self,
    fragment: Fragment,
  ) -> Result<Merged, StoreError<S::Error>> {
    let kind = fragment.source_kind;
    let canonical = self.resolve(&fragment);
    let fingerprint = fragment.fingerprint();

    let previous_source = self.tables.source(kind).get(&canonical).cloned();
    let previous_combined = self.tables.combined.get(&canonical).cloned();

    // A duplicate must be on record in both tables; a fingerprint in only
    // one of them is a half-persisted merge that has to be applied again.
    if let (Some(source_row), Some(combined_row)) = (&previous_source, &previous_combined)
      && source_row.fingerprints.contains(&fingerprint)
      && combined_row.fingerprints.contains(&fingerprint)
    {
      debug!(event_id = %canonical, source = %kind, "duplicate fragment ignored");
      return Ok(Merged {
        record: combined_row.clone(),
        change: ChangeKind::DuplicateIgnored,
        changed_fields: Vec::new(),
      });
    }

    let change = match (&previous_combined, &previous_source) {
      (None, _) => ChangeKind::Created,
      (Some(_), Some(_)) => ChangeKind::UpdatedSameSource,
      (Some(_), None) => ChangeKind::UpdatedCrossSource,
    };

    let designation = match &previous_combined {
      Some(row) => row.designation.clone(),
      None => self.allocate_designation(&fragment),
    };

    if let Some(event_time) = fragment.event_time.known()
      && *event_time > fragment.received_time
    {
      warn!(
        event_id = %canonical,
        source = %kind,
        %event_time,
        received_time = %fragment.received_time,
        "event time is later than received time"
      );
    }

    let mut source_row = previous_source.clone().unwrap_or_else(|| {
      EventRecord::empty(
        canonical.clone(),
        designation.clone(),
        kind,
        fragment.received_time,
      )
    });
    merge::refine(&mut source_row, &fragment, &self.policy);
    source_row.fingerprints.insert(fingerprint.clone());

    let mut combined_row = previous_combined.clone().unwrap_or_else(|| {
      EventRecord::empty(
        canonical.clone(),
        designation,
        kind,
        fragment.received_time,
      )
    });
    let refinement = merge::refine(&mut combined_row, &fragment, &self.policy);
    combined_row.fingerprints.insert(fingerprint);

    for conflict in &refinement.conflicts {
      warn!(
        event_id = %canonical,
        field = %conflict.field,
        existing = %conflict.existing.source,
        incoming = %conflict.incoming.source,
        replaced = conflict.replaced,
        "merge conflict resolved by source priority"
      );
    }

    self
      .tables
      .source_mut(kind)
      .insert(canonical.clone(), source_row);
    self
      .tables
      .combined
      .insert(canonical.clone(), combined_row.clone());

    let commit = Commit::Merge { event_id: &canonical, source: kind };
    if let Err(e) = self.storage.persist(&self.tables, commit).await {
      restore(self.tables.source_mut(kind), &canonical, previous_source);
      restore(&mut self.tables.combined, &canonical, previous_combined);
      return Err(StoreError::Persistence(e));
    }

    self.register_aliases(&canonical, combined_row.aliases.iter().cloned());
    debug!(
      event_id = %canonical,
      source = %kind,
      %change,
      changed = refinement.changed.len(),
      "fragment merged"
    );

    Ok(Merged {
      record: combined_row,
      change,
      changed_fields: refinement.changed,
    })
  }

  /// Append a message that could not be linked to an event.
  pub async fn preserve_unlinked(
    &mut self,
    message: UnlinkedMessage,
  ) -> Result<(), StoreError<S::Error>> {
    self.tables.unlinked.push(message);
    if let Err(e) = self.storage.persist(&self.tables, Commit::Unlinked).await {
      self.tables.unlinked.pop();
      return Err(StoreError::Persistence(e));
    }
    Ok(())
  }

  // ── Internals ─────────────────────────────────────────────────────────

  /// Map a fragment to the canonical id of the event it describes.
  fn resolve(&self, fragment: &Fragment) -> EventId {
    std::iter::once(&fragment.event_id)
      .chain(&fragment.aliases)
      .find_map(|id| self.aliases.get(id))
      .cloned()
      .unwrap_or_else(|| fragment.event_id.clone())
  }

  fn register_aliases(
    &mut self,
    canonical: &EventId,
    aliases: impl IntoIterator<Item = EventId>,
  ) {
    for alias in std::iter::once(canonical.clone()).chain(aliases) {
      match self.aliases.entry(alias) {
        Entry::Vacant(slot) => {
          slot.insert(canonical.clone());
        }
        Entry::Occupied(slot) if slot.get() != canonical => {
          warn!(
            alias = %slot.key(),
            event_id = %canonical,
            existing = %slot.get(),
            "identifier already belongs to another event"
          );
        }
        Entry::Occupied(_) => {}
      }
    }
  }

  fn allocate_designation(&self, fragment: &Fragment) -> String {
    let date = fragment
      .event_time
      .known()
      .copied()
      .unwrap_or(fragment.received_time)
      .date_naive();
    naming::allocate(
      DesignationStyle::for_instrument(fragment.instrument),
      date,
      self.tables.combined.values().map(|r| r.designation.as_str()),
    )
  }
}

fn restore(
  table: &mut BTreeMap<EventId, EventRecord>,
  id: &EventId,
  previous: Option<EventRecord>,
) {
  match previous {
    Some(row) => {
      table.insert(id.clone(), row);
    }
    None => {
      table.remove(id);
    }
  }
}
