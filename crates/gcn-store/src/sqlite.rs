//! [`SqliteTables`]: the SQLite implementation of [`TableStorage`].

use std::path::Path;

use gcn_core::{
  SourceKind,
  store::{Commit, TableStorage, Tables},
};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RECORD_COLUMNS, RawRecord, RawUnlinked, index},
  schema::SCHEMA,
};

fn table_name(kind: SourceKind) -> &'static str {
  match kind {
    SourceKind::Notice => "notices",
    SourceKind::Circular => "circulars",
  }
}

// ─── Row access ──────────────────────────────────────────────────────────────

fn read_records(
  conn: &rusqlite::Connection,
  table: &str,
) -> rusqlite::Result<Vec<RawRecord>> {
  let sql = format!("SELECT {} FROM {table}", RECORD_COLUMNS.join(", "));
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt.query_map([], |r| {
    Ok(RawRecord {
      event_id:      r.get(0)?,
      designation:   r.get(1)?,
      source_kind:   r.get(2)?,
      instrument:    r.get(3)?,
      name:          r.get(4)?,
      trigger_num:   r.get(5)?,
      ra_deg:        r.get(6)?,
      dec_deg:       r.get(7)?,
      error_deg:     r.get(8)?,
      event_time:    r.get(9)?,
      received_time: r.get(10)?,
      first_seen:    r.get(11)?,
      retracted:     r.get(12)?,
      aliases:       r.get(13)?,
      extra_fields:  r.get(14)?,
      provenance:    r.get(15)?,
      fingerprints:  r.get(16)?,
      raw_text:      r.get(17)?,
    })
  })?;
  rows.collect()
}

fn write_record(
  conn: &rusqlite::Connection,
  table: &str,
  row: &RawRecord,
) -> rusqlite::Result<()> {
  let placeholders: Vec<String> =
    (1..=RECORD_COLUMNS.len()).map(|i| format!("?{i}")).collect();
  let sql = format!(
    "INSERT OR REPLACE INTO {table} ({}) VALUES ({})",
    RECORD_COLUMNS.join(", "),
    placeholders.join(", "),
  );
  conn.execute(
    &sql,
    rusqlite::params![
      row.event_id,
      row.designation,
      row.source_kind,
      row.instrument,
      row.name,
      row.trigger_num,
      row.ra_deg,
      row.dec_deg,
      row.error_deg,
      row.event_time,
      row.received_time,
      row.first_seen,
      row.retracted,
      row.aliases,
      row.extra_fields,
      row.provenance,
      row.fingerprints,
      row.raw_text,
    ],
  )?;
  Ok(())
}

fn read_unlinked(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<RawUnlinked>> {
  let mut stmt = conn.prepare(
    "SELECT topic, source_kind, reason, received_time, raw_text
     FROM unlinked ORDER BY seq",
  )?;
  let rows = stmt.query_map([], |r| {
    Ok(RawUnlinked {
      topic:         r.get(0)?,
      source_kind:   r.get(1)?,
      reason:        r.get(2)?,
      received_time: r.get(3)?,
      raw_text:      r.get(4)?,
    })
  })?;
  rows.collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Event tables in a single SQLite file.
///
/// Each merge upserts exactly the two rows it touched inside one transaction.
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteTables {
  conn: tokio_rusqlite::Connection,
}

impl SqliteTables {
  /// Open (or create) the database at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let tables = Self { conn };
    tables.init_schema().await?;
    Ok(tables)
  }

  /// Open an in-memory database, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let tables = Self { conn };
    tables.init_schema().await?;
    Ok(tables)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl TableStorage for SqliteTables {
  type Error = Error;

  async fn load(&self) -> Result<Tables> {
    let (notices, circulars, combined, unlinked) = self
      .conn
      .call(|conn| {
        Ok((
          read_records(conn, "notices")?,
          read_records(conn, "circulars")?,
          read_records(conn, "combined")?,
          read_unlinked(conn)?,
        ))
      })
      .await?;

    Ok(Tables {
      notices:   index(notices)?,
      circulars: index(circulars)?,
      combined:  index(combined)?,
      unlinked:  unlinked
        .into_iter()
        .map(RawUnlinked::into_message)
        .collect::<Result<_>>()?,
    })
  }

  async fn persist<'a>(&'a self, tables: &'a Tables, commit: Commit<'a>) -> Result<()> {
    match commit {
      Commit::Merge { event_id, source } => {
        let source_row = tables
          .source(source)
          .get(event_id)
          .map(RawRecord::from_record)
          .transpose()?;
        let combined_row = tables
          .combined
          .get(event_id)
          .map(RawRecord::from_record)
          .transpose()?;
        let table = table_name(source);

        self
          .conn
          .call(move |conn| {
            let tx = conn.transaction()?;
            if let Some(row) = &source_row {
              write_record(&tx, table, row)?;
            }
            if let Some(row) = &combined_row {
              write_record(&tx, "combined", row)?;
            }
            tx.commit()?;
            Ok(())
          })
          .await?;
        debug!(%event_id, %source, "sqlite rows upserted");
      }
      Commit::Unlinked => {
        let Some(message) = tables.unlinked.last() else {
          return Ok(());
        };
        let row = RawUnlinked::from_message(message);
        self
          .conn
          .call(move |conn| {
            conn.execute(
              "INSERT INTO unlinked (topic, source_kind, reason, received_time, raw_text)
               VALUES (?1, ?2, ?3, ?4, ?5)",
              rusqlite::params![
                row.topic,
                row.source_kind,
                row.reason,
                row.received_time,
                row.raw_text,
              ],
            )?;
            Ok(())
          })
          .await?;
      }
    }
    Ok(())
  }
}
