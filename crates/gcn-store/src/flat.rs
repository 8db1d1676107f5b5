//! [`CsvTables`]: human-inspectable CSV files, one per table.
//!
//! Every commit rewrites the files it touched in full: the rows are encoded
//! in memory, written to a sibling temp file and renamed over the original,
//! so a reader never sees a half-written table.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use gcn_core::{
  EventRecord, SourceKind,
  store::{Commit, TableStorage, Tables},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RECORD_COLUMNS, RawRecord, RawUnlinked, index},
};

const UNLINKED_COLUMNS: &[&str] =
  &["topic", "source_kind", "reason", "received_time", "raw_text"];

/// Event tables as `notices.csv`, `circulars.csv`, `combined.csv` and
/// `unlinked.csv` under one directory.
#[derive(Debug, Clone)]
pub struct CsvTables {
  dir: PathBuf,
}

impl CsvTables {
  /// Use `dir`, creating it if needed. Existing files are read on
  /// [`load`](TableStorage::load).
  pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
    let dir = dir.into();
    tokio::fs::create_dir_all(&dir).await?;
    Ok(Self { dir })
  }

  pub fn dir(&self) -> &Path { &self.dir }

  pub fn path(&self, table: &str) -> PathBuf { self.dir.join(format!("{table}.csv")) }

  fn source_table(kind: SourceKind) -> &'static str {
    match kind {
      SourceKind::Notice => "notices",
      SourceKind::Circular => "circulars",
    }
  }
}

// ─── Encoding ────────────────────────────────────────────────────────────────

fn encode_rows<T: Serialize>(header: &[&str], rows: &[T]) -> Result<Vec<u8>> {
  let mut writer = csv::WriterBuilder::new()
    .has_headers(false)
    .from_writer(Vec::new());
  writer.write_record(header)?;
  for row in rows {
    writer.serialize(row)?;
  }
  writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn encode_records<'r>(records: impl IntoIterator<Item = &'r EventRecord>) -> Result<Vec<u8>> {
  let rows = records
    .into_iter()
    .map(RawRecord::from_record)
    .collect::<Result<Vec<_>>>()?;
  encode_rows(RECORD_COLUMNS, &rows)
}

fn decode_rows<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
  let mut reader = csv::Reader::from_reader(bytes);
  Ok(reader.deserialize().collect::<Result<Vec<T>, csv::Error>>()?)
}

// ─── File access ─────────────────────────────────────────────────────────────

async fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
  match tokio::fs::read(path).await {
    Ok(bytes) => decode_rows(&bytes),
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
    Err(e) => Err(e.into()),
  }
}

async fn replace_file(path: &Path, bytes: Vec<u8>) -> Result<()> {
  let tmp = path.with_extension("csv.tmp");
  tokio::fs::write(&tmp, bytes).await?;
  tokio::fs::rename(&tmp, path).await?;
  Ok(())
}

impl TableStorage for CsvTables {
  type Error = Error;

  async fn load(&self) -> Result<Tables> {
    let notices: Vec<RawRecord> = read_table(&self.path("notices")).await?;
    let circulars: Vec<RawRecord> = read_table(&self.path("circulars")).await?;
    let combined: Vec<RawRecord> = read_table(&self.path("combined")).await?;
    let unlinked: Vec<RawUnlinked> = read_table(&self.path("unlinked")).await?;

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
        let table = Self::source_table(source);
        let source_bytes = encode_records(tables.source(source).values())?;
        let combined_bytes = encode_records(tables.combined_latest_first())?;
        // Combined first: a fingerprint in the source table alone must
        // never make a redelivery look like a duplicate.
        replace_file(&self.path("combined"), combined_bytes).await?;
        replace_file(&self.path(table), source_bytes).await?;
        debug!(%event_id, %source, dir = %self.dir.display(), "csv tables rewritten");
      }
      Commit::Unlinked => {
        let rows: Vec<RawUnlinked> =
          tables.unlinked.iter().map(RawUnlinked::from_message).collect();
        let bytes = encode_rows(UNLINKED_COLUMNS, &rows)?;
        replace_file(&self.path("unlinked"), bytes).await?;
      }
    }
    Ok(())
  }
}
