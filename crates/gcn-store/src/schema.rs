//! SQL schema for the SQLite table backend.
//!
//! Executed once at connection startup; `PRAGMA user_version` records the
//! layout so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// `notices`, `circulars` and `combined` share one row shape; see
/// [`RECORD_COLUMNS`](crate::encode::RECORD_COLUMNS).
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS notices (
    event_id      TEXT PRIMARY KEY,
    designation   TEXT NOT NULL,
    source_kind   TEXT NOT NULL,   -- 'notice' | 'circular'
    instrument    TEXT NOT NULL,
    name          TEXT,            -- NULL = unknown
    trigger_num   TEXT,
    ra_deg        REAL,
    dec_deg       REAL,
    error_deg     REAL,
    event_time    TEXT,            -- RFC 3339 UTC
    received_time TEXT NOT NULL,
    first_seen    TEXT NOT NULL,
    retracted     INTEGER,
    aliases       TEXT NOT NULL,   -- JSON array
    extra_fields  TEXT NOT NULL,   -- JSON object, null = unknown
    provenance    TEXT NOT NULL,   -- JSON object keyed by field
    fingerprints  TEXT NOT NULL,   -- JSON array
    raw_text      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS circulars (
    event_id      TEXT PRIMARY KEY,
    designation   TEXT NOT NULL,
    source_kind   TEXT NOT NULL,
    instrument    TEXT NOT NULL,
    name          TEXT,
    trigger_num   TEXT,
    ra_deg        REAL,
    dec_deg       REAL,
    error_deg     REAL,
    event_time    TEXT,
    received_time TEXT NOT NULL,
    first_seen    TEXT NOT NULL,
    retracted     INTEGER,
    aliases       TEXT NOT NULL,
    extra_fields  TEXT NOT NULL,
    provenance    TEXT NOT NULL,
    fingerprints  TEXT NOT NULL,
    raw_text      TEXT NOT NULL
);

-- Latest merged state per event; what downstream planning reads.
CREATE TABLE IF NOT EXISTS combined (
    event_id      TEXT PRIMARY KEY,
    designation   TEXT NOT NULL,
    source_kind   TEXT NOT NULL,
    instrument    TEXT NOT NULL,
    name          TEXT,
    trigger_num   TEXT,
    ra_deg        REAL,
    dec_deg       REAL,
    error_deg     REAL,
    event_time    TEXT,
    received_time TEXT NOT NULL,
    first_seen    TEXT NOT NULL,
    retracted     INTEGER,
    aliases       TEXT NOT NULL,
    extra_fields  TEXT NOT NULL,
    provenance    TEXT NOT NULL,
    fingerprints  TEXT NOT NULL,
    raw_text      TEXT NOT NULL
);

-- Messages that could not be linked to an event. Append-only.
CREATE TABLE IF NOT EXISTS unlinked (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    topic         TEXT NOT NULL,
    source_kind   TEXT NOT NULL,
    reason        TEXT NOT NULL,
    received_time TEXT NOT NULL,
    raw_text      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS combined_received_idx ON combined(received_time);

PRAGMA user_version = 1;
";
