//! `Store`: SQLite-backed index over an append-only JSONL journal.
//!
//! The journal is the source of truth (one file per collection, append
//! only — safe to track in git and replay). SQLite is a queryable cache
//! over the journal's latest state per id, rebuilt by [`Store::sync`].
//! Every write goes through both: append to the journal, then upsert the
//! cache row inside the same call, so the two never drift outside of a
//! crash between the two steps — which `sync` repairs on next startup.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::{filters_match, now_ms, Filter, IndexValue, Record};
use crate::stored::Stored;

/// One journal line. `indexed` is stored alongside `data` so `sync` can
/// rebuild the SQLite cache without re-deserializing into the concrete
/// domain type (the journal reader doesn't know `T`).
#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    id: String,
    version: u64,
    updated_at: i64,
    data: serde_json::Value,
    indexed: HashMap<String, SerializableIndexValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum SerializableIndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl From<&IndexValue> for SerializableIndexValue {
    fn from(v: &IndexValue) -> Self {
        match v {
            IndexValue::String(s) => Self::String(s.clone()),
            IndexValue::Int(i) => Self::Int(*i),
            IndexValue::Bool(b) => Self::Bool(*b),
        }
    }
}

impl From<SerializableIndexValue> for IndexValue {
    fn from(v: SerializableIndexValue) -> Self {
        match v {
            SerializableIndexValue::String(s) => IndexValue::String(s),
            SerializableIndexValue::Int(i) => IndexValue::Int(i),
            SerializableIndexValue::Bool(b) => IndexValue::Bool(b),
        }
    }
}

pub struct Store {
    conn: Connection,
    journal_dir: PathBuf,
}

impl Store {
    /// Open (creating if absent) a store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let base = path.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        let journal_dir = base.join("journal");
        fs::create_dir_all(&journal_dir)?;

        let conn = Connection::open(base.join("index.sqlite3"))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                data TEXT NOT NULL,
                indexed TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;

        debug!(path = %base.display(), "opened texloom-store");
        Ok(Self { conn, journal_dir })
    }

    fn journal_path(collection: &str) -> String {
        format!("{collection}.jsonl")
    }

    fn append_journal(&self, collection: &str, entry: &JournalEntry) -> StoreResult<()> {
        let path = self.journal_dir.join(Self::journal_path(collection));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn upsert_cache_row(&self, collection: &str, entry: &JournalEntry) -> StoreResult<()> {
        let indexed_json = serde_json::to_string(&entry.indexed)?;
        self.conn.execute(
            "INSERT INTO records (collection, id, version, updated_at, data, indexed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(collection, id) DO UPDATE SET
                version = excluded.version,
                updated_at = excluded.updated_at,
                data = excluded.data,
                indexed = excluded.indexed",
            params![
                collection,
                entry.id,
                entry.version as i64,
                entry.updated_at,
                entry.data.to_string(),
                indexed_json,
            ],
        )?;
        Ok(())
    }

    /// Create a new record. Fails with [`StoreError::Conflict`] if the id
    /// already exists in this collection.
    pub fn create<T: Record>(&self, record: T) -> StoreResult<String> {
        let collection = T::collection_name();
        let id = record.id().to_string();

        if self.raw_get(collection, &id)?.is_some() {
            return Err(StoreError::Conflict {
                id,
                expected: 0,
                actual: 1,
            });
        }

        let entry = JournalEntry {
            id: id.clone(),
            version: 1,
            updated_at: now_ms(),
            data: serde_json::to_value(&record)?,
            indexed: record
                .indexed_fields()
                .iter()
                .map(|(k, v)| (k.clone(), SerializableIndexValue::from(v)))
                .collect(),
        };

        self.append_journal(collection, &entry)?;
        self.upsert_cache_row(collection, &entry)?;
        Ok(id)
    }

    fn raw_get(&self, collection: &str, id: &str) -> StoreResult<Option<(u64, serde_json::Value)>> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT version, data FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((version, data)) => Ok(Some((version as u64, serde_json::from_str(&data)?))),
            None => Ok(None),
        }
    }

    /// Fetch a record by id, along with the row version updates must
    /// supply to succeed.
    pub fn get<T: Record>(&self, id: &str) -> StoreResult<Option<Stored<T>>> {
        let collection = T::collection_name();
        match self.raw_get(collection, id)? {
            None => Ok(None),
            Some((version, data)) => {
                let value: T = serde_json::from_value(data)?;
                Ok(Some(Stored { value, version }))
            }
        }
    }

    pub fn get_required<T: Record>(&self, id: &str) -> StoreResult<Stored<T>> {
        self.get(id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Update a record under optimistic concurrency: the caller supplies
    /// the version it last observed. A mismatch returns
    /// [`StoreError::Conflict`] and performs no write (spec.md §4.1).
    pub fn update<T: Record>(&self, record: T, expected_version: u64) -> StoreResult<u64> {
        let collection = T::collection_name();
        let id = record.id().to_string();

        let current = self
            .raw_get(collection, &id)?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if current.0 != expected_version {
            return Err(StoreError::Conflict {
                id,
                expected: expected_version,
                actual: current.0,
            });
        }

        let new_version = current.0 + 1;
        let entry = JournalEntry {
            id: id.clone(),
            version: new_version,
            updated_at: now_ms(),
            data: serde_json::to_value(&record)?,
            indexed: record
                .indexed_fields()
                .iter()
                .map(|(k, v)| (k.clone(), SerializableIndexValue::from(v)))
                .collect(),
        };

        self.append_journal(collection, &entry)?;
        self.upsert_cache_row(collection, &entry)?;
        Ok(new_version)
    }

    /// List every record in a collection matching every filter (AND).
    pub fn list<T: Record>(&self, filters: &[Filter]) -> StoreResult<Vec<Stored<T>>> {
        let collection = T::collection_name();
        let mut stmt = self
            .conn
            .prepare("SELECT version, data, indexed FROM records WHERE collection = ?1")?;
        let rows = stmt.query_map(params![collection], |row| {
            let version: i64 = row.get(0)?;
            let data: String = row.get(1)?;
            let indexed: String = row.get(2)?;
            Ok((version as u64, data, indexed))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (version, data, indexed) = row?;
            let indexed: HashMap<String, SerializableIndexValue> = serde_json::from_str(&indexed)?;
            let indexed: HashMap<String, IndexValue> = indexed.into_iter().map(|(k, v)| (k, v.into())).collect();

            if !filters_match(filters, &indexed) {
                continue;
            }

            let value: T = serde_json::from_str(&data)?;
            out.push(Stored { value, version });
        }

        Ok(out)
    }

    /// Hard-delete a record. Reserved for explicit administrative action —
    /// the workflow itself never deletes (blocks retire to `archived`).
    pub fn admin_delete<T: Record>(&self, id: &str) -> StoreResult<()> {
        let collection = T::collection_name();
        self.conn
            .execute("DELETE FROM records WHERE collection = ?1 AND id = ?2", params![collection, id])?;
        Ok(())
    }

    /// Rebuild the SQLite cache for one collection by replaying its
    /// journal from scratch. Used on startup to repair any drift left by
    /// a crash between the journal append and the cache upsert.
    pub fn sync_collection(&self, collection: &str) -> StoreResult<usize> {
        let path = self.journal_dir.join(Self::journal_path(collection));
        if !path.exists() {
            return Ok(0);
        }

        self.conn
            .execute("DELETE FROM records WHERE collection = ?1", params![collection])?;

        let file = fs::File::open(&path)?;
        let reader = BufReader::new(file);
        let mut latest: HashMap<String, JournalEntry> = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(&line) {
                Ok(entry) => {
                    latest
                        .entry(entry.id.clone())
                        .and_modify(|existing| {
                            if entry.version > existing.version {
                                *existing = clone_entry(&entry);
                            }
                        })
                        .or_insert(entry);
                }
                Err(e) => warn!(collection, error = %e, "skipping unreadable journal line"),
            }
        }

        let count = latest.len();
        for entry in latest.values() {
            self.upsert_cache_row(collection, entry)?;
        }

        debug!(collection, count, "synced collection from journal");
        Ok(count)
    }
}

fn clone_entry(entry: &JournalEntry) -> JournalEntry {
    JournalEntry {
        id: entry.id.clone(),
        version: entry.version,
        updated_at: entry.updated_at,
        data: entry.data.clone(),
        indexed: entry.indexed.clone(),
    }
}
