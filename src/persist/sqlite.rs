//! SQLite-backed append-only audit journal sink.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    entry::{ENTRY_FORMAT_VERSION, StoredEntry, StoredEntryEnvelope},
    types::EntrySeq,
};

use super::{EntrySink, PersistError, PersistResult};

/// SQLite implementation of [`crate::persist::EntrySink`].
///
/// The journal is an audit trail of history transitions; actions hold
/// closures, so stored entries are loaded for inspection, never replay.
pub struct SqliteEntrySink {
    conn: Connection,
}

impl SqliteEntrySink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Loads entries strictly after `seq`, oldest first.
    pub fn load_entries_after(&self, seq: EntrySeq) -> PersistResult<Vec<StoredEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, ts_ms, payload FROM entries WHERE seq > ?1 ORDER BY seq ASC")?;

        let rows = stmt.query_map(params![seq as i64], |row| {
            let seq: i64 = row.get(0)?;
            let ts_ms: i64 = row.get(1)?;
            let payload: Vec<u8> = row.get(2)?;
            let mut stored = decode_stored_entry_payload(&payload).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    payload.len(),
                    rusqlite::types::Type::Blob,
                    Box::new(std::io::Error::other(err)),
                )
            })?;
            stored.seq = seq as EntrySeq;
            stored.ts_ms = ts_ms as u64;
            Ok(stored)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Returns the latest sequence persisted in the entries table.
    pub fn latest_seq(&self) -> PersistResult<EntrySeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM entries", [], |row| row.get(0))
            .optional()?;
        Ok(seq.unwrap_or(0) as EntrySeq)
    }
}

impl EntrySink for SqliteEntrySink {
    fn append_entries(&mut self, entries: &[StoredEntry]) -> PersistResult<EntrySeq> {
        if entries.is_empty() {
            return self.latest_seq();
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries(seq, ts_ms, kind, action_id, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for stored in entries {
                let payload = serde_json::to_vec(&StoredEntryEnvelope::new(stored.clone()))?;
                stmt.execute(params![
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    stored.entry.kind(),
                    stored.entry.action_id().map(|v| v as i64),
                    payload,
                ])?;
            }
        }
        tx.commit()?;

        Ok(entries.last().map(|e| e.seq).unwrap_or(0))
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn decode_stored_entry_payload(payload: &[u8]) -> Result<StoredEntry, String> {
    let env: StoredEntryEnvelope =
        serde_json::from_slice(payload).map_err(|err| err.to_string())?;
    if env.format_version != ENTRY_FORMAT_VERSION {
        return Err(format!(
            "unsupported entry format version {}",
            env.format_version
        ));
    }
    Ok(env.stored)
}
