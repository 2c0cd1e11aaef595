pub mod sqlite;

use crate::{entry::StoredEntry, types::EntrySeq};

#[derive(Debug)]
pub enum PersistError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    Message(String),
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

pub trait EntrySink: Send {
    fn append_entries(&mut self, entries: &[StoredEntry]) -> PersistResult<EntrySeq>;
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
