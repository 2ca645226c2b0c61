//! parley-store - Session persistence for parley
//!
//! A thin transactional layer over a single redb file. Two tables:
//! - `sessions`: session id → session JSON
//! - `state`: reserved keys; holds the `current` pointer as `session:<id>`
//!
//! The `sessions` table doubles as the enumeration index over all
//! session-scoped entries. Every operation runs in exactly one redb
//! transaction; there are no transactions spanning multiple operations.

mod error;

pub use error::StoreError;

use parley_core::Session;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;

const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
const STATE: TableDefinition<&str, &str> = TableDefinition::new("state");

/// Reserved key in the `state` table naming the current session.
const CURRENT_KEY: &str = "current";

/// Prefix carried by the current-pointer value. A single string carries both
/// the intent marker and the id; readers strip it before lookup.
const SESSION_PREFIX: &str = "session:";

fn db_err(e: impl Into<redb::Error>) -> StoreError {
    StoreError::Database(Box::new(e.into()))
}

/// Handle to the open backing file.
///
/// Exactly one handle per process invocation; the file is released when the
/// handle drops, on every exit path.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the backing file at `path`.
    ///
    /// Ensures both tables exist. Idempotent across repeated opens of the
    /// same location.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(db_err)?;

        let write_txn = db.begin_write().map_err(db_err)?;
        {
            let _ = write_txn.open_table(SESSIONS).map_err(db_err)?;
            let _ = write_txn.open_table(STATE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        Ok(Self { db })
    }

    /// Save a session (create or update) under its id, in one transaction.
    pub fn set_session(&self, id: &str, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_vec(session).map_err(StoreError::Serialization)?;

        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = write_txn.open_table(SESSIONS).map_err(db_err)?;
            table.insert(id, json.as_slice()).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        Ok(())
    }

    /// Load a session by id.
    ///
    /// A missing id is `NotFound`; an undecodable value is `Corrupted`. The
    /// two are distinct so callers can tell absence from damage.
    pub fn get_session(&self, id: &str) -> Result<Session, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(SESSIONS).map_err(db_err)?;

        match table.get(id).map_err(db_err)? {
            Some(data) => serde_json::from_slice(data.value())
                .map_err(|_| StoreError::Corrupted(id.to_string())),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// List all session ids in storage iteration order.
    pub fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(SESSIONS).map_err(db_err)?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (key, _) = entry.map_err(db_err)?;
            ids.push(key.value().to_string());
        }

        Ok(ids)
    }

    /// Delete a session. `NotFound` when no such id exists.
    pub fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let existed = {
            let mut table = write_txn.open_table(SESSIONS).map_err(db_err)?;
            table.remove(id).map_err(db_err)?.is_some()
        };
        write_txn.commit().map_err(db_err)?;

        if existed {
            Ok(())
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    /// Point the reserved `current` key at the given session id.
    pub fn set_current(&self, id: &str) -> Result<(), StoreError> {
        let value = format!("{SESSION_PREFIX}{id}");

        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = write_txn.open_table(STATE).map_err(db_err)?;
            table.insert(CURRENT_KEY, value.as_str()).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        Ok(())
    }

    /// Read the current-session pointer.
    ///
    /// `None` means the pointer has never been set; that is not an error.
    /// The pointed-to session may have been deleted since; callers find out
    /// at lookup time.
    pub fn current(&self) -> Result<Option<String>, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(STATE).map_err(db_err)?;

        match table.get(CURRENT_KEY).map_err(db_err)? {
            Some(value) => {
                let raw = value.value();
                let id = raw.strip_prefix(SESSION_PREFIX).unwrap_or(raw);
                Ok(Some(id.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Compact the backing file. Explicit maintenance only, never automatic.
    pub fn shrink(&mut self) -> Result<(), StoreError> {
        self.db.compact().map_err(db_err)?;
        Ok(())
    }

    /// Release the handle. Consuming, so a second close is unrepresentable;
    /// dropping without calling this releases the file just the same.
    pub fn close(self) {
        drop(self.db);
    }
}
