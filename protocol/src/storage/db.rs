//! # VaultDb: Persistent Storage Engine
//!
//! sled-backed persistence for a vault node. Everything lives in a single
//! tree so that one `Batch` covers every write of an operation:
//!
//! | Key                     | Value                      |
//! |-------------------------|----------------------------|
//! | `snapshot`              | `bincode(snapshot)`        |
//! | `event/` + seq (8B BE)  | `bincode(event record)`    |
//!
//! Sequence numbers are stored big-endian so sled's lexicographic order is
//! numeric order and a range scan from `event/<n>` yields events in commit
//! order.
//!
//! The store is generic over what it persists. The engine decides the
//! snapshot and event types; this module only guarantees that a snapshot
//! and the events that produced it land together or not at all.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Batch, Db, Tree};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const VAULT_TREE: &str = "vault";
const SNAPSHOT_KEY: &[u8] = b"snapshot";
const EVENT_PREFIX: &[u8] = b"event/";

fn event_key(seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(EVENT_PREFIX.len() + 8);
    key.extend_from_slice(EVENT_PREFIX);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// VaultDb
// ---------------------------------------------------------------------------

/// Persistent store for engine snapshots and the committed event log.
///
/// Cheap to clone; clones share the same underlying sled handle.
#[derive(Debug, Clone)]
pub struct VaultDb {
    db: Db,
    vault: Tree,
}

impl VaultDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that lives in memory and disappears on drop. For tests.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let vault = db.open_tree(VAULT_TREE)?;
        debug!(recovered = db.was_recovered(), "vault store opened");
        Ok(Self { db, vault })
    }

    /// Atomically replace the snapshot and append `events`, each keyed by
    /// its sequence number, then flush.
    ///
    /// # Errors
    ///
    /// Serialization failures are reported before anything is written.
    pub fn commit<S, E>(&self, snapshot: &S, events: &[(u64, E)]) -> DbResult<()>
    where
        S: Serialize,
        E: Serialize,
    {
        let mut batch = Batch::default();
        batch.insert(SNAPSHOT_KEY, encode(snapshot)?);
        for (seq, event) in events {
            batch.insert(event_key(*seq), encode(event)?);
        }
        self.vault.apply_batch(batch)?;
        self.db.flush()?;
        trace!(events = events.len(), "snapshot committed");
        Ok(())
    }

    /// The most recently committed snapshot, if any.
    pub fn load_snapshot<S: DeserializeOwned>(&self) -> DbResult<Option<S>> {
        match self.vault.get(SNAPSHOT_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` events with sequence number `>= from_seq`, in order.
    pub fn events_from<E: DeserializeOwned>(&self, from_seq: u64, limit: usize) -> DbResult<Vec<E>> {
        let start = event_key(from_seq);
        let mut events = Vec::new();
        for result in self.vault.range(start..).take(limit) {
            let (key, value) = result?;
            if !key.starts_with(EVENT_PREFIX) {
                break;
            }
            events.push(decode(&value)?);
        }
        Ok(events)
    }

    /// Sequence number of the newest logged event.
    pub fn last_event_seq(&self) -> DbResult<Option<u64>> {
        let Some(result) = self.vault.scan_prefix(EVENT_PREFIX).next_back() else {
            return Ok(None);
        };
        let (key, _) = result?;
        let raw: [u8; 8] = key[EVENT_PREFIX.len()..]
            .try_into()
            .map_err(|_| DbError::Serialization("invalid event key".to_string()))?;
        Ok(Some(u64::from_be_bytes(raw)))
    }

    /// Number of logged events.
    pub fn event_count(&self) -> usize {
        self.vault.scan_prefix(EVENT_PREFIX).count()
    }

    /// Force pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snap {
        total: u128,
        owner: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ev {
        seq: u64,
        amount: u128,
    }

    fn ev(seq: u64) -> (u64, Ev) {
        (seq, Ev { seq, amount: seq as u128 * 10 })
    }

    #[test]
    fn open_temporary_database_is_empty() {
        let db = VaultDb::open_temporary().expect("should create temp db");
        assert!(db.load_snapshot::<Snap>().unwrap().is_none());
        assert_eq!(db.event_count(), 0);
        assert_eq!(db.last_event_seq().unwrap(), None);
    }

    #[test]
    fn commit_stores_snapshot_and_events() {
        let db = VaultDb::open_temporary().unwrap();
        let snap = Snap {
            total: 5,
            owner: "alice".into(),
        };
        db.commit(&snap, &[ev(1), ev(2)]).unwrap();

        assert_eq!(db.load_snapshot::<Snap>().unwrap(), Some(snap));
        let events: Vec<Ev> = db.events_from(0, 10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].amount, 20);
        assert_eq!(db.last_event_seq().unwrap(), Some(2));
    }

    #[test]
    fn later_commit_replaces_snapshot_and_appends() {
        let db = VaultDb::open_temporary().unwrap();
        let first = Snap {
            total: 1,
            owner: "a".into(),
        };
        let second = Snap {
            total: 2,
            owner: "b".into(),
        };
        db.commit(&first, &[ev(1)]).unwrap();
        db.commit(&second, &[ev(2), ev(3)]).unwrap();

        assert_eq!(db.load_snapshot::<Snap>().unwrap(), Some(second));
        assert_eq!(db.event_count(), 3);
    }

    #[test]
    fn events_are_ordered_numerically() {
        let db = VaultDb::open_temporary().unwrap();
        let snap = Snap {
            total: 0,
            owner: String::new(),
        };
        // 256 sorts before 3 as a decimal string but not as big-endian bytes.
        db.commit(&snap, &[ev(256), ev(3), ev(1)]).unwrap();

        let seqs: Vec<u64> = db
            .events_from::<Ev>(0, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.seq)
            .collect();
        assert_eq!(seqs, vec![1, 3, 256]);
    }

    #[test]
    fn events_from_respects_start_and_limit() {
        let db = VaultDb::open_temporary().unwrap();
        let snap = Snap {
            total: 0,
            owner: String::new(),
        };
        let events: Vec<(u64, Ev)> = (1..=10).map(ev).collect();
        db.commit(&snap, &events).unwrap();

        let page: Vec<Ev> = db.events_from(4, 3).unwrap();
        assert_eq!(page.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![4, 5, 6]);
        assert!(db.events_from::<Ev>(11, 10).unwrap().is_empty());
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let snap = Snap {
            total: 42,
            owner: "owner".into(),
        };
        {
            let db = VaultDb::open(dir.path()).expect("should open db");
            db.commit(&snap, &[ev(1)]).unwrap();
        }

        let db = VaultDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db.load_snapshot::<Snap>().unwrap(), Some(snap));
        assert_eq!(db.last_event_seq().unwrap(), Some(1));
    }
}
