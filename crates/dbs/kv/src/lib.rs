// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The key-value store contract the database layer runs on. Keys are
//! opaque 32-byte digests. Two implementations with identical semantics:
//! an in-memory store for tests and light nodes, and an append-only
//! log-file store for persistence.

mod log_store;
mod memory;

pub use self::{log_store::LogStore, memory::MemoryStore};

use acd_types::Hash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("transaction is read-only")]
    ReadOnly,
    #[error("transaction already finished")]
    Finished,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store is corrupt: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, KvError>;

/// A store that hands out transactions.
pub trait KeyValueStore: Send + Sync {
    fn begin<'a>(&'a self, writable: bool) -> Box<dyn KeyValueTxn + 'a>;
}

/// One transaction. Writes are buffered until `commit`; `discard` drops
/// them and is always safe to call, including after a commit.
pub trait KeyValueTxn {
    fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, key: Hash, value: Vec<u8>) -> Result<()>;
    fn delete(&mut self, key: &Hash) -> Result<()>;
    fn commit(self: Box<Self>) -> Result<()>;
    fn discard(self: Box<Self>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_types::sha256;

    fn key(i: u8) -> Hash { sha256(&[i]) }

    /// Both implementations must satisfy exactly these semantics.
    fn check_contract(store: &dyn KeyValueStore) {
        // Uncommitted writes are invisible to other transactions.
        let mut txn = store.begin(true);
        txn.put(key(1), b"one".to_vec()).unwrap();
        assert_eq!(txn.get(&key(1)).unwrap().as_deref(), Some(&b"one"[..]));
        let reader = store.begin(false);
        assert_eq!(reader.get(&key(1)).unwrap(), None);
        reader.discard();
        txn.commit().unwrap();

        // Committed writes are visible.
        let reader = store.begin(false);
        assert_eq!(reader.get(&key(1)).unwrap().as_deref(), Some(&b"one"[..]));
        reader.discard();

        // Read-only transactions reject writes.
        let mut reader = store.begin(false);
        assert!(matches!(
            reader.put(key(2), b"x".to_vec()),
            Err(KvError::ReadOnly)
        ));
        assert!(matches!(reader.delete(&key(1)), Err(KvError::ReadOnly)));
        reader.discard();

        // Deletes apply on commit; discarded writes never land.
        let mut txn = store.begin(true);
        txn.delete(&key(1)).unwrap();
        assert_eq!(txn.get(&key(1)).unwrap(), None);
        txn.commit().unwrap();

        let mut txn = store.begin(true);
        txn.put(key(3), b"dropped".to_vec()).unwrap();
        txn.discard();

        let reader = store.begin(false);
        assert_eq!(reader.get(&key(1)).unwrap(), None);
        assert_eq!(reader.get(&key(3)).unwrap(), None);
        reader.discard();

        // Overwrites keep the latest value.
        let mut txn = store.begin(true);
        txn.put(key(4), b"a".to_vec()).unwrap();
        txn.put(key(4), b"b".to_vec()).unwrap();
        txn.commit().unwrap();
        let reader = store.begin(false);
        assert_eq!(reader.get(&key(4)).unwrap().as_deref(), Some(&b"b"[..]));
        reader.discard();
    }

    #[test]
    fn memory_store_contract() {
        check_contract(&MemoryStore::new());
    }

    #[test]
    fn log_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path().join("accord.log")).unwrap();
        check_contract(&store);
    }

    #[test]
    fn log_store_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accord.log");
        {
            let store = LogStore::open(&path).unwrap();
            let mut txn = store.begin(true);
            txn.put(key(1), b"persisted".to_vec()).unwrap();
            txn.put(key(2), b"doomed".to_vec()).unwrap();
            txn.commit().unwrap();
            let mut txn = store.begin(true);
            txn.delete(&key(2)).unwrap();
            txn.commit().unwrap();
        }
        let store = LogStore::open(&path).unwrap();
        let reader = store.begin(false);
        assert_eq!(
            reader.get(&key(1)).unwrap().as_deref(),
            Some(&b"persisted"[..])
        );
        assert_eq!(reader.get(&key(2)).unwrap(), None);
        reader.discard();
    }
}
