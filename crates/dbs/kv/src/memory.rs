// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{KeyValueStore, KeyValueTxn, KvError, Result};
use acd_types::Hash;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory store. Transactions buffer writes and apply them under
/// the store lock on commit.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<Hash, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore { MemoryStore::default() }

    pub fn len(&self) -> usize { self.inner.read().len() }

    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }
}

impl KeyValueStore for MemoryStore {
    fn begin<'a>(&'a self, writable: bool) -> Box<dyn KeyValueTxn + 'a> {
        Box::new(MemoryTxn { store: self, writable, writes: BTreeMap::new() })
    }
}

struct MemoryTxn<'a> {
    store: &'a MemoryStore,
    writable: bool,
    // None marks a delete. BTreeMap keeps commit order deterministic.
    writes: BTreeMap<Hash, Option<Vec<u8>>>,
}

impl KeyValueTxn for MemoryTxn<'_> {
    fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.store.inner.read().get(key).cloned())
    }

    fn put(&mut self, key: Hash, value: Vec<u8>) -> Result<()> {
        if !self.writable {
            return Err(KvError::ReadOnly);
        }
        self.writes.insert(key, Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &Hash) -> Result<()> {
        if !self.writable {
            return Err(KvError::ReadOnly);
        }
        self.writes.insert(*key, None);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut inner = self.store.inner.write();
        for (key, value) in self.writes {
            match value {
                Some(value) => {
                    inner.insert(key, value);
                }
                None => {
                    inner.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn discard(self: Box<Self>) {}
}
