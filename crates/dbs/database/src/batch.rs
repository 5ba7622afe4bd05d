// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    errors::{DbError, DbResult},
    key::RecordKey,
    records::account_state_hash,
    types::ChainUpdate,
};
use acd_encoding::{Decodable, Encodable};
use acd_kv::{KeyValueStore, KeyValueTxn};
use acd_merkle::{Bpt, BptStore, MerkleError};
use acd_types::{Hash, Url};
use std::collections::{BTreeMap, BTreeSet};

/// The database: a KV store plus the record model on top of it.
pub struct Database<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Database<S> {
    pub fn new(store: S) -> Database<S> { Database { store } }

    pub fn store(&self) -> &S { &self.store }

    /// Opens a root batch over a fresh KV transaction.
    pub fn begin(&self, writable: bool) -> Batch<'_> {
        Batch {
            parent: Parent::Kv(self.store.begin(writable)),
            writable,
            done: false,
            cache: BTreeMap::new(),
            dirty_accounts: BTreeSet::new(),
            chain_updates: Vec::new(),
        }
    }
}

enum Parent<'a> {
    Kv(Box<dyn KeyValueTxn + 'a>),
    Batch(&'a mut dyn RecordStore),
}

/// The view a child batch has of its parent.
pub(crate) trait RecordStore {
    fn get_raw(&self, key: &Hash) -> DbResult<Option<Vec<u8>>>;
    fn stage_raw(&mut self, key: Hash, value: Option<Vec<u8>>) -> DbResult<()>;
    fn mark_account_dirty(&mut self, url: &Url);
    fn push_chain_update(&mut self, update: ChainUpdate);
}

/// A scoped view of the database. Writes stage into an in-memory cache;
/// `commit` folds a child into its parent, or for the root batch refreshes
/// the BPT and pushes every record to the KV transaction in sorted key
/// order. Dropping a batch discards it.
pub struct Batch<'a> {
    parent: Parent<'a>,
    writable: bool,
    done: bool,
    // None marks a delete.
    cache: BTreeMap<Hash, Option<Vec<u8>>>,
    dirty_accounts: BTreeSet<Url>,
    chain_updates: Vec<ChainUpdate>,
}

impl RecordStore for Batch<'_> {
    fn get_raw(&self, key: &Hash) -> DbResult<Option<Vec<u8>>> {
        if let Some(staged) = self.cache.get(key) {
            return Ok(staged.clone());
        }
        match &self.parent {
            Parent::Kv(txn) => Ok(txn.get(key)?),
            Parent::Batch(parent) => parent.get_raw(key),
        }
    }

    fn stage_raw(&mut self, key: Hash, value: Option<Vec<u8>>) -> DbResult<()> {
        if !self.writable {
            return Err(DbError::ReadOnly);
        }
        if self.done {
            return Err(DbError::Done);
        }
        self.cache.insert(key, value);
        Ok(())
    }

    fn mark_account_dirty(&mut self, url: &Url) {
        self.dirty_accounts.insert(url.clone());
    }

    fn push_chain_update(&mut self, update: ChainUpdate) {
        if !self.chain_updates.contains(&update) {
            self.chain_updates.push(update);
        }
    }
}

impl<'a> Batch<'a> {
    /// Opens a child batch. The child sees this batch's staged records and
    /// folds into it on commit; this batch is unusable until the child is
    /// committed or dropped.
    pub fn begin(&mut self) -> Batch<'_> {
        Batch {
            writable: self.writable,
            parent: Parent::Batch(self),
            done: false,
            cache: BTreeMap::new(),
            dirty_accounts: BTreeSet::new(),
            chain_updates: Vec::new(),
        }
    }

    pub fn writable(&self) -> bool { self.writable }

    pub(crate) fn get_record<T: Decodable>(
        &self, key: &RecordKey,
    ) -> DbResult<Option<T>> {
        match self.get_raw(&key.hash())? {
            None => Ok(None),
            Some(bytes) => Ok(Some(acd_encoding::decode(&bytes)?)),
        }
    }

    pub(crate) fn put_record<T: Encodable + ?Sized>(
        &mut self, key: &RecordKey, value: &T,
    ) -> DbResult<()> {
        self.stage_raw(key.hash(), Some(acd_encoding::encode(value)))
    }

    pub(crate) fn get_raw_record(
        &self, key: &RecordKey,
    ) -> DbResult<Option<Vec<u8>>> {
        self.get_raw(&key.hash())
    }

    pub(crate) fn put_raw_record(
        &mut self, key: &RecordKey, value: Vec<u8>,
    ) -> DbResult<()> {
        self.stage_raw(key.hash(), Some(value))
    }

    pub(crate) fn delete_record(&mut self, key: &RecordKey) -> DbResult<()> {
        self.stage_raw(key.hash(), None)
    }

    pub(crate) fn note_account_dirty(&mut self, url: &Url) {
        self.mark_account_dirty(url);
    }

    pub(crate) fn note_chain_update(&mut self, update: ChainUpdate) {
        self.push_chain_update(update);
    }

    /// Chains touched since the last drain. The block runner drains this
    /// at EndBlock to build the root chain.
    pub fn take_chain_updates(&mut self) -> Vec<ChainUpdate> {
        let mut updates = std::mem::take(&mut self.chain_updates);
        updates.sort();
        updates
    }

    /// Commits this batch. A child folds into its parent; the root batch
    /// refreshes BPT entries for dirty accounts, then commits the KV
    /// transaction. Returns the BPT root for a root batch.
    pub fn commit(mut self) -> DbResult<Option<Hash>> {
        if self.done {
            return Err(DbError::Done);
        }
        self.done = true;

        match self.parent {
            Parent::Batch(_) => {
                let cache = std::mem::take(&mut self.cache);
                let dirty = std::mem::take(&mut self.dirty_accounts);
                let updates = std::mem::take(&mut self.chain_updates);
                let Parent::Batch(parent) = &mut self.parent else {
                    unreachable!("matched above");
                };
                for (key, value) in cache {
                    parent.stage_raw(key, value)?;
                }
                for url in &dirty {
                    parent.mark_account_dirty(url);
                }
                for update in updates {
                    parent.push_chain_update(update);
                }
                Ok(None)
            }
            Parent::Kv(_) => {
                let root = if self.writable {
                    Some(self.refresh_bpt()?)
                } else {
                    None
                };
                let cache = std::mem::take(&mut self.cache);
                let Parent::Kv(mut txn) =
                    std::mem::replace(&mut self.parent, Parent::Kv(NullTxn::boxed()))
                else {
                    unreachable!("matched above");
                };
                for (key, value) in cache {
                    match value {
                        Some(value) => txn.put(key, value)?,
                        None => txn.delete(&key)?,
                    }
                }
                txn.commit()?;
                Ok(root)
            }
        }
    }

    /// Recomputes the BPT entry of every dirty account and returns the
    /// new root. Called on root commit; also usable to compute the root
    /// mid-block.
    pub fn refresh_bpt(&mut self) -> DbResult<Hash> {
        let dirty: Vec<Url> = self.dirty_accounts.iter().cloned().collect();
        let mut entries = Vec::with_capacity(dirty.len());
        for url in &dirty {
            let state = account_state_hash(self, url)?;
            // Index the URL by its state hash so snapshot export can walk
            // BPT leaves back to accounts.
            self.put_raw_record(
                &RecordKey::new().append("StateHash").append(state),
                url.to_string().into_bytes(),
            )?;
            entries.push((url.account_id(), state));
        }
        self.dirty_accounts.clear();

        let mut store = BatchBptStore { batch: self };
        let mut bpt = Bpt::new(&mut store);
        for (key, value) in entries {
            bpt.insert(key, value)?;
        }
        Ok(bpt.update()?)
    }

    /// Raw access to a record by structured key, for records owned by
    /// higher layers (block indexes and the like).
    pub fn read_raw(&self, key: &RecordKey) -> DbResult<Option<Vec<u8>>> {
        self.get_raw_record(key)
    }

    pub fn write_raw(
        &mut self, key: &RecordKey, value: Vec<u8>,
    ) -> DbResult<()> {
        self.put_raw_record(key, value)
    }

    /// Resolves a BPT leaf value back to its account URL.
    pub fn account_url_by_state(
        &self, state_hash: &Hash,
    ) -> DbResult<Option<Url>> {
        let key = RecordKey::new().append("StateHash").append(*state_hash);
        match self.get_raw_record(&key)? {
            None => Ok(None),
            Some(bytes) => {
                let s = String::from_utf8(bytes).map_err(|_| {
                    DbError::Codec(acd_encoding::DecoderError::BadUtf8)
                })?;
                Ok(Some(Url::parse(&s).map_err(|e| {
                    DbError::Codec(acd_encoding::DecoderError::InvalidValue(
                        "url",
                        e.to_string(),
                    ))
                })?))
            }
        }
    }

    /// The current BPT root, without recomputing dirty entries.
    pub fn bpt_root(&mut self) -> DbResult<Hash> {
        let mut store = BatchBptStore { batch: self };
        Ok(Bpt::new(&mut store).root_hash()?)
    }

    /// BPT leaves in key order, for snapshot export.
    pub fn bpt_range(
        &mut self, start: &Hash, window: usize,
    ) -> DbResult<Vec<(Hash, Hash)>> {
        let mut store = BatchBptStore { batch: self };
        Ok(Bpt::new(&mut store).get_range(start, window)?)
    }
}

/// Maps BPT node storage onto batch records.
struct BatchBptStore<'b, 'a> {
    batch: &'b mut Batch<'a>,
}

fn bpt_key(node_key: &Hash) -> RecordKey {
    RecordKey::new().append("BPT").append(*node_key)
}

impl BptStore for BatchBptStore<'_, '_> {
    fn bpt_get(&mut self, node_key: &Hash) -> acd_merkle::Result<Option<Vec<u8>>> {
        self.batch
            .get_raw_record(&bpt_key(node_key))
            .map_err(|e| MerkleError::Store(e.to_string()))
    }

    fn bpt_put(
        &mut self, node_key: &Hash, value: Vec<u8>,
    ) -> acd_merkle::Result<()> {
        self.batch
            .put_raw_record(&bpt_key(node_key), value)
            .map_err(|e| MerkleError::Store(e.to_string()))
    }
}

/// Stand-in transaction used only while deconstructing a batch.
struct NullTxn;

impl NullTxn {
    fn boxed() -> Box<dyn KeyValueTxn + 'static> { Box::new(NullTxn) }
}

impl KeyValueTxn for NullTxn {
    fn get(&self, _key: &Hash) -> acd_kv::Result<Option<Vec<u8>>> { Ok(None) }

    fn put(&mut self, _key: Hash, _value: Vec<u8>) -> acd_kv::Result<()> {
        Err(acd_kv::KvError::Finished)
    }

    fn delete(&mut self, _key: &Hash) -> acd_kv::Result<()> {
        Err(acd_kv::KvError::Finished)
    }

    fn commit(self: Box<Self>) -> acd_kv::Result<()> {
        Err(acd_kv::KvError::Finished)
    }

    fn discard(self: Box<Self>) {}
}
