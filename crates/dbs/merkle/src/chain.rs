// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    errors::MerkleError,
    receipt::{build_receipt, Receipt},
    state::MerkleState,
    Result,
};
use acd_types::Hash;

/// Addresses one stored component of a chain. The database maps these onto
/// record keys under the owning account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainKey {
    /// The accumulator at the current height.
    Head,
    /// The entry hash at an index.
    Element(u64),
    /// The index of an entry hash.
    ElementIndex(Hash),
    /// The accumulator snapshot taken right after an index was added.
    State(u64),
}

/// Chain persistence, implemented by the database batch.
pub trait ChainStore {
    fn chain_get(&mut self, key: &ChainKey) -> Result<Option<Vec<u8>>>;
    fn chain_put(&mut self, key: &ChainKey, value: Vec<u8>) -> Result<()>;
}

/// An append-only Merkle chain of 32-byte entries.
pub struct Chain<'a, S: ChainStore> {
    store: &'a mut S,
    head: MerkleState,
    /// Unique chains (anchor chains) ignore re-appends of a known entry.
    unique: bool,
}

impl<'a, S: ChainStore> Chain<'a, S> {
    pub fn open(store: &'a mut S, unique: bool) -> Result<Chain<'a, S>> {
        let head = match store.chain_get(&ChainKey::Head)? {
            Some(bytes) => acd_encoding::decode(&bytes)?,
            None => MerkleState::new(),
        };
        Ok(Chain { store, head, unique })
    }

    pub fn height(&self) -> u64 { self.head.count() }

    pub fn anchor(&self) -> Hash { self.head.anchor() }

    pub fn head(&self) -> &MerkleState { &self.head }

    pub fn add_entry(&mut self, entry: Hash) -> Result<()> {
        if self.unique && self.height_of(&entry)?.is_some() {
            return Ok(());
        }
        let index = self.head.count();
        self.head.add_entry(entry);
        self.store
            .chain_put(&ChainKey::Element(index), entry.as_bytes().to_vec())?;
        self.store.chain_put(
            &ChainKey::ElementIndex(entry),
            index.to_be_bytes().to_vec(),
        )?;
        self.store.chain_put(
            &ChainKey::State(index),
            acd_encoding::encode(&self.head),
        )?;
        self.store
            .chain_put(&ChainKey::Head, acd_encoding::encode(&self.head))
    }

    pub fn entry(&mut self, index: u64) -> Result<Hash> {
        if index >= self.head.count() {
            return Err(MerkleError::EntryOutOfRange(index, self.head.count()));
        }
        let bytes = self
            .store
            .chain_get(&ChainKey::Element(index))?
            .ok_or(MerkleError::EntryOutOfRange(index, self.head.count()))?;
        Hash::from_slice(&bytes)
            .ok_or_else(|| MerkleError::Store("chain entry is not 32 bytes".into()))
    }

    /// Entries in `[start, end)`, clamped to the chain height.
    pub fn entries(&mut self, start: u64, end: u64) -> Result<Vec<Hash>> {
        let end = end.min(self.head.count());
        let mut out = Vec::new();
        for i in start..end {
            out.push(self.entry(i)?);
        }
        Ok(out)
    }

    pub fn height_of(&mut self, entry: &Hash) -> Result<Option<u64>> {
        let bytes = match self.store.chain_get(&ChainKey::ElementIndex(*entry))? {
            None => return Ok(None),
            Some(b) => b,
        };
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| MerkleError::Store("chain index is not 8 bytes".into()))?;
        Ok(Some(u64::from_be_bytes(raw)))
    }

    /// The accumulator as it stood immediately after `index` was appended.
    pub fn state_at(&mut self, index: u64) -> Result<MerkleState> {
        if index >= self.head.count() {
            return Err(MerkleError::EntryOutOfRange(index, self.head.count()));
        }
        let bytes = self
            .store
            .chain_get(&ChainKey::State(index))?
            .ok_or(MerkleError::EntryOutOfRange(index, self.head.count()))?;
        Ok(acd_encoding::decode(&bytes)?)
    }

    /// The anchor of the chain as of `height` (the accumulator over entries
    /// `0..=height`).
    pub fn anchor_at(&mut self, height: u64) -> Result<Hash> {
        Ok(self.state_at(height)?.anchor())
    }

    /// Proves the entry at `index` under the anchor at `anchor_height`.
    pub fn receipt(&mut self, index: u64, anchor_height: u64) -> Result<Receipt> {
        if index > anchor_height || anchor_height >= self.head.count() {
            return Err(MerkleError::BadReceiptRange {
                from: index,
                to: anchor_height,
            });
        }
        let entries = self.entries(0, anchor_height + 1)?;
        Ok(build_receipt(&entries, index as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_types::sha256;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemStore(HashMap<Vec<u8>, Vec<u8>>);

    fn raw_key(key: &ChainKey) -> Vec<u8> {
        match key {
            ChainKey::Head => b"head".to_vec(),
            ChainKey::Element(i) => {
                [b"elem".as_slice(), &i.to_be_bytes()].concat()
            }
            ChainKey::ElementIndex(h) => {
                [b"index".as_slice(), h.as_bytes()].concat()
            }
            ChainKey::State(i) => {
                [b"state".as_slice(), &i.to_be_bytes()].concat()
            }
        }
    }

    impl ChainStore for MemStore {
        fn chain_get(&mut self, key: &ChainKey) -> Result<Option<Vec<u8>>> {
            Ok(self.0.get(&raw_key(key)).cloned())
        }

        fn chain_put(&mut self, key: &ChainKey, value: Vec<u8>) -> Result<()> {
            self.0.insert(raw_key(key), value);
            Ok(())
        }
    }

    fn hashes(n: usize) -> Vec<Hash> {
        (0..n).map(|i| sha256(&[i as u8, 7])).collect()
    }

    #[test]
    fn append_and_look_up() {
        let mut store = MemStore::default();
        let mut chain = Chain::open(&mut store, false).unwrap();
        for h in hashes(9) {
            chain.add_entry(h).unwrap();
        }
        assert_eq!(chain.height(), 9);
        assert_eq!(chain.entry(4).unwrap(), hashes(9)[4]);
        assert_eq!(chain.height_of(&hashes(9)[7]).unwrap(), Some(7));
        assert_eq!(chain.height_of(&sha256(b"absent")).unwrap(), None);
        assert!(chain.entry(9).is_err());
    }

    #[test]
    fn head_survives_reopen() {
        let mut store = MemStore::default();
        {
            let mut chain = Chain::open(&mut store, false).unwrap();
            for h in hashes(5) {
                chain.add_entry(h).unwrap();
            }
        }
        let mut chain = Chain::open(&mut store, false).unwrap();
        assert_eq!(chain.height(), 5);
        assert_eq!(chain.state_at(4).unwrap().anchor(), chain.anchor());
    }

    #[test]
    fn unique_chain_skips_duplicates() {
        let mut store = MemStore::default();
        let mut chain = Chain::open(&mut store, true).unwrap();
        let h = sha256(b"anchor");
        chain.add_entry(h).unwrap();
        chain.add_entry(h).unwrap();
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn receipts_prove_across_heights() {
        let mut store = MemStore::default();
        let mut chain = Chain::open(&mut store, false).unwrap();
        let list = hashes(12);
        for h in &list {
            chain.add_entry(*h).unwrap();
        }
        // Prove entry 3 under the anchor as of height 7.
        let receipt = chain.receipt(3, 7).unwrap();
        assert_eq!(receipt.start, list[3]);
        assert_eq!(receipt.anchor, chain.anchor_at(7).unwrap());
        assert!(receipt.validate());
        assert!(chain.receipt(8, 7).is_err());
    }
}
