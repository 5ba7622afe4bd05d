// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The binary Patricia tree: a sparse radix tree over the 256-bit space of
//! account IDs. Each leaf holds `(account ID, account state hash)`; the
//! root hash authenticates the entire account set of a partition and is
//! the app hash emitted on every block commit.

use crate::{errors::MerkleError, Result};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{sha256, sha256_concat, Hash};
use std::collections::{HashMap, HashSet};

/// Node persistence, implemented by the database batch. Node keys are
/// derived from tree paths, so the tree never needs a key scan.
pub trait BptStore {
    fn bpt_get(&mut self, node_key: &Hash) -> Result<Option<Vec<u8>>>;
    fn bpt_put(&mut self, node_key: &Hash, value: Vec<u8>) -> Result<()>;
}

/// A bit-string prefix addressing one node. The root is the empty path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct BitPath {
    len: u16,
    bits: [u8; 32],
}

impl BitPath {
    const ROOT: BitPath = BitPath { len: 0, bits: [0u8; 32] };

    fn child(&self, right: bool) -> BitPath {
        debug_assert!(self.len < 256);
        let mut next = *self;
        if right {
            next.bits[(self.len / 8) as usize] |= 0x80 >> (self.len % 8);
        }
        next.len += 1;
        next
    }

    fn parent(&self) -> Option<BitPath> {
        if self.len == 0 {
            return None;
        }
        let mut prev = *self;
        prev.len -= 1;
        prev.bits[(prev.len / 8) as usize] &= !(0x80 >> (prev.len % 8));
        Some(prev)
    }

    /// The largest key contained in this node's subtree: the prefix with
    /// every remaining bit set.
    fn max_key(&self) -> Hash {
        let mut raw = self.bits;
        for bit in self.len..256 {
            raw[(bit / 8) as usize] |= 0x80 >> (bit % 8);
        }
        Hash(raw)
    }

    fn node_key(&self) -> Hash {
        let used = (self.len as usize + 7) / 8;
        let mut buf = Vec::with_capacity(5 + used);
        buf.extend_from_slice(b"BPT");
        buf.extend_from_slice(&self.len.to_be_bytes());
        buf.extend_from_slice(&self.bits[..used]);
        sha256(&buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Leaf { key: Hash, value: Hash },
    Branch { left: Option<Hash>, right: Option<Hash> },
}

impl Node {
    /// The Merkle hash of this node. A branch with a single child
    /// propagates that child's hash unchanged, mirroring the chain rule.
    fn hash(&self) -> Hash {
        match self {
            Node::Leaf { key, value } => {
                sha256_concat(key.as_bytes(), value.as_bytes())
            }
            Node::Branch { left: Some(l), right: Some(r) } => {
                sha256_concat(l.as_bytes(), r.as_bytes())
            }
            Node::Branch { left: Some(l), right: None } => *l,
            Node::Branch { left: None, right: Some(r) } => *r,
            Node::Branch { left: None, right: None } => Hash::ZERO,
        }
    }
}

impl Encodable for Node {
    fn append(&self, w: &mut Writer) {
        match self {
            Node::Leaf { key, value } => {
                w.write_uint(1, 1);
                w.write_hash(2, key);
                w.write_hash(3, value);
            }
            Node::Branch { left, right } => {
                w.write_uint(1, 2);
                if let Some(l) = left {
                    w.write_hash(4, l);
                }
                if let Some(r) = right {
                    w.write_hash(5, r);
                }
            }
        }
    }
}

impl Decodable for Node {
    fn decode(
        r: &mut Reader<'_>,
    ) -> std::result::Result<Self, DecoderError> {
        match r.read_uint(1)? {
            1 => Ok(Node::Leaf { key: r.read_hash(2)?, value: r.read_hash(3)? }),
            2 => {
                let left = r.read_hash(4)?;
                let right = r.read_hash(5)?;
                Ok(Node::Branch {
                    left: (!left.is_zero()).then_some(left),
                    right: (!right.is_zero()).then_some(right),
                })
            }
            code => Err(DecoderError::UnknownType("bpt node", code)),
        }
    }
}

/// A live view of the tree over a store. Inserts stage changes in memory;
/// `update` recomputes dirty hashes bottom-up and persists them.
pub struct Bpt<'a, S: BptStore> {
    store: &'a mut S,
    cache: HashMap<BitPath, Option<Node>>,
    dirty: HashSet<BitPath>,
}

impl<'a, S: BptStore> Bpt<'a, S> {
    pub fn new(store: &'a mut S) -> Bpt<'a, S> {
        Bpt { store, cache: HashMap::new(), dirty: HashSet::new() }
    }

    fn load(&mut self, path: BitPath) -> Result<Option<Node>> {
        if let Some(node) = self.cache.get(&path) {
            return Ok(node.clone());
        }
        let node = match self.store.bpt_get(&path.node_key())? {
            None => None,
            Some(bytes) => Some(acd_encoding::decode::<Node>(&bytes)?),
        };
        self.cache.insert(path, node.clone());
        Ok(node)
    }

    fn stage(&mut self, path: BitPath, node: Node) {
        self.cache.insert(path, Some(node));
        self.dirty.insert(path);
    }

    /// Inserts or replaces the value for a key. The change is not
    /// observable through `root_hash` until `update` runs.
    pub fn insert(&mut self, key: Hash, value: Hash) -> Result<()> {
        let mut path = BitPath::ROOT;
        loop {
            match self.load(path)? {
                None => {
                    self.stage(path, Node::Leaf { key, value });
                    break;
                }
                Some(Node::Leaf { key: old_key, .. }) if old_key == key => {
                    self.stage(path, Node::Leaf { key, value });
                    break;
                }
                Some(Node::Leaf { key: old_key, value: old_value }) => {
                    // Push the resident leaf down until the keys diverge.
                    let mut at = path;
                    loop {
                        let new_bit = key.bit(at.len as usize);
                        let old_bit = old_key.bit(at.len as usize);
                        self.stage(at, Node::Branch { left: None, right: None });
                        if new_bit != old_bit {
                            self.stage(
                                at.child(new_bit),
                                Node::Leaf { key, value },
                            );
                            self.stage(
                                at.child(old_bit),
                                Node::Leaf { key: old_key, value: old_value },
                            );
                            break;
                        }
                        at = at.child(new_bit);
                    }
                    break;
                }
                Some(Node::Branch { .. }) => {
                    self.dirty.insert(path);
                    path = path.child(key.bit(path.len as usize));
                }
            }
        }
        Ok(())
    }

    pub fn get(&mut self, key: &Hash) -> Result<Option<Hash>> {
        let mut path = BitPath::ROOT;
        loop {
            match self.load(path)? {
                None => return Ok(None),
                Some(Node::Leaf { key: k, value }) => {
                    return Ok((k == *key).then_some(value));
                }
                Some(Node::Branch { .. }) => {
                    path = path.child(key.bit(path.len as usize));
                }
            }
        }
    }

    /// Recomputes every dirty hash bottom-up, persists the affected nodes,
    /// and returns the new root hash.
    pub fn update(&mut self) -> Result<Hash> {
        let mut paths: Vec<BitPath> = self.dirty.drain().collect();
        paths.sort_by(|a, b| b.len.cmp(&a.len).then(a.bits.cmp(&b.bits)));

        let mut computed: HashMap<BitPath, Hash> = HashMap::new();
        for path in paths {
            let mut node = match self.cache.get(&path).cloned().flatten() {
                Some(node) => node,
                None => continue,
            };
            if let Node::Branch { left, right } = &mut node {
                if let Some(h) = computed.get(&path.child(false)) {
                    *left = Some(*h);
                }
                if let Some(h) = computed.get(&path.child(true)) {
                    *right = Some(*h);
                }
            }
            let hash = node.hash();
            self.store
                .bpt_put(&path.node_key(), acd_encoding::encode(&node))?;
            self.cache.insert(path, Some(node));
            computed.insert(path, hash);
        }
        self.root_hash()
    }

    /// The current root hash. Zero for an empty tree.
    pub fn root_hash(&mut self) -> Result<Hash> {
        if !self.dirty.is_empty() {
            return Err(MerkleError::Store(
                "root hash requested with staged inserts; call update".into(),
            ));
        }
        Ok(self.load(BitPath::ROOT)?.map(|n| n.hash()).unwrap_or(Hash::ZERO))
    }

    /// Up to `window` leaves in key order, starting from the first key
    /// `>= start`. Used for snapshot export.
    pub fn get_range(
        &mut self, start: &Hash, window: usize,
    ) -> Result<Vec<(Hash, Hash)>> {
        let mut out = Vec::new();
        self.walk_range(BitPath::ROOT, start, window, &mut out)?;
        Ok(out)
    }

    fn walk_range(
        &mut self, path: BitPath, start: &Hash, window: usize,
        out: &mut Vec<(Hash, Hash)>,
    ) -> Result<()> {
        if out.len() == window || path.max_key() < *start {
            return Ok(());
        }
        match self.load(path)? {
            None => {}
            Some(Node::Leaf { key, value }) => {
                if key >= *start {
                    out.push((key, value));
                }
            }
            Some(Node::Branch { .. }) => {
                self.walk_range(path.child(false), start, window, out)?;
                self.walk_range(path.child(true), start, window, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[derive(Default)]
    struct MemStore(Map<Hash, Vec<u8>>);

    impl BptStore for MemStore {
        fn bpt_get(&mut self, key: &Hash) -> Result<Option<Vec<u8>>> {
            Ok(self.0.get(key).cloned())
        }

        fn bpt_put(&mut self, key: &Hash, value: Vec<u8>) -> Result<()> {
            self.0.insert(*key, value);
            Ok(())
        }
    }

    fn kv(i: u8) -> (Hash, Hash) {
        (sha256(&[i, 1]), sha256(&[i, 2]))
    }

    #[test]
    fn insert_get_update() {
        let mut store = MemStore::default();
        let mut bpt = Bpt::new(&mut store);
        for i in 0..50 {
            let (k, v) = kv(i);
            bpt.insert(k, v).unwrap();
        }
        let root = bpt.update().unwrap();
        assert!(!root.is_zero());
        for i in 0..50 {
            let (k, v) = kv(i);
            assert_eq!(bpt.get(&k).unwrap(), Some(v));
        }
        assert_eq!(bpt.get(&sha256(b"no such key")).unwrap(), None);
    }

    #[test]
    fn root_is_insertion_order_independent() {
        let mut forward = MemStore::default();
        let mut backward = MemStore::default();
        let mut a = Bpt::new(&mut forward);
        for i in 0..30 {
            let (k, v) = kv(i);
            a.insert(k, v).unwrap();
        }
        let root_a = a.update().unwrap();

        let mut b = Bpt::new(&mut backward);
        for i in (0..30).rev() {
            let (k, v) = kv(i);
            b.insert(k, v).unwrap();
        }
        assert_eq!(b.update().unwrap(), root_a);
    }

    #[test]
    fn update_changes_root_only_for_changed_values() {
        let mut store = MemStore::default();
        let mut bpt = Bpt::new(&mut store);
        for i in 0..10 {
            let (k, v) = kv(i);
            bpt.insert(k, v).unwrap();
        }
        let before = bpt.update().unwrap();

        // Re-inserting the same values keeps the root.
        let (k, v) = kv(3);
        bpt.insert(k, v).unwrap();
        assert_eq!(bpt.update().unwrap(), before);

        // A changed value moves it.
        bpt.insert(k, sha256(b"other state")).unwrap();
        assert_ne!(bpt.update().unwrap(), before);
    }

    #[test]
    fn state_survives_reopen() {
        let mut store = MemStore::default();
        let root = {
            let mut bpt = Bpt::new(&mut store);
            for i in 0..20 {
                let (k, v) = kv(i);
                bpt.insert(k, v).unwrap();
            }
            bpt.update().unwrap()
        };
        let mut bpt = Bpt::new(&mut store);
        assert_eq!(bpt.root_hash().unwrap(), root);
        let (k, v) = kv(11);
        assert_eq!(bpt.get(&k).unwrap(), Some(v));
    }

    #[test]
    fn range_walk_is_ordered_and_windowed() {
        let mut store = MemStore::default();
        let mut bpt = Bpt::new(&mut store);
        let mut pairs: Vec<(Hash, Hash)> = (0..40).map(kv).collect();
        for (k, v) in &pairs {
            bpt.insert(*k, *v).unwrap();
        }
        bpt.update().unwrap();
        pairs.sort();

        let all = bpt.get_range(&Hash::ZERO, usize::MAX).unwrap();
        assert_eq!(all, pairs);

        let first = bpt.get_range(&Hash::ZERO, 7).unwrap();
        assert_eq!(first, pairs[..7]);

        // Resume from the key after the last one returned.
        let mut resume = *first.last().unwrap().0.as_bytes();
        for byte in resume.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                break;
            }
        }
        let rest = bpt.get_range(&Hash(resume), usize::MAX).unwrap();
        assert_eq!(rest, pairs[7..]);
    }
}
