// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{sha256_concat, Hash};

/// The incremental Merkle accumulator at some chain height.
///
/// `pending[i]` holds the root of a complete subtree of 2^i entries that is
/// waiting for a right sibling; slot `i` is occupied exactly when bit `i`
/// of `count` is set, which is what makes the encoding below canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleState {
    count: u64,
    pending: Vec<Option<Hash>>,
}

impl MerkleState {
    pub fn new() -> MerkleState { MerkleState::default() }

    pub fn count(&self) -> u64 { self.count }

    /// Adds an entry, carrying complete subtrees upward exactly like binary
    /// addition: `SHA-256(left || right)` at every merge.
    pub fn add_entry(&mut self, entry: Hash) {
        let mut carry = entry;
        let mut level = 0;
        loop {
            if level == self.pending.len() {
                self.pending.push(None);
            }
            match self.pending[level].take() {
                None => {
                    self.pending[level] = Some(carry);
                    break;
                }
                Some(left) => {
                    carry = sha256_concat(left.as_bytes(), carry.as_bytes());
                    level += 1;
                }
            }
        }
        self.count += 1;
    }

    /// The accumulator root. When a level has no right sibling the lower
    /// root is propagated up unchanged, so the fold visits only occupied
    /// slots: each higher slot becomes the left input of the running root.
    pub fn anchor(&self) -> Hash {
        let mut root: Option<Hash> = None;
        for slot in self.pending.iter().flatten() {
            root = Some(match root {
                None => *slot,
                Some(right) => sha256_concat(slot.as_bytes(), right.as_bytes()),
            });
        }
        root.unwrap_or(Hash::ZERO)
    }
}

impl Encodable for MerkleState {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.count);
        w.write_hashes(2, self.pending.iter().flatten());
    }
}

impl Decodable for MerkleState {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        let count = r.read_uint(1)?;
        let hashes = r.read_hashes(2)?;
        // Occupied slots are the set bits of count, lowest first.
        let mut pending = Vec::new();
        let mut next = hashes.into_iter();
        for level in 0..64 {
            if count >> level == 0 {
                break;
            }
            if count >> level & 1 == 1 {
                let hash = next.next().ok_or(DecoderError::InvalidValue(
                    "merkle state",
                    "fewer pending hashes than set bits".into(),
                ))?;
                pending.push(Some(hash));
            } else {
                pending.push(None);
            }
        }
        if next.next().is_some() {
            return Err(DecoderError::InvalidValue(
                "merkle state",
                "more pending hashes than set bits".into(),
            ));
        }
        Ok(MerkleState { count, pending })
    }
}

/// Computes the anchor of a full entry list. Equivalent to feeding every
/// entry through [`MerkleState::add_entry`]; used by tests and receipts.
pub fn anchor_of(entries: &[Hash]) -> Hash {
    match entries.len() {
        0 => Hash::ZERO,
        1 => entries[0],
        n => {
            let split = largest_power_of_two_below(n);
            let left = anchor_of(&entries[..split]);
            let right = anchor_of(&entries[split..]);
            sha256_concat(left.as_bytes(), right.as_bytes())
        }
    }
}

pub(crate) fn largest_power_of_two_below(n: usize) -> usize {
    debug_assert!(n > 1);
    let mut p = 1;
    while p * 2 < n {
        p *= 2;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_types::sha256;

    fn entries(n: usize) -> Vec<Hash> {
        (0..n).map(|i| sha256(&[i as u8])).collect()
    }

    #[test]
    fn incremental_matches_recursive() {
        for n in 0..40 {
            let list = entries(n);
            let mut state = MerkleState::new();
            for e in &list {
                state.add_entry(*e);
            }
            assert_eq!(state.count(), n as u64);
            assert_eq!(state.anchor(), anchor_of(&list), "n = {}", n);
        }
    }

    #[test]
    fn absent_sibling_propagates() {
        // Three entries: anchor = H(H(a || b) || c), c unpadded.
        let list = entries(3);
        let inner = sha256_concat(list[0].as_bytes(), list[1].as_bytes());
        let expect = sha256_concat(inner.as_bytes(), list[2].as_bytes());
        assert_eq!(anchor_of(&list), expect);
    }

    #[test]
    fn codec_round_trip() {
        for n in [0usize, 1, 2, 3, 7, 8, 21] {
            let mut state = MerkleState::new();
            for e in entries(n) {
                state.add_entry(e);
            }
            let bytes = acd_encoding::encode(&state);
            let decoded: MerkleState = acd_encoding::decode(&bytes).unwrap();
            assert_eq!(decoded, state);
            assert_eq!(acd_encoding::encode(&decoded), bytes);
        }
    }
}
