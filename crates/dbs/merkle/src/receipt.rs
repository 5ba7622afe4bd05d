// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{sha256_concat, Hash};

/// One step of an inclusion proof: the sibling hash and which side of the
/// running value it sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptEntry {
    /// True when the sibling is the right input of the parent node.
    pub right: bool,
    pub hash: Hash,
}

/// A Merkle inclusion proof from `start` to `anchor`. Receipts compose:
/// an entry proves into its chain root, the chain root into the account's
/// root chain, the root chain into the partition anchor a peer partition
/// has recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub start: Hash,
    pub entries: Vec<ReceiptEntry>,
    pub anchor: Hash,
}

impl Receipt {
    /// Folds the proof steps over `start` and checks the result against
    /// `anchor`.
    pub fn validate(&self) -> bool { self.fold() == self.anchor }

    pub fn fold(&self) -> Hash {
        let mut current = self.start;
        for step in &self.entries {
            current = if step.right {
                sha256_concat(current.as_bytes(), step.hash.as_bytes())
            } else {
                sha256_concat(step.hash.as_bytes(), current.as_bytes())
            };
        }
        current
    }

    /// Joins this receipt with one that starts at this receipt's anchor.
    /// Returns None when the two do not connect.
    pub fn combine(&self, other: &Receipt) -> Option<Receipt> {
        if self.anchor != other.start {
            return None;
        }
        let mut entries = self.entries.clone();
        entries.extend_from_slice(&other.entries);
        Some(Receipt { start: self.start, entries, anchor: other.anchor })
    }
}

impl Encodable for ReceiptEntry {
    fn append(&self, w: &mut Writer) {
        w.write_bool(1, self.right);
        w.write_hash(2, &self.hash);
    }
}

impl Decodable for ReceiptEntry {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(ReceiptEntry { right: r.read_bool(1)?, hash: r.read_hash(2)? })
    }
}

impl Encodable for Receipt {
    fn append(&self, w: &mut Writer) {
        w.write_hash(1, &self.start);
        w.write_values(2, &self.entries);
        w.write_hash(3, &self.anchor);
    }
}

impl Decodable for Receipt {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(Receipt {
            start: r.read_hash(1)?,
            entries: r.read_values(2)?,
            anchor: r.read_hash(3)?,
        })
    }
}

/// Builds a receipt proving `entries[index]` under the anchor of the whole
/// list, following the same association as the accumulator: the split is
/// always the largest power of two below the length, and an absent right
/// sibling adds no step.
pub fn build_receipt(entries: &[Hash], index: usize) -> Receipt {
    debug_assert!(index < entries.len());
    let mut steps = Vec::new();
    let anchor = walk(entries, index, &mut steps);
    Receipt { start: entries[index], entries: steps, anchor }
}

fn walk(entries: &[Hash], index: usize, steps: &mut Vec<ReceiptEntry>) -> Hash {
    use crate::state::{anchor_of, largest_power_of_two_below};

    if entries.len() == 1 {
        return entries[0];
    }
    let split = largest_power_of_two_below(entries.len());
    if index < split {
        let left = walk(&entries[..split], index, steps);
        let right = anchor_of(&entries[split..]);
        steps.push(ReceiptEntry { right: true, hash: right });
        sha256_concat(left.as_bytes(), right.as_bytes())
    } else {
        let left = anchor_of(&entries[..split]);
        let right = walk(&entries[split..], index - split, steps);
        steps.push(ReceiptEntry { right: false, hash: left });
        sha256_concat(left.as_bytes(), right.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::anchor_of;
    use acd_types::sha256;

    fn entries(n: usize) -> Vec<Hash> {
        (0..n).map(|i| sha256(&[i as u8])).collect()
    }

    #[test]
    fn every_entry_proves() {
        for n in 1..24 {
            let list = entries(n);
            let anchor = anchor_of(&list);
            for i in 0..n {
                let receipt = build_receipt(&list, i);
                assert_eq!(receipt.start, list[i]);
                assert_eq!(receipt.anchor, anchor);
                assert!(receipt.validate(), "n = {}, i = {}", n, i);
            }
        }
    }

    #[test]
    fn tampered_step_fails() {
        let list = entries(9);
        let mut receipt = build_receipt(&list, 4);
        receipt.entries[0].hash = sha256(b"junk");
        assert!(!receipt.validate());
    }

    #[test]
    fn receipts_combine() {
        let inner = entries(5);
        let first = build_receipt(&inner, 2);
        // Treat the inner anchor as an entry of an outer chain.
        let mut outer = entries(3);
        outer[1] = first.anchor;
        let second = build_receipt(&outer, 1);
        let combined = first.combine(&second).unwrap();
        assert_eq!(combined.start, inner[2]);
        assert_eq!(combined.anchor, second.anchor);
        assert!(combined.validate());

        let disjoint = build_receipt(&entries(4), 0);
        assert!(first.combine(&disjoint).is_none());
    }

    #[test]
    fn codec_round_trip() {
        let receipt = build_receipt(&entries(11), 6);
        let bytes = acd_encoding::encode(&receipt);
        let decoded: Receipt = acd_encoding::decode(&bytes).unwrap();
        assert_eq!(decoded, receipt);
    }
}
