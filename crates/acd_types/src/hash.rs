// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte SHA-256 digest. Every chain entry, account ID, storage key and
/// anchor in Accord is one of these.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        if bytes.len() != 32 {
            return None;
        }
        let mut h = [0u8; 32];
        h.copy_from_slice(bytes);
        Some(Hash(h))
    }

    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }

    pub fn is_zero(&self) -> bool { self.0 == [0u8; 32] }

    /// The leading 8 bytes as a big-endian integer. Used for routing.
    pub fn prefix_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(buf)
    }

    /// Bit `i` of the digest, most significant first. Used by the BPT to
    /// walk the 256-bit key space.
    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < 256);
        self.0[i / 8] & (0x80 >> (i % 8)) != 0
    }

    pub fn to_hex(&self) -> String { hex::encode(self.0) }

    pub fn from_hex(s: &str) -> Option<Hash> {
        let bytes = hex::decode(s).ok()?;
        Hash::from_slice(&bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(h: [u8; 32]) -> Hash { Hash(h) }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

/// SHA-256 of a byte string.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// SHA-256 over the concatenation of two byte strings. This is the interior
/// node rule of every Merkle structure in the system.
pub fn sha256_concat(left: &[u8], right: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    Hash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_big_endian() {
        let mut raw = [0u8; 32];
        raw[0] = 0x01;
        raw[7] = 0x02;
        assert_eq!(Hash(raw).prefix_u64(), 0x0100_0000_0000_0002);
    }

    #[test]
    fn bits_walk_msb_first() {
        let mut raw = [0u8; 32];
        raw[0] = 0b1000_0001;
        let h = Hash(raw);
        assert!(h.bit(0));
        assert!(!h.bit(1));
        assert!(h.bit(7));
        assert!(!h.bit(8));
    }

    #[test]
    fn hex_round_trip() {
        let h = sha256(b"accord");
        assert_eq!(Hash::from_hex(&h.to_hex()), Some(h));
    }
}
