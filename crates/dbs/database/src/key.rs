// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::write_uvarint;
use acd_types::{sha256, Hash, TxId, Url};

/// One component of a structured record key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    String(String),
    Hash(Hash),
    U64(u64),
    Url(Url),
    TxId(TxId),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> KeyPart { KeyPart::String(s.to_string()) }
}

impl From<Hash> for KeyPart {
    fn from(h: Hash) -> KeyPart { KeyPart::Hash(h) }
}

impl From<u64> for KeyPart {
    fn from(v: u64) -> KeyPart { KeyPart::U64(v) }
}

impl From<&Url> for KeyPart {
    fn from(u: &Url) -> KeyPart { KeyPart::Url(u.clone()) }
}

impl From<&TxId> for KeyPart {
    fn from(t: &TxId) -> KeyPart { KeyPart::TxId(t.clone()) }
}

/// A structured record path, e.g. `("Account", url, "Main")`. The storage
/// key is the SHA-256 of the canonically encoded tuple; the structure
/// never needs to be recovered from the digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordKey(Vec<KeyPart>);

impl RecordKey {
    pub fn new() -> RecordKey { RecordKey::default() }

    pub fn append(mut self, part: impl Into<KeyPart>) -> RecordKey {
        self.0.push(part.into());
        self
    }

    /// The 32-byte storage key. Each part is tagged and length-framed so
    /// distinct tuples can never collide pre-hash.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::new();
        for part in &self.0 {
            match part {
                KeyPart::String(s) => {
                    buf.push(1);
                    write_uvarint(&mut buf, s.len() as u64);
                    buf.extend_from_slice(s.as_bytes());
                }
                KeyPart::Hash(h) => {
                    buf.push(2);
                    buf.extend_from_slice(h.as_bytes());
                }
                KeyPart::U64(v) => {
                    buf.push(3);
                    buf.extend_from_slice(&v.to_be_bytes());
                }
                KeyPart::Url(u) => {
                    let s = u.to_string();
                    buf.push(4);
                    write_uvarint(&mut buf, s.len() as u64);
                    buf.extend_from_slice(s.as_bytes());
                }
                KeyPart::TxId(t) => {
                    let s = t.to_string();
                    buf.push(5);
                    write_uvarint(&mut buf, s.len() as u64);
                    buf.extend_from_slice(s.as_bytes());
                }
            }
        }
        sha256(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_and_distinct() {
        let url = Url::parse("acc://alice/tokens").unwrap();
        let a = RecordKey::new().append("Account").append(&url).append("Main");
        let b = RecordKey::new().append("Account").append(&url).append("Main");
        assert_eq!(a.hash(), b.hash());

        let c =
            RecordKey::new().append("Account").append(&url).append("Pending");
        assert_ne!(a.hash(), c.hash());

        // Same rendered text, different structure.
        let joined = RecordKey::new().append("AccountMain");
        let split = RecordKey::new().append("Account").append("Main");
        assert_ne!(joined.hash(), split.hash());
    }

    #[test]
    fn numeric_parts_do_not_collide_with_strings() {
        let n = RecordKey::new().append(7u64);
        let s = RecordKey::new().append("7");
        assert_ne!(n.hash(), s.hash());
    }
}
