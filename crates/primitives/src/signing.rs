// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Signer accounts and per-signer signature sets.

use crate::{
    account::Account,
    key_page::KeyPage,
    signature::{
        signing_message, KeySignature, Signature, SignatureType,
    },
};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{parse_lite_identity, Hash, Url};
use ed25519_dalek::Signer as DalekSigner;

/// An account that can contribute signatures toward an authority.
pub trait Signer {
    fn signer_url(&self) -> &Url;
    fn signer_version(&self) -> u64;
    /// The M of "M of N" for this signer.
    fn signature_threshold(&self) -> u64;
    fn credit_balance(&self) -> u64;
    /// Debits credits; false when the balance is insufficient.
    fn debit_credits(&mut self, amount: u64) -> bool;
    fn credit_credits(&mut self, amount: u64);
    /// The key slot holding this key hash, if any.
    fn entry_index(&self, key_hash: &[u8]) -> Option<usize>;
    /// Advances the slot's replay watermark; false when the timestamp does
    /// not advance.
    fn update_last_used(&mut self, index: usize, timestamp: u64) -> bool;
}

impl Signer for KeyPage {
    fn signer_url(&self) -> &Url { &self.url }

    fn signer_version(&self) -> u64 { self.version }

    fn signature_threshold(&self) -> u64 { self.threshold() }

    fn credit_balance(&self) -> u64 { self.credit_balance }

    fn debit_credits(&mut self, amount: u64) -> bool {
        if self.credit_balance < amount {
            return false;
        }
        self.credit_balance -= amount;
        true
    }

    fn credit_credits(&mut self, amount: u64) {
        self.credit_balance = self.credit_balance.saturating_add(amount);
    }

    fn entry_index(&self, key_hash: &[u8]) -> Option<usize> {
        KeyPage::entry_index(self, key_hash)
    }

    fn update_last_used(&mut self, index: usize, timestamp: u64) -> bool {
        let entry = match self.keys.get_mut(index) {
            Some(entry) => entry,
            None => return false,
        };
        if timestamp <= entry.last_used {
            return false;
        }
        entry.last_used = timestamp;
        true
    }
}

impl Signer for crate::account::LiteIdentity {
    fn signer_url(&self) -> &Url { &self.url }

    fn signer_version(&self) -> u64 { 1 }

    fn signature_threshold(&self) -> u64 { 1 }

    fn credit_balance(&self) -> u64 { self.credit_balance }

    fn debit_credits(&mut self, amount: u64) -> bool {
        if self.credit_balance < amount {
            return false;
        }
        self.credit_balance -= amount;
        true
    }

    fn credit_credits(&mut self, amount: u64) {
        self.credit_balance = self.credit_balance.saturating_add(amount);
    }

    fn entry_index(&self, key_hash: &[u8]) -> Option<usize> {
        // The lite identity's sole key is baked into its URL.
        let own = parse_lite_identity(&self.url).ok()?;
        (key_hash.len() >= 20 && key_hash[..20] == own).then_some(0)
    }

    fn update_last_used(&mut self, _index: usize, timestamp: u64) -> bool {
        if timestamp <= self.last_used {
            return false;
        }
        self.last_used = timestamp;
        true
    }
}

impl Account {
    pub fn as_signer(&self) -> Option<&dyn Signer> {
        match self {
            Account::KeyPage(page) => Some(page),
            Account::LiteIdentity(lite) => Some(lite),
            _ => None,
        }
    }

    pub fn as_signer_mut(&mut self) -> Option<&mut dyn Signer> {
        match self {
            Account::KeyPage(page) => Some(page),
            Account::LiteIdentity(lite) => Some(lite),
            _ => None,
        }
    }
}

/// One recorded signature in a signer's set for a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigSetEntry {
    pub sig_type: u64,
    pub hash: Hash,
    /// The key slot the signature matched; entries dedup on this.
    pub key_index: u64,
}

impl Encodable for SigSetEntry {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.sig_type);
        w.write_hash(2, &self.hash);
        w.write_uint(3, self.key_index);
    }
}

impl Decodable for SigSetEntry {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SigSetEntry {
            sig_type: r.read_uint(1)?,
            hash: r.read_hash(2)?,
            key_index: r.read_uint(3)?,
        })
    }
}

/// The stored signature set of one signer for one transaction. The
/// version pins the signer version the set was collected against; a
/// signer update resets the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureSetData {
    pub version: u64,
    pub entries: Vec<SigSetEntry>,
}

impl SignatureSetData {
    /// Adds an entry, replacing any previous signature from the same key
    /// slot. Returns false when the entry was a duplicate slot with the
    /// same hash.
    pub fn add(&mut self, version: u64, entry: SigSetEntry) -> bool {
        if version != self.version {
            // Signer version changed; prior signatures are void.
            self.version = version;
            self.entries.clear();
        }
        if let Some(existing) =
            self.entries.iter_mut().find(|e| e.key_index == entry.key_index)
        {
            if *existing == entry {
                return false;
            }
            *existing = entry;
            return true;
        }
        self.entries.push(entry);
        self.entries.sort_by_key(|e| e.key_index);
        true
    }

    pub fn count(&self) -> usize { self.entries.len() }

    /// True when the set carries a pre-aggregated completion marker.
    pub fn has_set_marker(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.sig_type == SignatureType::Set.code())
    }
}

impl Encodable for SignatureSetData {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.version);
        w.write_values(2, &self.entries);
    }
}

impl Decodable for SignatureSetData {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SignatureSetData {
            version: r.read_uint(1)?,
            entries: r.read_values(2)?,
        })
    }
}

/// Builds an ED25519 signature over a transaction hash, filling in the
/// signature metadata and signing the bound message.
pub fn sign_ed25519(
    key: &ed25519_dalek::SigningKey, signer: Url, signer_version: u64,
    timestamp: u64, txn_hash: &Hash,
) -> Signature {
    let mut sig = Signature::ED25519(KeySignature {
        public_key: key.verifying_key().to_bytes().to_vec(),
        signature: Vec::new(),
        signer,
        signer_version,
        timestamp,
        transaction_hash: *txn_hash,
    });
    let message = signing_message(&sig.metadata_hash(), txn_hash);
    let raw = key.sign(message.as_bytes()).to_bytes().to_vec();
    if let Signature::ED25519(k) = &mut sig {
        k.signature = raw;
    }
    sig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_page::KeySpec;
    use acd_types::sha256;

    #[test]
    fn signature_set_dedups_by_key_slot() {
        let mut set = SignatureSetData::default();
        let entry = |slot: u64, seed: u8| SigSetEntry {
            sig_type: SignatureType::ED25519.code(),
            hash: sha256(&[seed]),
            key_index: slot,
        };
        assert!(set.add(1, entry(0, 1)));
        assert!(set.add(1, entry(1, 2)));
        // Same slot, same hash: refused.
        assert!(!set.add(1, entry(0, 1)));
        // Same slot, new hash: replaced, count unchanged.
        assert!(set.add(1, entry(0, 3)));
        assert_eq!(set.count(), 2);

        // A version bump voids collected signatures.
        assert!(set.add(2, entry(2, 4)));
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn key_page_thresholds_and_replay() {
        let mut page = KeyPage {
            url: Url::parse("acc://alice/book/1").unwrap(),
            credit_balance: 10,
            accept_threshold: 2,
            keys: vec![KeySpec {
                public_key_hash: vec![9; 32],
                delegate: None,
                last_used: 5,
            }],
            ..Default::default()
        };
        assert_eq!(Signer::signature_threshold(&page), 2);
        assert!(Signer::debit_credits(&mut page, 10));
        assert!(!Signer::debit_credits(&mut page, 1));
        assert!(!page.update_last_used(0, 5));
        assert!(page.update_last_used(0, 6));
    }
}
