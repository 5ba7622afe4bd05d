// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Signature variants. Key signatures carry a public key and are verified
//! cryptographically; receipt and partition signatures carry the proof
//! material a synthetic transaction needs; the remaining variants are
//! structural markers used by the signature-collection machinery.

use acd_encoding::{
    write_uvarint, Decodable, DecoderError, Encodable, Reader, Writer,
};
use acd_merkle::Receipt;
use acd_types::{sha256, sha256_concat, Hash, Url};
use ed25519_dalek::Verifier;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use sha3::{Digest, Keccak256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    Unknown,
    LegacyED25519,
    ED25519,
    RCD1,
    Receipt,
    Partition,
    Set,
    Remote,
    BTC,
    BTCLegacy,
    ETH,
    Delegated,
    Internal,
}

impl SignatureType {
    pub fn code(self) -> u64 {
        match self {
            SignatureType::Unknown => 0,
            SignatureType::LegacyED25519 => 1,
            SignatureType::ED25519 => 2,
            SignatureType::RCD1 => 3,
            SignatureType::Receipt => 4,
            SignatureType::Partition => 5,
            SignatureType::Set => 6,
            SignatureType::Remote => 7,
            SignatureType::BTC => 8,
            SignatureType::BTCLegacy => 9,
            SignatureType::ETH => 10,
            SignatureType::Delegated => 11,
            SignatureType::Internal => 12,
        }
    }

    pub fn from_code(code: u64) -> Option<SignatureType> {
        Some(match code {
            0 => SignatureType::Unknown,
            1 => SignatureType::LegacyED25519,
            2 => SignatureType::ED25519,
            3 => SignatureType::RCD1,
            4 => SignatureType::Receipt,
            5 => SignatureType::Partition,
            6 => SignatureType::Set,
            7 => SignatureType::Remote,
            8 => SignatureType::BTC,
            9 => SignatureType::BTCLegacy,
            10 => SignatureType::ETH,
            11 => SignatureType::Delegated,
            12 => SignatureType::Internal,
            _ => return None,
        })
    }
}

/// The common shape of every cryptographic key signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySignature {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub signer: Url,
    pub signer_version: u64,
    pub timestamp: u64,
    pub transaction_hash: Hash,
}

impl KeySignature {
    fn append_body(&self, w: &mut Writer) {
        w.write_bytes(2, &self.public_key);
        w.write_bytes(3, &self.signature);
        w.write_url(4, &self.signer);
        w.write_uint(5, self.signer_version);
        w.write_uint(6, self.timestamp);
        w.write_hash(7, &self.transaction_hash);
    }

    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(KeySignature {
            public_key: r.read_bytes(2)?,
            signature: r.read_bytes(3)?,
            signer: r.read_required_url(4)?,
            signer_version: r.read_uint(5)?,
            timestamp: r.read_uint(6)?,
            transaction_hash: r.read_hash(7)?,
        })
    }
}

/// A Merkle inclusion proof standing in as the "signature" of a synthetic
/// transaction: its fold must land on an anchor the destination has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptSignature {
    pub source_network: Url,
    pub proof: Receipt,
    pub transaction_hash: Hash,
}

/// The sequencing envelope of a synthetic or anchor transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSignature {
    pub source_network: Url,
    pub destination_network: Url,
    pub sequence_number: u64,
    pub transaction_hash: Hash,
}

/// A pre-aggregated completion marker for a signer: recorded when another
/// partition has already collected this signer's threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureSet {
    pub signer: Url,
    pub transaction_hash: Hash,
    pub signatures: Vec<Signature>,
}

/// A signature collected on another partition, forwarded to the
/// principal's partition.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSignature {
    pub destination: Url,
    pub signature: Box<Signature>,
}

/// A signature produced under a delegation entry: the inner signature
/// counts for `delegator`'s slot once the inner signer is satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegatedSignature {
    pub signature: Box<Signature>,
    pub delegator: Url,
}

/// The engine's own mark on transactions it generates locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternalSignature {
    pub network: Url,
    pub transaction_hash: Hash,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    LegacyED25519(KeySignature),
    ED25519(KeySignature),
    RCD1(KeySignature),
    BTC(KeySignature),
    BTCLegacy(KeySignature),
    ETH(KeySignature),
    Receipt(ReceiptSignature),
    Partition(PartitionSignature),
    Set(SignatureSet),
    Remote(RemoteSignature),
    Delegated(DelegatedSignature),
    Internal(InternalSignature),
}

impl Signature {
    pub fn signature_type(&self) -> SignatureType {
        match self {
            Signature::LegacyED25519(_) => SignatureType::LegacyED25519,
            Signature::ED25519(_) => SignatureType::ED25519,
            Signature::RCD1(_) => SignatureType::RCD1,
            Signature::BTC(_) => SignatureType::BTC,
            Signature::BTCLegacy(_) => SignatureType::BTCLegacy,
            Signature::ETH(_) => SignatureType::ETH,
            Signature::Receipt(_) => SignatureType::Receipt,
            Signature::Partition(_) => SignatureType::Partition,
            Signature::Set(_) => SignatureType::Set,
            Signature::Remote(_) => SignatureType::Remote,
            Signature::Delegated(_) => SignatureType::Delegated,
            Signature::Internal(_) => SignatureType::Internal,
        }
    }

    pub fn key_signature(&self) -> Option<&KeySignature> {
        match self {
            Signature::LegacyED25519(k)
            | Signature::ED25519(k)
            | Signature::RCD1(k)
            | Signature::BTC(k)
            | Signature::BTCLegacy(k)
            | Signature::ETH(k) => Some(k),
            _ => None,
        }
    }

    /// The account that must satisfy its threshold for this signature to
    /// count.
    pub fn signer_url(&self) -> Option<&Url> {
        match self {
            Signature::Receipt(s) => Some(&s.source_network),
            Signature::Partition(s) => Some(&s.source_network),
            Signature::Set(s) => Some(&s.signer),
            Signature::Remote(s) => s.signature.signer_url(),
            Signature::Delegated(s) => s.signature.signer_url(),
            Signature::Internal(s) => Some(&s.network),
            _ => self.key_signature().map(|k| &k.signer),
        }
    }

    pub fn transaction_hash(&self) -> Option<Hash> {
        match self {
            Signature::Receipt(s) => Some(s.transaction_hash),
            Signature::Partition(s) => Some(s.transaction_hash),
            Signature::Set(s) => Some(s.transaction_hash),
            Signature::Remote(s) => s.signature.transaction_hash(),
            Signature::Delegated(s) => s.signature.transaction_hash(),
            Signature::Internal(s) => Some(s.transaction_hash),
            _ => self.key_signature().map(|k| k.transaction_hash),
        }
    }

    /// The hash of the key this signature was made with, per the key-hash
    /// rule of its type. This is what key-page slots store.
    pub fn key_hash(&self) -> Option<Vec<u8>> {
        match self {
            Signature::ED25519(k) | Signature::LegacyED25519(k) => {
                Some(sha256(&k.public_key).as_bytes().to_vec())
            }
            Signature::RCD1(k) => {
                let mut buf = Vec::with_capacity(1 + k.public_key.len());
                buf.push(0x01);
                buf.extend_from_slice(&k.public_key);
                Some(sha256(&buf).as_bytes().to_vec())
            }
            Signature::BTC(k) | Signature::BTCLegacy(k) => {
                let inner = sha256(&k.public_key);
                Some(sha256(inner.as_bytes()).as_bytes()[..20].to_vec())
            }
            Signature::ETH(k) => {
                let raw = if k.public_key.len() == 65 {
                    &k.public_key[1..]
                } else {
                    &k.public_key[..]
                };
                let digest = Keccak256::digest(raw);
                Some(digest[12..].to_vec())
            }
            Signature::Delegated(s) => s.signature.key_hash(),
            _ => None,
        }
    }

    /// The hash of this signature's metadata: the encoding with the
    /// signature bytes and the transaction hash blanked. The initiating
    /// signature's metadata hash is the transaction header's initiator
    /// hash, so it cannot depend on the transaction hash. A delegated
    /// signature inherits its inner signature's metadata for the same
    /// reason.
    pub fn metadata_hash(&self) -> Hash {
        if let Signature::Delegated(s) = self {
            return s.signature.metadata_hash();
        }
        if self.key_signature().is_none() {
            return self.hash();
        }
        let mut blank = self.clone();
        if let Signature::LegacyED25519(k)
        | Signature::ED25519(k)
        | Signature::RCD1(k)
        | Signature::BTC(k)
        | Signature::BTCLegacy(k)
        | Signature::ETH(k) = &mut blank
        {
            k.signature = Vec::new();
            k.transaction_hash = Hash::ZERO;
        }
        sha256(&acd_encoding::encode(&blank))
    }

    pub fn hash(&self) -> Hash { sha256(&acd_encoding::encode(self)) }

    /// Verifies this signature over a transaction hash.
    pub fn verify(&self, txn_hash: &Hash) -> bool {
        match self {
            Signature::ED25519(k) | Signature::RCD1(k) => {
                let message = signing_message(&self.metadata_hash(), txn_hash);
                verify_ed25519(k, message.as_bytes())
            }
            Signature::LegacyED25519(k) => {
                // The legacy scheme signs the timestamp varint and the raw
                // transaction hash.
                let mut message = Vec::with_capacity(10 + 32);
                write_uvarint(&mut message, k.timestamp);
                message.extend_from_slice(txn_hash.as_bytes());
                verify_ed25519(k, &message)
            }
            Signature::BTC(k) | Signature::BTCLegacy(k) | Signature::ETH(k) => {
                let message = signing_message(&self.metadata_hash(), txn_hash);
                verify_ecdsa(k, message.as_bytes())
            }
            Signature::Receipt(s) => {
                s.proof.validate() && s.proof.start == *txn_hash
            }
            Signature::Delegated(s) => s.signature.verify(txn_hash),
            // Structural variants carry no cryptographic material.
            Signature::Partition(_)
            | Signature::Set(_)
            | Signature::Remote(_)
            | Signature::Internal(_) => true,
        }
    }
}

/// The message a key signature signs: the signature metadata hash bound to
/// the transaction hash.
pub fn signing_message(metadata_hash: &Hash, txn_hash: &Hash) -> Hash {
    sha256_concat(metadata_hash.as_bytes(), txn_hash.as_bytes())
}

fn verify_ed25519(k: &KeySignature, message: &[u8]) -> bool {
    let key: [u8; 32] = match k.public_key.as_slice().try_into() {
        Ok(key) => key,
        Err(_) => return false,
    };
    let verifying_key = match ed25519_dalek::VerifyingKey::from_bytes(&key) {
        Ok(vk) => vk,
        Err(_) => return false,
    };
    let signature: [u8; 64] = match k.signature.as_slice().try_into() {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    verifying_key
        .verify(message, &ed25519_dalek::Signature::from_bytes(&signature))
        .is_ok()
}

fn verify_ecdsa(k: &KeySignature, prehash: &[u8]) -> bool {
    let verifying_key =
        match k256::ecdsa::VerifyingKey::from_sec1_bytes(&k.public_key) {
            Ok(vk) => vk,
            Err(_) => return false,
        };
    let signature = match k256::ecdsa::Signature::from_slice(&k.signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    verifying_key.verify_prehash(prehash, &signature).is_ok()
}

impl Encodable for Signature {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.signature_type().code());
        match self {
            Signature::LegacyED25519(k)
            | Signature::ED25519(k)
            | Signature::RCD1(k)
            | Signature::BTC(k)
            | Signature::BTCLegacy(k)
            | Signature::ETH(k) => k.append_body(w),
            Signature::Receipt(s) => {
                w.write_url(2, &s.source_network);
                w.write_value(3, &s.proof);
                w.write_hash(4, &s.transaction_hash);
            }
            Signature::Partition(s) => {
                w.write_url(2, &s.source_network);
                w.write_url(3, &s.destination_network);
                w.write_uint(4, s.sequence_number);
                w.write_hash(5, &s.transaction_hash);
            }
            Signature::Set(s) => {
                w.write_url(2, &s.signer);
                w.write_hash(3, &s.transaction_hash);
                w.write_values(4, &s.signatures);
            }
            Signature::Remote(s) => {
                w.write_url(2, &s.destination);
                w.write_value(3, s.signature.as_ref());
            }
            Signature::Delegated(s) => {
                w.write_value(2, s.signature.as_ref());
                w.write_url(3, &s.delegator);
            }
            Signature::Internal(s) => {
                w.write_url(2, &s.network);
                w.write_hash(3, &s.transaction_hash);
            }
        }
    }
}

impl Decodable for Signature {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        let code = r.read_uint(1)?;
        let typ = SignatureType::from_code(code)
            .ok_or(DecoderError::UnknownType("signature", code))?;
        Ok(match typ {
            SignatureType::Unknown => {
                return Err(DecoderError::UnknownType("signature", code));
            }
            SignatureType::LegacyED25519 => {
                Signature::LegacyED25519(KeySignature::decode_body(r)?)
            }
            SignatureType::ED25519 => {
                Signature::ED25519(KeySignature::decode_body(r)?)
            }
            SignatureType::RCD1 => {
                Signature::RCD1(KeySignature::decode_body(r)?)
            }
            SignatureType::BTC => Signature::BTC(KeySignature::decode_body(r)?),
            SignatureType::BTCLegacy => {
                Signature::BTCLegacy(KeySignature::decode_body(r)?)
            }
            SignatureType::ETH => Signature::ETH(KeySignature::decode_body(r)?),
            SignatureType::Receipt => Signature::Receipt(ReceiptSignature {
                source_network: r.read_required_url(2)?,
                proof: r.read_value(3)?.unwrap_or_default(),
                transaction_hash: r.read_hash(4)?,
            }),
            SignatureType::Partition => {
                Signature::Partition(PartitionSignature {
                    source_network: r.read_required_url(2)?,
                    destination_network: r.read_required_url(3)?,
                    sequence_number: r.read_uint(4)?,
                    transaction_hash: r.read_hash(5)?,
                })
            }
            SignatureType::Set => Signature::Set(SignatureSet {
                signer: r.read_required_url(2)?,
                transaction_hash: r.read_hash(3)?,
                signatures: r.read_values(4)?,
            }),
            SignatureType::Remote => Signature::Remote(RemoteSignature {
                destination: r.read_required_url(2)?,
                signature: Box::new(
                    r.read_value(3)?.ok_or(DecoderError::MissingField(3))?,
                ),
            }),
            SignatureType::Delegated => {
                Signature::Delegated(DelegatedSignature {
                    signature: Box::new(
                        r.read_value(2)?.ok_or(DecoderError::MissingField(2))?,
                    ),
                    delegator: r.read_required_url(3)?,
                })
            }
            SignatureType::Internal => Signature::Internal(InternalSignature {
                network: r.read_required_url(2)?,
                transaction_hash: r.read_hash(3)?,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::sign_ed25519;
    use acd_encoding::{decode, encode};
    use ed25519_dalek::SigningKey;

    fn keypair() -> SigningKey { SigningKey::from_bytes(&[7u8; 32]) }

    fn url(s: &str) -> Url { Url::parse(s).unwrap() }

    #[test]
    fn ed25519_signature_verifies() {
        let txn_hash = sha256(b"some transaction");
        let sig = sign_ed25519(
            &keypair(),
            url("acc://alice/book/1"),
            1,
            99,
            &txn_hash,
        );
        assert!(sig.verify(&txn_hash));
        assert!(!sig.verify(&sha256(b"a different transaction")));
    }

    #[test]
    fn tampered_metadata_fails_verification() {
        let txn_hash = sha256(b"tx");
        let sig =
            sign_ed25519(&keypair(), url("acc://alice/book/1"), 1, 99, &txn_hash);
        let mut tampered = sig.clone();
        if let Signature::ED25519(k) = &mut tampered {
            k.timestamp += 1;
        }
        assert!(!tampered.verify(&txn_hash));
    }

    #[test]
    fn metadata_hash_ignores_signature_bytes() {
        let txn_hash = sha256(b"tx");
        let sig =
            sign_ed25519(&keypair(), url("acc://alice/book/1"), 1, 99, &txn_hash);
        let mut blanked = sig.clone();
        if let Signature::ED25519(k) = &mut blanked {
            k.signature = vec![1, 2, 3];
        }
        assert_eq!(sig.metadata_hash(), blanked.metadata_hash());
        assert_ne!(sig.hash(), blanked.hash());
    }

    #[test]
    fn delegated_signatures_nest() {
        let txn_hash = sha256(b"tx");
        let inner =
            sign_ed25519(&keypair(), url("acc://ops/book/1"), 1, 4, &txn_hash);
        let delegated = Signature::Delegated(DelegatedSignature {
            signature: Box::new(inner.clone()),
            delegator: url("acc://alice/book/1"),
        });
        assert!(delegated.verify(&txn_hash));
        assert_eq!(delegated.key_hash(), inner.key_hash());
        assert_eq!(delegated.signer_url(), Some(&url("acc://ops/book/1")));
        // Delegation does not disturb the initiator binding.
        assert_eq!(delegated.metadata_hash(), inner.metadata_hash());

        let bytes = encode(&delegated);
        assert_eq!(decode::<Signature>(&bytes).unwrap(), delegated);
    }

    #[test]
    fn receipt_signature_checks_its_proof() {
        let entries: Vec<Hash> = (0..6u8).map(|i| sha256(&[i])).collect();
        let proof = acd_merkle::receipt::build_receipt(&entries, 2);
        let sig = Signature::Receipt(ReceiptSignature {
            source_network: url("acc://bvn-a.acme"),
            proof: proof.clone(),
            transaction_hash: entries[2],
        });
        assert!(sig.verify(&entries[2]));
        // The proof must start at the transaction being proven.
        assert!(!sig.verify(&entries[3]));
    }

    #[test]
    fn signatures_round_trip() {
        let txn_hash = sha256(b"tx");
        let samples = vec![
            sign_ed25519(&keypair(), url("acc://alice/book/1"), 3, 17, &txn_hash),
            Signature::Partition(PartitionSignature {
                source_network: url("acc://bvn-a.acme"),
                destination_network: url("acc://bvn-b.acme"),
                sequence_number: 4,
                transaction_hash: txn_hash,
            }),
            Signature::Internal(InternalSignature {
                network: url("acc://dn.acme"),
                transaction_hash: txn_hash,
            }),
            Signature::Set(SignatureSet {
                signer: url("acc://alice/book/1"),
                transaction_hash: txn_hash,
                signatures: Vec::new(),
            }),
        ];
        for sig in samples {
            let bytes = encode(&sig);
            let decoded: Signature = decode(&bytes).unwrap();
            assert_eq!(decoded, sig);
            assert_eq!(encode(&decoded), bytes);
        }
    }
}
