// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{Hash, Url};
use primitives::{Signature, Transaction};

/// Metadata describing one chain of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChainMetadata {
    pub name: String,
}

impl Encodable for ChainMetadata {
    fn append(&self, w: &mut Writer) {
        w.write_string(1, &self.name);
    }
}

impl Decodable for ChainMetadata {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(ChainMetadata { name: r.read_string(1)? })
    }
}

/// The stored body of a transaction record: a transaction, or for
/// remote-signature records just the signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SigOrTxn {
    pub transaction: Option<Transaction>,
    pub signature: Option<Signature>,
}

impl SigOrTxn {
    pub fn txn(transaction: Transaction) -> SigOrTxn {
        SigOrTxn { transaction: Some(transaction), signature: None }
    }
}

impl Encodable for SigOrTxn {
    fn append(&self, w: &mut Writer) {
        if let Some(txn) = &self.transaction {
            w.write_value(1, txn);
        }
        if let Some(sig) = &self.signature {
            w.write_value(2, sig);
        }
    }
}

impl Decodable for SigOrTxn {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SigOrTxn {
            transaction: r.read_value(1)?,
            signature: r.read_value(2)?,
        })
    }
}

/// Where a transaction landed: one entry per chain the transaction's hash
/// was appended to. Drives receipt resolution in the query engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransactionChainEntry {
    pub account: Url,
    pub chain: String,
    pub chain_index: u64,
    pub block_index: u64,
}

impl Encodable for TransactionChainEntry {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.account);
        w.write_string(2, &self.chain);
        w.write_uint(3, self.chain_index);
        w.write_uint(4, self.block_index);
    }
}

impl Decodable for TransactionChainEntry {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(TransactionChainEntry {
            account: r.read_required_url(1)?,
            chain: r.read_string(2)?,
            chain_index: r.read_uint(3)?,
            block_index: r.read_uint(4)?,
        })
    }
}

/// A chain touched during the current block. Collected by the batch and
/// drained at EndBlock to build the root chain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChainUpdate {
    pub account: Url,
    pub name: String,
}

/// Helpers for encoding plain hash values.
pub(crate) fn hash_value(hash: &Hash) -> Vec<u8> {
    hash.as_bytes().to_vec()
}

pub(crate) fn value_hash(bytes: &[u8]) -> Result<Hash, DecoderError> {
    Hash::from_slice(bytes).ok_or(DecoderError::InvalidValue(
        "hash",
        "value is not 32 bytes".to_string(),
    ))
}
