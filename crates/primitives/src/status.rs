// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::errors::{Error, Status};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_merkle::Receipt;
use acd_types::{Hash, TxId, Url};

/// A typed executor result carried in the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult {
    Empty,
    WriteData { account: Url, entry_hash: Hash },
}

impl Default for TransactionResult {
    fn default() -> TransactionResult { TransactionResult::Empty }
}

impl Encodable for TransactionResult {
    fn append(&self, w: &mut Writer) {
        match self {
            TransactionResult::Empty => {
                w.write_uint(1, 1);
            }
            TransactionResult::WriteData { account, entry_hash } => {
                w.write_uint(1, 2);
                w.write_url(2, account);
                w.write_hash(3, entry_hash);
            }
        }
    }
}

impl Decodable for TransactionResult {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        match r.read_uint(1)? {
            1 => Ok(TransactionResult::Empty),
            2 => Ok(TransactionResult::WriteData {
                account: r.read_required_url(2)?,
                entry_hash: r.read_hash(3)?,
            }),
            code => Err(DecoderError::UnknownType("transaction result", code)),
        }
    }
}

/// The recorded status of a transaction. Transitions exactly once from
/// Pending to Delivered or a failure code, never back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionStatus {
    pub tx_id: Option<TxId>,
    pub code: Status,
    /// Set when this partition only holds signatures for the transaction.
    pub remote: bool,
    /// The metadata hash of the initiating signature, or for synthetic
    /// transactions the hash of the source's partition signature.
    pub initiator: Option<Url>,
    pub initiator_hash: Hash,
    /// Every signer that has contributed a valid signature, ordered.
    pub signers: Vec<Url>,
    pub message: String,
    pub result: Option<TransactionResult>,
    /// The block height this partition first recorded the transaction.
    pub received: u64,
    pub source_network: Option<Url>,
    pub destination_network: Option<Url>,
    pub sequence_number: u64,
    /// The receipt proving a synthetic transaction into its source block.
    pub proof: Option<Receipt>,
}

impl TransactionStatus {
    pub fn delivered(&self) -> bool { self.code == Status::Delivered }

    pub fn failed(&self) -> bool { self.code.is_failure() }

    pub fn pending(&self) -> bool { self.code == Status::Pending }

    /// Delivered or failed: the one-shot final states.
    pub fn executed(&self) -> bool { self.delivered() || self.failed() }

    pub fn set_failure(&mut self, err: &Error) {
        self.code = if err.code.is_failure() {
            err.code
        } else {
            Status::Unknown
        };
        self.message = err.message.clone();
    }

    /// Records a signer, keeping the list sorted and deduplicated.
    pub fn add_signer(&mut self, url: &Url) {
        if let Err(at) = self.signers.binary_search(url) {
            self.signers.insert(at, url.clone());
        }
    }

    /// The recorded signers governed by an authority.
    pub fn find_signers(&self, authority: &Url) -> Vec<Url> {
        self.signers
            .iter()
            .filter(|s| authority.prefix_of(s) || *s == authority)
            .cloned()
            .collect()
    }
}

impl Encodable for TransactionStatus {
    fn append(&self, w: &mut Writer) {
        if let Some(tx_id) = &self.tx_id {
            w.write_txid(1, tx_id);
        }
        w.write_uint(2, self.code.code());
        w.write_bool(3, self.remote);
        if let Some(initiator) = &self.initiator {
            w.write_url(4, initiator);
        }
        w.write_hash(5, &self.initiator_hash);
        w.write_urls(6, &self.signers);
        w.write_string(7, &self.message);
        if let Some(result) = &self.result {
            w.write_value(8, result);
        }
        w.write_uint(9, self.received);
        if let Some(source) = &self.source_network {
            w.write_url(10, source);
        }
        if let Some(destination) = &self.destination_network {
            w.write_url(11, destination);
        }
        w.write_uint(12, self.sequence_number);
        if let Some(proof) = &self.proof {
            w.write_value(13, proof);
        }
    }
}

impl Decodable for TransactionStatus {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(TransactionStatus {
            tx_id: r.read_txid(1)?,
            code: Status::from_code(r.read_uint(2)?),
            remote: r.read_bool(3)?,
            initiator: r.read_url(4)?,
            initiator_hash: r.read_hash(5)?,
            signers: r.read_urls(6)?,
            message: r.read_string(7)?,
            result: r.read_value(8)?,
            received: r.read_uint(9)?,
            source_network: r.read_url(10)?,
            destination_network: r.read_url(11)?,
            sequence_number: r.read_uint(12)?,
            proof: r.read_value(13)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_types::sha256;

    fn url(s: &str) -> Url { Url::parse(s).unwrap() }

    #[test]
    fn signer_lookup_respects_authority_prefix() {
        let mut status = TransactionStatus::default();
        status.add_signer(&url("acc://alice/book/1"));
        status.add_signer(&url("acc://alice/book/2"));
        status.add_signer(&url("acc://other/book/1"));
        status.add_signer(&url("acc://alice/book/1")); // duplicate

        assert_eq!(status.signers.len(), 3);
        let found = status.find_signers(&url("acc://alice/book"));
        assert_eq!(
            found,
            vec![url("acc://alice/book/1"), url("acc://alice/book/2")]
        );
    }

    #[test]
    fn status_round_trip() {
        let status = TransactionStatus {
            tx_id: Some(TxId::new(url("acc://alice/tokens"), sha256(b"t"))),
            code: Status::Pending,
            initiator: Some(url("acc://alice/book/1")),
            initiator_hash: sha256(b"init"),
            signers: vec![url("acc://alice/book/1")],
            received: 12,
            source_network: Some(url("acc://bvn-a.acme")),
            destination_network: Some(url("acc://bvn-b.acme")),
            sequence_number: 3,
            ..Default::default()
        };
        let bytes = acd_encoding::encode(&status);
        let decoded: TransactionStatus = acd_encoding::decode(&bytes).unwrap();
        assert_eq!(decoded, status);
        assert_eq!(acd_encoding::encode(&decoded), bytes);
    }
}
