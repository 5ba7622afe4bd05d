// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use primitives::{
    PartitionSignature, ReceiptSignature, Signature, Transaction,
    TransactionType,
};

/// One transaction-in-block unit: the transaction plus the signatures the
/// envelope carried for it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub transaction: Transaction,
    pub signatures: Vec<Signature>,
    /// Set for work the engine generated itself (genesis, forwarded
    /// transactions, the synthetic drain). Internal user transactions
    /// skip signature collection.
    pub internal: bool,
}

impl Delivery {
    pub fn new(transaction: Transaction, signatures: Vec<Signature>) -> Delivery {
        Delivery { transaction, signatures, internal: false }
    }

    pub fn internal(transaction: Transaction) -> Delivery {
        Delivery { transaction, signatures: Vec::new(), internal: true }
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction.transaction_type()
    }

    /// The sequencing signature of a synthetic or anchor envelope.
    pub fn sequence(&self) -> Option<&PartitionSignature> {
        self.signatures.iter().find_map(|s| match s {
            Signature::Partition(p) => Some(p),
            _ => None,
        })
    }

    /// The receipt signature carrying a synthetic transaction's proof.
    pub fn receipt(&self) -> Option<&ReceiptSignature> {
        self.signatures.iter().find_map(|s| match s {
            Signature::Receipt(r) => Some(r),
            _ => None,
        })
    }

    /// Signatures that need cryptographic processing and recording
    /// against signers: everything except the sequencing envelope parts.
    pub fn key_signatures(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter().filter(|s| {
            !matches!(
                s,
                Signature::Partition(_)
                    | Signature::Receipt(_)
                    | Signature::Internal(_)
            )
        })
    }
}
