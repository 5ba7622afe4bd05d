// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Synthetic transaction bodies: produced by the engine as side effects
//! and delivered across partitions in sequence.

use crate::{account::Account, data::DataEntry, transaction::Transaction};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{Hash, Url};

/// Provenance carried by every synthetic transaction: the transaction that
/// caused it, the partition that produced it, and the refund route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticOrigin {
    pub cause: Hash,
    pub source: Url,
    pub initiator: Option<Url>,
    /// Credits to refund to the initiator if this transaction fails.
    pub fee_refund: u64,
}

impl Encodable for SyntheticOrigin {
    fn append(&self, w: &mut Writer) {
        w.write_hash(1, &self.cause);
        w.write_url(2, &self.source);
        if let Some(initiator) = &self.initiator {
            w.write_url(3, initiator);
        }
        w.write_uint(4, self.fee_refund);
    }
}

impl Decodable for SyntheticOrigin {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticOrigin {
            cause: r.read_hash(1)?,
            source: r.read_required_url(2)?,
            initiator: r.read_url(3)?,
            fee_refund: r.read_uint(4)?,
        })
    }
}

/// Creates accounts on the identity's home partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntheticCreateIdentity {
    pub origin: SyntheticOrigin,
    pub accounts: Vec<Account>,
}

impl SyntheticCreateIdentity {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.origin);
        w.write_values(3, &self.accounts);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticCreateIdentity {
            origin: r.read_value(2)?.unwrap_or_default(),
            accounts: r.read_values(3)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticWriteData {
    pub origin: SyntheticOrigin,
    pub entry: DataEntry,
}

impl SyntheticWriteData {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.origin);
        w.write_value(3, &self.entry);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticWriteData {
            origin: r.read_value(2)?.unwrap_or_default(),
            entry: r.read_value(3)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticDepositTokens {
    pub origin: SyntheticOrigin,
    pub token: Url,
    pub amount: u128,
}

impl SyntheticDepositTokens {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.origin);
        w.write_url(3, &self.token);
        w.write_biguint(4, self.amount);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticDepositTokens {
            origin: r.read_value(2)?.unwrap_or_default(),
            token: r.read_required_url(3)?,
            amount: r.read_biguint(4)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticDepositCredits {
    pub origin: SyntheticOrigin,
    pub amount: u64,
}

impl SyntheticDepositCredits {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.origin);
        w.write_uint(3, self.amount);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticDepositCredits {
            origin: r.read_value(2)?.unwrap_or_default(),
            amount: r.read_uint(3)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticBurnTokens {
    pub origin: SyntheticOrigin,
    pub amount: u128,
}

impl SyntheticBurnTokens {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.origin);
        w.write_biguint(3, self.amount);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticBurnTokens {
            origin: r.read_value(2)?.unwrap_or_default(),
            amount: r.read_biguint(3)?,
        })
    }
}

/// Forwards a transaction (with its collected signatures) to the
/// partition that owns its principal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntheticForwardTransaction {
    pub origin: SyntheticOrigin,
    pub signatures: Vec<crate::signature::Signature>,
    pub transaction: Option<Box<Transaction>>,
}

impl SyntheticForwardTransaction {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.origin);
        w.write_values(3, &self.signatures);
        if let Some(txn) = &self.transaction {
            w.write_value(4, txn.as_ref());
        }
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticForwardTransaction {
            origin: r.read_value(2)?.unwrap_or_default(),
            signatures: r.read_values(3)?,
            transaction: r.read_value(4)?.map(Box::new),
        })
    }
}
