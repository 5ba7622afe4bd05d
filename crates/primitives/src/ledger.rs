// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::transaction::TransactionBody;
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{TxId, Url};

/// A staged update to a network variable account, recorded on the DN's
/// system ledger and pushed to the BVNs in the next directory anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAccountUpdate {
    pub name: String,
    pub body: TransactionBody,
}

impl Encodable for NetworkAccountUpdate {
    fn append(&self, w: &mut Writer) {
        w.write_string(1, &self.name);
        w.write_value(2, &self.body);
    }
}

impl Decodable for NetworkAccountUpdate {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(NetworkAccountUpdate {
            name: r.read_string(1)?,
            body: r
                .read_value(2)?
                .ok_or(DecoderError::MissingField(2))?,
        })
    }
}

/// The per-partition system ledger: block index and time, plus pending
/// network-account updates awaiting the next anchor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemLedger {
    pub url: Url,
    pub index: u64,
    pub timestamp: u64,
    pub pending_updates: Vec<NetworkAccountUpdate>,
}

impl SystemLedger {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_uint(3, self.index);
        w.write_uint(4, self.timestamp);
        w.write_values(5, &self.pending_updates);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SystemLedger {
            url: r.read_required_url(2)?,
            index: r.read_uint(3)?,
            timestamp: r.read_uint(4)?,
            pending_updates: r.read_values(5)?,
        })
    }
}

/// Sequencing state against one peer partition.
///
/// `produced` is the sequence number most recently assigned to an outgoing
/// transaction; `received` the highest incoming number seen; `delivered`
/// the last contiguous number executed. `pending[i]` is the transaction
/// waiting at sequence `delivered + 2 + i` (a zero slot means that number
/// has not arrived); `delivered + 1` is always the only number eligible to
/// execute next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSyntheticLedger {
    pub url: Url,
    pub produced: u64,
    pub received: u64,
    pub delivered: u64,
    pub pending: Vec<Option<TxId>>,
}

impl PartitionSyntheticLedger {
    /// Records an incoming transaction at a sequence number. Returns false
    /// for numbers at or below `delivered` (replays).
    pub fn add_received(&mut self, sequence: u64, txid: TxId) -> bool {
        if sequence <= self.delivered {
            return false;
        }
        if sequence > self.received {
            self.received = sequence;
        }
        let index = (sequence - self.delivered - 1) as usize;
        if self.pending.len() <= index {
            self.pending.resize(index + 1, None);
        }
        self.pending[index] = Some(txid);
        true
    }

    /// Marks a sequence number delivered. Only `delivered + 1` is legal.
    pub fn add_delivered(&mut self, sequence: u64) -> bool {
        if sequence != self.delivered + 1 {
            return false;
        }
        self.delivered = sequence;
        if self.received < sequence {
            self.received = sequence;
        }
        if !self.pending.is_empty() {
            self.pending.remove(0);
        }
        true
    }

    /// The transaction waiting at a sequence number, if it has arrived.
    pub fn get_pending(&self, sequence: u64) -> Option<&TxId> {
        if sequence <= self.delivered {
            return None;
        }
        let index = (sequence - self.delivered - 1) as usize;
        self.pending.get(index)?.as_ref()
    }
}

impl Encodable for PartitionSyntheticLedger {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.url);
        w.write_uint(2, self.produced);
        w.write_uint(3, self.received);
        w.write_uint(4, self.delivered);
        // Slots may be empty; encode presence explicitly.
        w.write_strings(
            5,
            &self
                .pending
                .iter()
                .map(|t| t.as_ref().map(|t| t.to_string()).unwrap_or_default())
                .collect::<Vec<_>>(),
        );
    }
}

impl Decodable for PartitionSyntheticLedger {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        let url = r.read_required_url(1)?;
        let produced = r.read_uint(2)?;
        let received = r.read_uint(3)?;
        let delivered = r.read_uint(4)?;
        let mut pending = Vec::new();
        for s in r.read_strings(5)? {
            if s.is_empty() {
                pending.push(None);
            } else {
                pending.push(Some(TxId::parse(&s).map_err(|e| {
                    DecoderError::InvalidValue("txid", e.to_string())
                })?));
            }
        }
        Ok(PartitionSyntheticLedger {
            url,
            produced,
            received,
            delivered,
            pending,
        })
    }
}

/// The partition's synthetic ledger: one sequencing record per peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticLedger {
    pub url: Url,
    pub sequence: Vec<PartitionSyntheticLedger>,
}

impl SyntheticLedger {
    /// The sequencing record for a peer, created on first touch.
    pub fn partition(&mut self, url: &Url) -> &mut PartitionSyntheticLedger {
        if let Some(i) = self.sequence.iter().position(|p| p.url == *url) {
            return &mut self.sequence[i];
        }
        self.sequence.push(PartitionSyntheticLedger {
            url: url.clone(),
            ..Default::default()
        });
        self.sequence.last_mut().expect("just pushed")
    }

    pub fn partition_ref(&self, url: &Url) -> Option<&PartitionSyntheticLedger> {
        self.sequence.iter().find(|p| p.url == *url)
    }

    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_values(3, &self.sequence);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SyntheticLedger {
            url: r.read_required_url(2)?,
            sequence: r.read_values(3)?,
        })
    }
}

/// The anchor pool account's ledger state. Anchors are sequenced with the
/// same per-peer discipline as synthetic transactions but on their own
/// stream: an anchor never waits behind a proof-gated transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorLedger {
    pub url: Url,
    /// One sequencing record per peer partition.
    pub sequence: Vec<PartitionSyntheticLedger>,
}

impl AnchorLedger {
    pub fn partition(&mut self, url: &Url) -> &mut PartitionSyntheticLedger {
        if let Some(i) = self.sequence.iter().position(|p| p.url == *url) {
            return &mut self.sequence[i];
        }
        self.sequence.push(PartitionSyntheticLedger {
            url: url.clone(),
            ..Default::default()
        });
        self.sequence.last_mut().expect("just pushed")
    }

    pub fn partition_ref(&self, url: &Url) -> Option<&PartitionSyntheticLedger> {
        self.sequence.iter().find(|p| p.url == *url)
    }

    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_values(3, &self.sequence);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(AnchorLedger {
            url: r.read_required_url(2)?,
            sequence: r.read_values(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_types::sha256;

    fn txid(n: u8) -> TxId {
        TxId::new(Url::parse("acc://bvn-a.acme/synthetic").unwrap(), sha256(&[n]))
    }

    #[test]
    fn sequencing_invariants() {
        let mut ledger = PartitionSyntheticLedger::default();
        // Out of order arrival: 2 before 1.
        assert!(ledger.add_received(2, txid(2)));
        assert!(ledger.add_received(1, txid(1)));
        assert_eq!(ledger.received, 2);
        assert_eq!(ledger.get_pending(1), Some(&txid(1)));
        assert_eq!(ledger.get_pending(2), Some(&txid(2)));

        // Only delivered + 1 may advance.
        assert!(!ledger.add_delivered(2));
        assert!(ledger.add_delivered(1));
        assert_eq!(ledger.get_pending(1), None);
        assert_eq!(ledger.get_pending(2), Some(&txid(2)));
        assert!(ledger.add_delivered(2));
        assert_eq!(ledger.delivered, 2);

        // Replays below the watermark are refused.
        assert!(!ledger.add_received(1, txid(1)));
    }

    #[test]
    fn pending_slots_encode_sparsely() {
        let mut ledger = PartitionSyntheticLedger {
            url: Url::parse("acc://bvn-a.acme").unwrap(),
            ..Default::default()
        };
        ledger.add_received(3, txid(3));
        let bytes = acd_encoding::encode(&ledger);
        let decoded: PartitionSyntheticLedger =
            acd_encoding::decode(&bytes).unwrap();
        assert_eq!(decoded, ledger);
        assert_eq!(decoded.get_pending(3), Some(&txid(3)));
        assert_eq!(decoded.get_pending(1), None);
    }
}
