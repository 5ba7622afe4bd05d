// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! System transaction bodies: genesis and the anchors partitions exchange.

use crate::{data::DataEntry, ledger::NetworkAccountUpdate};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_merkle::Receipt;
use acd_types::{Hash, Url};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemGenesis {}

impl SystemGenesis {
    pub(crate) fn append_body(&self, _w: &mut Writer) {}

    pub(crate) fn decode_body(_r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SystemGenesis {})
    }
}

/// A receipt proving one partition's synthetic-sequence chain into the
/// anchor being distributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReceipt {
    pub source: Url,
    pub receipt: Receipt,
}

impl Encodable for PartitionReceipt {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.source);
        w.write_value(2, &self.receipt);
    }
}

impl Decodable for PartitionReceipt {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(PartitionReceipt {
            source: r.read_required_url(1)?,
            receipt: r.read_value(2)?.unwrap_or_default(),
        })
    }
}

/// Anchor fields shared by both anchor classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorMetadata {
    pub source: Url,
    pub minor_block_index: u64,
    pub root_chain_index: u64,
    pub root_chain_anchor: Hash,
    pub state_tree_anchor: Hash,
}

impl Encodable for AnchorMetadata {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.source);
        w.write_uint(2, self.minor_block_index);
        w.write_uint(3, self.root_chain_index);
        w.write_hash(4, &self.root_chain_anchor);
        w.write_hash(5, &self.state_tree_anchor);
    }
}

impl Decodable for AnchorMetadata {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(AnchorMetadata {
            source: r.read_required_url(1)?,
            minor_block_index: r.read_uint(2)?,
            root_chain_index: r.read_uint(3)?,
            root_chain_anchor: r.read_hash(4)?,
            state_tree_anchor: r.read_hash(5)?,
        })
    }
}

/// The Directory's anchor, pushed to every BVN: the DN block root plus
/// receipts and staged network-account updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryAnchor {
    pub anchor: AnchorMetadata,
    pub updates: Vec<NetworkAccountUpdate>,
    pub receipts: Vec<PartitionReceipt>,
}

impl DirectoryAnchor {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.anchor);
        w.write_values(3, &self.updates);
        w.write_values(4, &self.receipts);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(DirectoryAnchor {
            anchor: r.read_value(2)?.unwrap_or_default(),
            updates: r.read_values(3)?,
            receipts: r.read_values(4)?,
        })
    }
}

/// A BVN's anchor, sent to the Directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionAnchor {
    pub anchor: AnchorMetadata,
}

impl PartitionAnchor {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.anchor);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(PartitionAnchor { anchor: r.read_value(2)?.unwrap_or_default() })
    }
}

/// A write to a system data account, produced by the engine itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemWriteData {
    pub entry: DataEntry,
    pub write_to_state: bool,
}

impl SystemWriteData {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.entry);
        w.write_bool(3, self.write_to_state);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SystemWriteData {
            entry: r.read_value(2)?.unwrap_or_default(),
            write_to_state: r.read_bool(3)?,
        })
    }
}
