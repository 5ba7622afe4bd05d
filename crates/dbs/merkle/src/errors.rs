// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::DecoderError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("entry {0} is beyond the chain head {1}")]
    EntryOutOfRange(u64, u64),
    #[error("entry {0:?} is not present in the chain")]
    EntryNotFound(acd_types::Hash),
    #[error("receipt range is empty or inverted ({from}..{to})")]
    BadReceiptRange { from: u64, to: u64 },
    #[error("stored merkle object is corrupt: {0}")]
    Codec(#[from] DecoderError),
    #[error("storage failure: {0}")]
    Store(String),
}
