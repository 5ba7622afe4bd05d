// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Merkle structures backing every account chain and the partition state
//! summary: an append-only accumulator ([`MerkleState`]), chains persisted
//! through a [`ChainStore`], inclusion [`Receipt`]s that compose across
//! chains, and the binary Patricia tree ([`Bpt`]) mapping account IDs to
//! account-state hashes.

pub mod bpt;
pub mod chain;
mod errors;
pub mod receipt;
pub mod state;

pub use self::{
    bpt::{Bpt, BptStore},
    chain::{Chain, ChainKey, ChainStore},
    errors::MerkleError,
    receipt::{Receipt, ReceiptEntry},
    state::MerkleState,
};

pub type Result<T> = std::result::Result<T, MerkleError>;
