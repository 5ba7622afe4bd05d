// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The account store: a keyed record forest over a KV transaction. A
//! [`Batch`] scopes one KV transaction plus an in-memory record cache;
//! child batches borrow their parent and fold into it on commit; the root
//! commit refreshes the BPT entry of every dirty account and pushes all
//! records to the KV layer in deterministic key order.

mod batch;
mod errors;
mod key;
mod records;
pub mod snapshot;
mod types;

pub use self::{
    batch::{Batch, Database},
    errors::{DbError, DbResult},
    key::{KeyPart, RecordKey},
    records::{chain_names, ChainAccessor},
    types::{ChainMetadata, ChainUpdate, SigOrTxn, TransactionChainEntry},
};
