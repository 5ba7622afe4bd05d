// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The Accord execution engine. Driven by a consensus caller through
//! `InitChain / BeginBlock / DeliverTx / EndBlock / Commit`, it executes
//! user transactions against the account store, produces and sequences
//! synthetic transactions across partitions, verifies their receipts on
//! the receiving side, and answers queries over the resulting state.

pub mod block;
pub mod chain;
mod config;
pub mod delivery;
pub mod dispatcher;
pub mod engine;
pub mod genesis;
pub mod network_accounts;
pub mod query;
pub mod ready;
mod router;
pub mod signature;

pub use self::{
    block::{BlockExecutor, BlockMeta, BlockState},
    chain::{Registry, StateManager, TransactionExecutor},
    config::{Globals, PartitionInfo},
    delivery::Delivery,
    dispatcher::{Dispatcher, LoopbackDispatcher},
    engine::{BlockOutcome, CheckResult, Engine, EngineOptions},
    router::Router,
};
