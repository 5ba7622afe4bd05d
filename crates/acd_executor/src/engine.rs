// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The consensus-facing facade: one engine per partition, driven through
//! `init_chain / begin_block / deliver_tx* / end_block / commit`.

use crate::{
    block::{BlockExecutor, BlockMeta, BlockState},
    chain::{Registry, StateManager},
    config::{Globals, PartitionInfo},
    delivery::Delivery,
    dispatcher::Dispatcher,
    genesis::GenesisConfig,
    query::{self, QueryRequest, QueryResponse},
    router::Router,
};
use acd_database::Database;
use acd_kv::KeyValueStore;
use acd_types::Hash;
use primitives::{
    Envelope, Error, Result, Status, TransactionStatus,
};
use std::sync::Arc;

pub struct EngineOptions {
    pub partition: PartitionInfo,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// The outcome of a CheckTx: accepted into the mempool or rejected with
/// a code and message. CheckTx never mutates the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    Ok,
    Fail(Status, String),
}

/// The execution engine for one partition.
pub struct Engine<S: KeyValueStore> {
    db: Database<S>,
    partition: PartitionInfo,
    registry: Registry,
    dispatcher: Arc<dyn Dispatcher>,
    globals: Globals,
}

impl<S: KeyValueStore> Engine<S> {
    pub fn new(store: S, options: EngineOptions) -> Engine<S> {
        Engine {
            db: Database::new(store),
            partition: options.partition,
            registry: Registry::standard(),
            dispatcher: options.dispatcher,
            globals: Globals::default(),
        }
    }

    pub fn partition(&self) -> &PartitionInfo { &self.partition }

    pub fn globals(&self) -> &primitives::network::GlobalValues {
        &self.globals.active
    }

    pub fn database(&self) -> &Database<S> { &self.db }

    fn router(&self) -> Router {
        Router::new(
            self.globals.active.network.clone(),
            self.globals.active.routing.clone(),
        )
    }

    /// Builds the genesis state and commits block 0. Returns the app
    /// hash.
    pub fn init_chain(&mut self, config: GenesisConfig) -> Result<Hash> {
        self.globals = Globals::new(config.values());
        let mut block = self.begin_block(BlockMeta {
            index: 0,
            timestamp: config.timestamp,
        });
        crate::genesis::populate(&mut block, &config)?;
        block.end_block()?;
        block.commit()
    }

    /// Opens a block. The returned executor borrows this engine until it
    /// is committed or dropped.
    pub fn begin_block(&mut self, meta: BlockMeta) -> BlockExecutor<'_> {
        let router = self.router();
        BlockExecutor {
            batch: self.db.begin(true),
            partition: &self.partition,
            registry: &self.registry,
            router,
            dispatcher: self.dispatcher.as_ref(),
            globals: &mut self.globals,
            meta,
            state: BlockState::default(),
        }
    }

    /// Stateless and lightly-stateful validation of an envelope, with no
    /// chain mutation: signatures must verify, the executor must exist,
    /// and its `validate` must pass against a discarded batch.
    pub fn check_tx(&self, envelope: &Envelope) -> CheckResult {
        match self.check_tx_inner(envelope) {
            Ok(()) => CheckResult::Ok,
            Err(err) => CheckResult::Fail(err.code, err.message),
        }
    }

    fn check_tx_inner(&self, envelope: &Envelope) -> Result<()> {
        let batch = self.db.begin(true);
        let transaction = match &envelope.transaction {
            Some(transaction) => transaction.clone(),
            None => {
                let hash = envelope
                    .signatures
                    .iter()
                    .find_map(|s| s.transaction_hash())
                    .ok_or_else(|| {
                        Error::bad_request(
                            "envelope has neither transaction nor hash",
                        )
                    })?;
                batch
                    .get_transaction(&hash)?
                    .and_then(|r| r.transaction)
                    .ok_or_else(|| {
                        Error::not_found(format!(
                            "transaction {} not found",
                            hash
                        ))
                    })?
            }
        };
        let delivery = Delivery::new(transaction, envelope.signatures.clone());
        let typ = delivery.transaction_type();
        let txn_hash = delivery.transaction.hash();

        if typ.is_user() {
            if delivery.signatures.is_empty() {
                return Err(Error::invalid_signature(
                    "user transactions require at least one signature",
                ));
            }
            for signature in delivery.key_signatures() {
                if !signature.verify(&txn_hash) {
                    return Err(Error::invalid_signature(
                        "signature verification failed",
                    ));
                }
            }
        } else if (typ.is_synthetic() || typ.is_anchor())
            && delivery.sequence().is_none()
        {
            return Err(Error::bad_request(
                "sequenced transaction has no partition signature",
            ));
        }

        let executor = self.registry.get(typ).ok_or_else(|| {
            Error::new(
                Status::UnsupportedType,
                format!("no executor for {}", typ),
            )
        })?;

        // Validate against a throwaway batch: state reads are real,
        // writes never land.
        let mut batch = batch;
        let principal =
            batch.get_account(&delivery.transaction.header.principal)?;
        if principal.is_none() {
            // Admission cannot always see the principal (it may be
            // created by an earlier block or a synthetic transaction);
            // leave the authoritative check to delivery.
            return Ok(());
        }
        let router = self.router();
        let mut st = StateManager::new(
            batch.begin(),
            &self.partition,
            &self.globals.active,
            &router,
            0,
            0,
            &delivery.transaction,
            principal,
        );
        executor.validate(&mut st, &delivery)?;
        Ok(())
    }

    /// Executes a whole block in one call: the consensus loop for
    /// drivers that do not need the split interface.
    pub fn execute_block(
        &mut self, meta: BlockMeta, envelopes: Vec<Envelope>,
    ) -> Result<BlockOutcome> {
        let mut block = self.begin_block(meta);
        let mut statuses = Vec::new();
        for envelope in envelopes {
            match block.deliver_envelope(envelope) {
                Ok(mut processed) => statuses.append(&mut processed),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    // A rejected envelope fails without aborting the
                    // block, like a failed CheckTx at delivery time.
                    log::warn!("envelope rejected: {}", err);
                    let mut status = TransactionStatus::default();
                    status.set_failure(&err);
                    statuses.push(status);
                }
            }
        }
        let sent = block.end_block()?;
        let root = block.commit()?;
        Ok(BlockOutcome { root, statuses, sent })
    }

    /// Resolves a query against committed state.
    pub fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let mut batch = self.db.begin(false);
        query::execute(&self.partition, &mut batch, request)
    }

    /// The committed BPT root: the app hash as of the last commit.
    pub fn app_hash(&self) -> Result<Hash> {
        let mut batch = self.db.begin(false);
        Ok(batch.bpt_root()?)
    }

    /// Exports a snapshot of the committed state.
    pub fn snapshot(&self, height: u64, timestamp: u64) -> Result<Vec<u8>> {
        let mut batch = self.db.begin(false);
        Ok(acd_database::snapshot::export(
            &mut batch,
            &self.partition.node_url(),
            height,
            timestamp,
        )?)
    }
}

/// What a block produced, for the consensus driver.
pub struct BlockOutcome {
    pub root: Hash,
    pub statuses: Vec<TransactionStatus>,
    pub sent: Vec<(String, Envelope)>,
}
