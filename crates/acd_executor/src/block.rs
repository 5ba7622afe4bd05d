// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The block runner. Consensus drives one of these per block:
//! deliveries are processed in order against the block batch, produced
//! synthetic transactions are sequenced and proven at EndBlock, and the
//! whole batch commits atomically, yielding the new BPT root.

use crate::{
    chain::{ProducedState, ProducedTxn, Registry, StateManager},
    config::{Globals, PartitionInfo},
    delivery::Delivery,
    dispatcher::Dispatcher,
    network_accounts,
    ready,
    router::Router,
    signature::process_signatures,
};
use acd_database::{
    chain_names, Batch, ChainUpdate, SigOrTxn, TransactionChainEntry,
};
use acd_merkle::Receipt;
use acd_types::{consts, Hash, Url};
use primitives::{
    fees,
    transaction::{
        self, AnchorMetadata, PartitionReceipt, SyntheticOrigin,
    },
    Account, AnchorLedger, Envelope, Error, PartitionSignature,
    ReceiptSignature, Result, Signature, Signer as _, Status, SystemLedger,
    SyntheticLedger, Transaction, TransactionBody, TransactionStatus,
    TransactionType,
};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub struct BlockMeta {
    pub index: u64,
    pub timestamp: u64,
}

/// Work accumulated while a block runs.
#[derive(Default)]
pub struct BlockState {
    /// Synthetic transactions produced this block, with their causes.
    pub produced: Vec<(Hash, ProducedTxn)>,
    /// Deliveries scheduled by earlier deliveries in this block: the
    /// synthetic drain and unwrapped forwards.
    pub work: VecDeque<Delivery>,
    /// Roots recorded on intermediate anchor chains this block.
    pub received_anchors: Vec<(String, Hash)>,
    /// Hashes of every transaction that reached a final state.
    pub executed: Vec<Hash>,
    /// Whether anything at all was delivered.
    pub delivered_any: bool,
}

/// One block in flight. Borrows the engine's environment; committing it
/// returns the borrow.
pub struct BlockExecutor<'a> {
    pub(crate) batch: Batch<'a>,
    pub(crate) partition: &'a PartitionInfo,
    pub(crate) registry: &'a Registry,
    pub(crate) router: Router,
    pub(crate) dispatcher: &'a dyn Dispatcher,
    pub(crate) globals: &'a mut Globals,
    pub(crate) meta: BlockMeta,
    pub(crate) state: BlockState,
}

impl<'a> BlockExecutor<'a> {
    pub fn meta(&self) -> BlockMeta { self.meta }

    pub fn batch(&mut self) -> &mut Batch<'a> { &mut self.batch }

    /// Delivers one envelope, then drains any work it scheduled. Returns
    /// the status of every transaction processed.
    pub fn deliver_envelope(
        &mut self, envelope: Envelope,
    ) -> Result<Vec<TransactionStatus>> {
        let transaction = match envelope.transaction {
            Some(transaction) => transaction,
            None => {
                // A signature-only envelope references a stored
                // transaction by hash.
                let hash = envelope
                    .signatures
                    .iter()
                    .find_map(|s| s.transaction_hash())
                    .ok_or_else(|| {
                        Error::bad_request(
                            "envelope has neither transaction nor hash",
                        )
                    })?;
                self.batch
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

        let mut statuses =
            vec![self.deliver(Delivery::new(transaction, envelope.signatures))?];
        while let Some(next) = self.state.work.pop_front() {
            statuses.push(self.deliver(next)?);
        }
        Ok(statuses)
    }

    /// Delivers one transaction: records it, processes its signatures,
    /// and runs it through the ready predicate and executor.
    pub fn deliver(&mut self, delivery: Delivery) -> Result<TransactionStatus> {
        let hash = delivery.transaction.hash();
        let typ = delivery.transaction_type();
        self.state.delivered_any = true;
        let mut status = self.batch.get_status(&hash)?;

        if status.executed() {
            if typ.is_user() && !delivery.internal {
                // Scenario: signatures arriving after delivery.
                return Err(Error::invalid_signature(format!(
                    "transaction {} already delivered",
                    hash
                )));
            }
            // Synthetic replays are deduplicated silently.
            return Ok(status);
        }

        if status.code == Status::Unknown {
            status.code = Status::Pending;
            status.tx_id = Some(delivery.transaction.id());
            status.received = self.meta.index;
        }

        if typ.is_user() && !delivery.internal {
            self.batch
                .put_transaction(&hash, &SigOrTxn::txn(delivery.transaction.clone()))?;
            self.batch.add_pending(
                &delivery.transaction.header.principal,
                &delivery.transaction.id(),
            )?;
            process_signatures(
                self.partition,
                &mut self.batch,
                &delivery,
                &mut status,
            )?;
            self.batch.put_status(&hash, &status)?;
        } else if (typ.is_synthetic() || typ.is_anchor()) && !delivery.internal
        {
            match delivery.sequence() {
                None => {
                    // Re-scheduled by the drain or an anchor release; the
                    // envelope information was recorded at first receipt.
                    if status.sequence_number == 0 {
                        return Err(Error::bad_request(
                            "sequenced transaction has no partition \
                             signature",
                        ));
                    }
                }
                Some(sequence) => {
                    if sequence.destination_network
                        != self.partition.node_url()
                    {
                        return Err(Error::bad_request(format!(
                            "envelope for {} delivered to {}",
                            sequence.destination_network, self.partition.id
                        )));
                    }
                    status.source_network =
                        Some(sequence.source_network.clone());
                    status.destination_network =
                        Some(sequence.destination_network.clone());
                    status.sequence_number = sequence.sequence_number;
                    status.initiator_hash =
                        Signature::Partition(sequence.clone()).hash();
                    if let Some(receipt) = delivery.receipt() {
                        status.proof = Some(receipt.proof.clone());
                    }
                    self.batch.put_transaction(
                        &hash,
                        &SigOrTxn::txn(delivery.transaction.clone()),
                    )?;
                    self.batch.put_status(&hash, &status)?;

                    if !self.record_received(&delivery, &status)? {
                        // Sequence at or below the watermark: a replay.
                        log::debug!(
                            "dropping replayed sequence {} from {:?}",
                            status.sequence_number,
                            status.source_network
                        );
                        return Ok(status);
                    }
                }
            }
        } else {
            // Work the engine generated itself: genesis, forwarded
            // transactions, locally-routed produced transactions.
            self.batch
                .put_transaction(&hash, &SigOrTxn::txn(delivery.transaction.clone()))?;
            self.batch.put_status(&hash, &status)?;
        }

        self.process_transaction(&delivery)
    }

    /// Records an incoming sequenced transaction on the appropriate
    /// ledger. False when the sequence number is a replay.
    fn record_received(
        &mut self, delivery: &Delivery, status: &TransactionStatus,
    ) -> Result<bool> {
        let source = status.source_network.as_ref().ok_or_else(|| {
            Error::internal("sequenced transaction has no source network")
        })?;
        let txid = delivery.transaction.id();
        if delivery.transaction_type().is_anchor() {
            let url = self.partition.anchor_pool_url();
            let mut ledger = match self.batch.get_account(&url)? {
                Some(Account::AnchorLedger(ledger)) => ledger,
                _ => AnchorLedger { url: url.clone(), ..Default::default() },
            };
            let fresh = ledger
                .partition(source)
                .add_received(status.sequence_number, txid);
            self.batch.put_account(&Account::AnchorLedger(ledger))?;
            Ok(fresh)
        } else {
            let url = self.partition.synthetic_url();
            let mut ledger = match self.batch.get_account(&url)? {
                Some(Account::SyntheticLedger(ledger)) => ledger,
                _ => SyntheticLedger { url: url.clone(), ..Default::default() },
            };
            let fresh = ledger
                .partition(source)
                .add_received(status.sequence_number, txid);
            self.batch.put_account(&Account::SyntheticLedger(ledger))?;
            Ok(fresh)
        }
    }

    /// Processes a transaction. Failures become a Failed status; only
    /// infrastructure errors propagate.
    pub fn process_transaction(
        &mut self, delivery: &Delivery,
    ) -> Result<TransactionStatus> {
        let hash = delivery.transaction.hash();
        let typ = delivery.transaction_type();
        let status = self.batch.get_status(&hash)?;
        if status.executed() {
            return Ok(status);
        }

        // A user transaction must have been initiated.
        if typ.is_user() && !delivery.internal && status.initiator.is_none() {
            return self.record_failed(
                delivery,
                &Error::internal("transaction initiator is missing"),
            );
        }

        // Load the principal, honoring allow-missing rules.
        let principal =
            self.batch.get_account(&delivery.transaction.header.principal)?;
        if principal.is_none()
            && !self.allows_missing_principal(&delivery.transaction)
        {
            return self.record_failed(
                delivery,
                &Error::not_found(format!(
                    "principal {} not found",
                    delivery.transaction.header.principal
                )),
            );
        }

        // Ready?
        match ready::transaction_is_ready(
            self.partition,
            self.registry,
            &mut self.batch,
            delivery,
            &status,
        ) {
            Err(err) => return self.record_failed(delivery, &err),
            Ok(false) => return self.record_pending(delivery),
            Ok(true) => {}
        }

        // A synthetic transaction becoming ready re-checks its principal.
        if typ.is_synthetic()
            && principal.is_none()
            && !self.allows_missing_principal(&delivery.transaction)
        {
            return self.record_failed(
                delivery,
                &Error::not_found(format!(
                    "principal {} not found",
                    delivery.transaction.header.principal
                )),
            );
        }

        let executor = match self.registry.get(typ) {
            Some(executor) => executor,
            None => {
                return self.record_failed(
                    delivery,
                    &Error::new(
                        Status::UnsupportedType,
                        format!("no executor for {}", typ),
                    ),
                );
            }
        };

        // Execute inside a child batch; discard on failure.
        let mut st = StateManager::new(
            self.batch.begin(),
            self.partition,
            &self.globals.active,
            &self.router,
            self.meta.index,
            self.meta.timestamp,
            &delivery.transaction,
            principal,
        );
        let mut outcome = executor.execute(&mut st, delivery);
        if outcome.is_ok() {
            if let Err(err) = network_accounts::check(
                self.partition,
                &self.globals.active,
                &st,
                delivery,
            ) {
                outcome = Err(err);
            }
        }
        match outcome {
            Err(err) => {
                drop(st);
                self.record_failed(delivery, &err)
            }
            Ok(result) => {
                let produced = st.commit()?;
                self.record_successful(delivery, produced, result)
            }
        }
    }

    fn allows_missing_principal(&self, txn: &Transaction) -> bool {
        let typ = txn.transaction_type();
        if let Some(executor) = self.registry.get(typ) {
            if let Some(allow) = executor.allow_missing_principal(txn) {
                return allow;
            }
        }
        match &txn.body {
            TransactionBody::SyntheticForwardTransaction(body) => body
                .transaction
                .as_ref()
                .map(|inner| self.allows_missing_principal(inner))
                .unwrap_or(false),
            _ => typ.is_system(),
        }
    }

    /// Records a transaction as pending. An out-of-readiness synthetic
    /// transaction is also indexed by its proof anchor so the matching
    /// anchor releases it.
    fn record_pending(
        &mut self, delivery: &Delivery,
    ) -> Result<TransactionStatus> {
        let hash = delivery.transaction.hash();
        let mut status = self.batch.get_status(&hash)?;
        status.code = Status::Pending;
        self.batch.put_status(&hash, &status)?;

        if delivery.transaction_type().is_synthetic() {
            if let Some(proof) = &status.proof {
                self.batch.add_synthetic_for_anchor(
                    &self.partition.anchor_pool_url(),
                    &proof.anchor,
                    &delivery.transaction.id(),
                )?;
            }
        }
        log::debug!("{} is pending", hash);
        Ok(status)
    }

    fn record_failed(
        &mut self, delivery: &Delivery, err: &Error,
    ) -> Result<TransactionStatus> {
        if err.is_fatal() {
            return Err(err.clone());
        }
        let hash = delivery.transaction.hash();
        let typ = delivery.transaction_type();
        let mut status = self.batch.get_status(&hash)?;
        status.set_failure(err);
        self.batch.put_status(&hash, &status)?;
        log::info!("transaction {} failed: {}", hash, err);

        let principal = delivery.transaction.header.principal.clone();
        self.batch.remove_pending(&principal, &delivery.transaction.id())?;

        // A failed user transaction still lands on the principal's main
        // chain so its outcome is observable from the chain.
        if typ.is_user() {
            self.append_transaction_chain(
                &principal,
                chain_names::MAIN,
                &hash,
            )?;
        }

        let mut produced = ProducedState::default();

        // Refund a synthetic transaction's initiator.
        if let Some(origin) = delivery.transaction.body.synthetic_origin() {
            if origin.fee_refund > 0 {
                if let Some(initiator) = &origin.initiator {
                    produced.did_produce(
                        initiator.clone(),
                        TransactionBody::SyntheticDepositCredits(
                            transaction::SyntheticDepositCredits {
                                origin: SyntheticOrigin::default(),
                                amount: origin.fee_refund,
                            },
                        ),
                    );
                }
            }
        }

        if let Some(executor) = self.registry.get(typ) {
            executor.did_fail(&mut produced, &delivery.transaction)?;
        }

        // Refund the user fee over the failure maximum. Best effort: a
        // refund failure must not cascade into a block failure.
        if typ.is_user() {
            if let Err(refund_err) = self.refund_failed_fee(delivery, &status) {
                log::warn!(
                    "could not refund failed transaction {}: {}",
                    hash,
                    refund_err
                );
            }
        }

        self.absorb(hash, produced);
        self.finalize_sequenced(delivery, &status)?;
        self.state.executed.push(hash);
        Ok(status)
    }

    fn refund_failed_fee(
        &mut self, delivery: &Delivery, status: &TransactionStatus,
    ) -> Result<()> {
        let initiator = match &status.initiator {
            Some(initiator) => initiator.clone(),
            None => return Ok(()),
        };
        if !delivery.transaction.header.principal.local_to(&initiator)
            && !self
                .router
                .routes_to(&initiator, &self.partition.id)
                .unwrap_or(false)
        {
            return Ok(());
        }
        let paid = fees::compute_transaction_fee(&delivery.transaction)?;
        if paid <= fees::FEE_FAILED_MAXIMUM {
            return Ok(());
        }
        let mut account =
            self.batch.get_account(&initiator)?.ok_or_else(|| {
                Error::not_found(format!("signer {} not found", initiator))
            })?;
        match account.as_signer_mut() {
            Some(signer) => {
                signer.credit_credits(paid - fees::FEE_FAILED_MAXIMUM);
            }
            None => return Ok(()),
        }
        self.batch.put_account(&account)?;
        Ok(())
    }

    fn record_successful(
        &mut self, delivery: &Delivery, produced: ProducedState,
        result: Option<primitives::TransactionResult>,
    ) -> Result<TransactionStatus> {
        let hash = delivery.transaction.hash();
        let typ = delivery.transaction_type();
        let mut status = self.batch.get_status(&hash)?;
        status.code = Status::Delivered;
        status.result =
            Some(result.unwrap_or(primitives::TransactionResult::Empty));
        self.batch.put_status(&hash, &status)?;

        let principal = delivery.transaction.header.principal.clone();
        self.batch.remove_pending(&principal, &delivery.transaction.id())?;

        // Stage network-variable effects: parse updates into the pending
        // globals and, on the DN, onto the ledger for the next anchor.
        network_accounts::apply(
            self.partition,
            &mut self.globals.pending,
            &mut self.batch,
            delivery,
        )?;
        if let TransactionBody::DirectoryAnchor(body) =
            &delivery.transaction.body
        {
            network_accounts::absorb_pushed_updates(
                &mut self.globals.pending,
                &body.updates,
            )?;
        }

        // Genesis is not chained; everything else lands on the main
        // chain, or the scratch chain for prunable data.
        if typ != TransactionType::SystemGenesis {
            let chain = match &delivery.transaction.body {
                TransactionBody::WriteData(body) if body.scratch => {
                    chain_names::SCRATCH
                }
                _ => chain_names::MAIN,
            };
            self.append_transaction_chain(&principal, chain, &hash)?;
        }

        self.absorb(hash, produced);
        self.finalize_sequenced(delivery, &status)?;
        self.state.executed.push(hash);
        log::debug!("delivered {} on {}", hash, self.partition.id);
        Ok(status)
    }

    /// Appends a transaction hash to an account chain and records the
    /// placement for receipt resolution.
    fn append_transaction_chain(
        &mut self, account: &Url, chain: &str, hash: &Hash,
    ) -> Result<()> {
        let index = {
            let mut accessor = self.batch.account_chain(account, chain);
            let mut live = accessor.open()?;
            live.add_entry(*hash)?;
            live.height() - 1
        };
        self.batch.add_transaction_chain(
            hash,
            TransactionChainEntry {
                account: account.clone(),
                chain: chain.to_string(),
                chain_index: index,
                block_index: self.meta.index,
            },
        )?;
        Ok(())
    }

    /// Merges executor side effects into the block state.
    fn absorb(&mut self, cause: Hash, produced: ProducedState) {
        for txn in produced.produced {
            self.state.produced.push((cause, txn));
        }
        for delivery in produced.forwarded {
            self.state.work.push_back(delivery);
        }
        for (source, root) in produced.received_anchors {
            self.state.received_anchors.push((source.clone(), root));
            // Release transactions that were waiting on this anchor.
            if let Err(err) = self.release_for_anchor(&root) {
                log::error!("failed to release anchor {}: {}", root, err);
            }
        }
    }

    fn release_for_anchor(&mut self, root: &Hash) -> Result<()> {
        let pool = self.partition.anchor_pool_url();
        let waiting = self.batch.take_synthetic_for_anchor(&pool, root)?;
        for txid in waiting {
            if let Some(record) = self.batch.get_transaction(&txid.hash())? {
                if let Some(txn) = record.transaction {
                    self.state.work.push_back(Delivery::new(txn, Vec::new()));
                }
            }
        }
        Ok(())
    }

    /// Advances the delivered watermark for a sequenced transaction and
    /// schedules the next number if it has already arrived. Executing out
    /// of order is fatal.
    fn finalize_sequenced(
        &mut self, delivery: &Delivery, status: &TransactionStatus,
    ) -> Result<()> {
        let typ = delivery.transaction_type();
        let is_anchor = typ.is_anchor();
        if !typ.is_synthetic() && !is_anchor {
            return Ok(());
        }
        let source = match &status.source_network {
            Some(source) => source.clone(),
            None => return Ok(()),
        };

        let next = if is_anchor {
            let url = self.partition.anchor_pool_url();
            let mut ledger = match self.batch.get_account(&url)? {
                Some(Account::AnchorLedger(ledger)) => ledger,
                _ => AnchorLedger { url: url.clone(), ..Default::default() },
            };
            let partition = ledger.partition(&source);
            if !partition.add_delivered(status.sequence_number) {
                return Err(Error::fatal(format!(
                    "anchor sequence violation: delivered {} after {}",
                    status.sequence_number, partition.delivered
                )));
            }
            let next =
                partition.get_pending(status.sequence_number + 1).cloned();
            self.batch.put_account(&Account::AnchorLedger(ledger))?;
            next
        } else {
            let url = self.partition.synthetic_url();
            let mut ledger = match self.batch.get_account(&url)? {
                Some(Account::SyntheticLedger(ledger)) => ledger,
                _ => SyntheticLedger { url: url.clone(), ..Default::default() },
            };
            let partition = ledger.partition(&source);
            if !partition.add_delivered(status.sequence_number) {
                return Err(Error::fatal(format!(
                    "synthetic sequence violation: delivered {} after {}",
                    status.sequence_number, partition.delivered
                )));
            }
            let next =
                partition.get_pending(status.sequence_number + 1).cloned();
            self.batch.put_account(&Account::SyntheticLedger(ledger))?;
            next
        };

        if let Some(next) = next {
            if let Some(record) = self.batch.get_transaction(&next.hash())? {
                if let Some(txn) = record.transaction {
                    self.state.work.push_back(Delivery::new(txn, Vec::new()));
                }
            }
        }
        Ok(())
    }

    /// Finalizes the block: updates the system ledger, sequences and
    /// proves produced synthetic transactions, builds the root chain,
    /// and emits this block's anchors. Returns the dispatched envelopes.
    pub fn end_block(&mut self) -> Result<Vec<(String, Envelope)>> {
        // Drain scheduled work and produced transactions to a fixed
        // point: locally-routed produced work is delivered in this block
        // and may itself produce more.
        let mut sequenced = Vec::new();
        loop {
            while let Some(next) = self.state.work.pop_front() {
                self.deliver(next)?;
            }
            if self.state.produced.is_empty() {
                break;
            }
            let produced = std::mem::take(&mut self.state.produced);
            for (cause, txn) in produced {
                if let Some(entry) = self.produce_synthetic(cause, txn)? {
                    sequenced.push(entry);
                }
            }
        }

        self.update_system_ledger()?;

        // Finalize the root chain: fold every changed chain's anchor in
        // deterministic order.
        let ledger_url = self.partition.ledger_url();
        let updates = self.batch.take_chain_updates();
        for ChainUpdate { account, name } in &updates {
            if *account == ledger_url && name == chain_names::ROOT {
                continue;
            }
            let anchor = {
                let mut accessor = self.batch.account_chain(account, name);
                accessor.open()?.anchor()
            };
            let mut accessor =
                self.batch.account_chain(&ledger_url, chain_names::ROOT);
            accessor.open()?.add_entry(anchor)?;
        }
        let (block_root, root_height) = {
            let mut accessor =
                self.batch.account_chain(&ledger_url, chain_names::ROOT);
            let chain = accessor.open()?;
            (chain.anchor(), chain.height())
        };

        // Index this block for the minor-block query.
        let record = crate::query::MinorBlockRecord {
            index: self.meta.index,
            timestamp: self.meta.timestamp,
            root: block_root,
            transactions: std::mem::take(&mut self.state.executed),
        };
        self.batch.write_raw(
            &crate::query::minor_block_key(self.meta.index),
            acd_encoding::encode(&record),
        )?;

        // Attach receipts rooted in this block and hand the synthetic
        // envelopes to the dispatcher.
        let mut out = Vec::new();
        for entry in sequenced {
            let envelope = self.seal_synthetic(&entry, block_root, root_height)?;
            out.push((entry.destination_id.clone(), envelope));
        }

        let state_tree_anchor = self.batch.refresh_bpt()?;

        if self.state.delivered_any || !out.is_empty() {
            self.emit_anchors(
                block_root,
                root_height,
                state_tree_anchor,
                &mut out,
            )?;
        }

        for (destination, envelope) in &out {
            self.dispatcher.send(destination, envelope.clone());
        }
        Ok(out)
    }

    fn update_system_ledger(&mut self) -> Result<()> {
        let url = self.partition.ledger_url();
        let mut ledger = match self.batch.get_account(&url)? {
            Some(Account::SystemLedger(ledger)) => ledger,
            _ => SystemLedger { url: url.clone(), ..Default::default() },
        };
        ledger.index = self.meta.index;
        ledger.timestamp = self.meta.timestamp;
        self.batch.put_account(&Account::SystemLedger(ledger))?;
        Ok(())
    }

    /// Assigns the next sequence number toward the destination partition
    /// and records the transaction on the synthetic-sequence chain.
    /// Locally-routed work is delivered in place instead.
    fn produce_synthetic(
        &mut self, cause: Hash, produced: ProducedTxn,
    ) -> Result<Option<SequencedTxn>> {
        let destination_id = self.router.route(&produced.destination)?;
        let mut body = produced.body;
        if let Some(origin) = body.synthetic_origin_mut() {
            if origin.cause.is_zero() {
                origin.cause = cause;
            }
            if origin.source.authority().is_empty() {
                origin.source = self.partition.node_url();
            }
        }
        let txn = Transaction::new(produced.destination.clone(), body);
        let hash = txn.hash();

        if destination_id == self.partition.id {
            // No partition boundary to cross: deliver in this block.
            self.state.work.push_back(Delivery::internal(txn));
            self.batch.add_produced(
                &cause,
                &acd_types::TxId::new(produced.destination, hash),
            )?;
            return Ok(None);
        }

        let destination_url = consts::partition_url(&destination_id);
        let ledger_url = self.partition.synthetic_url();
        let mut ledger = match self.batch.get_account(&ledger_url)? {
            Some(Account::SyntheticLedger(ledger)) => ledger,
            _ => SyntheticLedger { url: ledger_url.clone(), ..Default::default() },
        };
        let partition = ledger.partition(&destination_url);
        partition.produced += 1;
        let sequence_number = partition.produced;
        self.batch.put_account(&Account::SyntheticLedger(ledger))?;

        let mut status = TransactionStatus {
            tx_id: Some(txn.id()),
            code: Status::Pending,
            remote: true,
            received: self.meta.index,
            source_network: Some(self.partition.node_url()),
            destination_network: Some(destination_url),
            sequence_number,
            ..Default::default()
        };
        status.initiator_hash = hash;
        self.batch.put_transaction(&hash, &SigOrTxn::txn(txn.clone()))?;
        self.batch.put_status(&hash, &status)?;
        self.batch.add_produced(&cause, &txn.id())?;

        let chain_name = chain_names::synthetic_sequence(&destination_id);
        let chain_index = {
            let mut accessor =
                self.batch.account_chain(&ledger_url, &chain_name);
            let mut chain = accessor.open()?;
            chain.add_entry(hash)?;
            chain.height() - 1
        };

        Ok(Some(SequencedTxn {
            transaction: txn,
            destination_id,
            sequence_number,
            chain_name,
            chain_index,
        }))
    }

    /// Builds the cross-partition envelope for a produced synthetic
    /// transaction: its sequencing signature plus a receipt proving the
    /// transaction into this block's partition root.
    fn seal_synthetic(
        &mut self, entry: &SequencedTxn, block_root: Hash, root_height: u64,
    ) -> Result<Envelope> {
        let hash = entry.transaction.hash();
        let ledger_url = self.partition.synthetic_url();
        let proof = self.prove_into_root(
            &ledger_url,
            &entry.chain_name,
            entry.chain_index,
            block_root,
            root_height,
        )?;

        let mut status = self.batch.get_status(&hash)?;
        status.proof = Some(proof.clone());
        self.batch.put_status(&hash, &status)?;

        Ok(Envelope {
            signatures: vec![
                Signature::Partition(PartitionSignature {
                    source_network: self.partition.node_url(),
                    destination_network: consts::partition_url(
                        &entry.destination_id,
                    ),
                    sequence_number: entry.sequence_number,
                    transaction_hash: hash,
                }),
                Signature::Receipt(ReceiptSignature {
                    source_network: self.partition.node_url(),
                    proof,
                    transaction_hash: hash,
                }),
            ],
            transaction: Some(entry.transaction.clone()),
        })
    }

    /// Proves `chain[index]` into the block's partition root: the entry
    /// proves into its chain anchor, which is an entry of the root chain,
    /// which folds to the block root.
    fn prove_into_root(
        &mut self, account: &Url, chain: &str, index: u64, block_root: Hash,
        root_height: u64,
    ) -> Result<Receipt> {
        let (inner, chain_anchor) = {
            let mut accessor = self.batch.account_chain(account, chain);
            let mut live = accessor.open()?;
            let head = live.height() - 1;
            (live.receipt(index, head)?, live.anchor())
        };

        let ledger_url = self.partition.ledger_url();
        let mut accessor =
            self.batch.account_chain(&ledger_url, chain_names::ROOT);
        let mut root_chain = accessor.open()?;
        let at = root_chain.height_of(&chain_anchor)?.ok_or_else(|| {
            Error::internal(format!(
                "chain {} anchor is not on the root chain",
                chain
            ))
        })?;
        let outer = root_chain.receipt(at, root_height - 1)?;

        let combined = inner.combine(&outer).ok_or_else(|| {
            Error::internal("chain receipt does not connect to the root chain")
        })?;
        debug_assert_eq!(combined.anchor, block_root);
        Ok(combined)
    }

    /// Emits this block's anchor: the Directory pushes its root (plus
    /// receipts for every root it observed and any staged network
    /// updates) to each BVN; a BVN pushes its root to the Directory.
    fn emit_anchors(
        &mut self, block_root: Hash, root_height: u64, state_tree: Hash,
        out: &mut Vec<(String, Envelope)>,
    ) -> Result<()> {
        let anchor = AnchorMetadata {
            source: self.partition.node_url(),
            minor_block_index: self.meta.index,
            root_chain_index: root_height.saturating_sub(1),
            root_chain_anchor: block_root,
            state_tree_anchor: state_tree,
        };

        if self.partition.is_directory() {
            // Receipts carrying each observed partition root into this
            // DN root.
            let mut received = std::mem::take(&mut self.state.received_anchors);
            received.sort();
            received.dedup();
            let mut receipts = Vec::new();
            let pool = self.partition.anchor_pool_url();
            for (source_id, root) in received {
                let chain_name = chain_names::anchor_root(&source_id);
                let index = {
                    let mut accessor =
                        self.batch.account_chain(&pool, &chain_name);
                    accessor.open()?.height_of(&root)?
                };
                let index = match index {
                    Some(index) => index,
                    None => continue,
                };
                let receipt = self.prove_into_root(
                    &pool,
                    &chain_name,
                    index,
                    block_root,
                    root_height,
                )?;
                receipts.push(PartitionReceipt {
                    source: consts::partition_url(&source_id),
                    receipt,
                });
            }

            let updates = self.take_pending_updates()?;
            let bvns: Vec<String> = self
                .router
                .network()
                .bvn_ids()
                .iter()
                .map(|s| s.to_string())
                .collect();
            for bvn in bvns {
                let body = TransactionBody::DirectoryAnchor(
                    transaction::DirectoryAnchor {
                        anchor: anchor.clone(),
                        updates: updates.clone(),
                        receipts: receipts.clone(),
                    },
                );
                let destination =
                    consts::partition_url(&bvn).join(consts::ANCHOR_POOL);
                let envelope =
                    self.seal_anchor(&bvn, destination, body)?;
                out.push((bvn, envelope));
            }
        } else {
            let body = TransactionBody::PartitionAnchor(
                transaction::PartitionAnchor { anchor },
            );
            let destination = consts::dn_url().join(consts::ANCHOR_POOL);
            let envelope = self.seal_anchor(
                consts::DIRECTORY,
                destination,
                body,
            )?;
            out.push((consts::DIRECTORY.to_string(), envelope));
        }
        Ok(())
    }

    /// Assigns an anchor its sequence number on the anchor stream and
    /// wraps it in an envelope.
    fn seal_anchor(
        &mut self, destination_id: &str, destination: Url,
        body: TransactionBody,
    ) -> Result<Envelope> {
        let destination_partition = consts::partition_url(destination_id);
        let url = self.partition.anchor_pool_url();
        let mut ledger = match self.batch.get_account(&url)? {
            Some(Account::AnchorLedger(ledger)) => ledger,
            _ => AnchorLedger { url: url.clone(), ..Default::default() },
        };
        let partition = ledger.partition(&destination_partition);
        partition.produced += 1;
        let sequence_number = partition.produced;
        self.batch.put_account(&Account::AnchorLedger(ledger))?;

        let txn = Transaction::new(destination, body);
        let hash = txn.hash();
        let status = TransactionStatus {
            tx_id: Some(txn.id()),
            code: Status::Pending,
            remote: true,
            received: self.meta.index,
            source_network: Some(self.partition.node_url()),
            destination_network: Some(destination_partition.clone()),
            sequence_number,
            ..Default::default()
        };
        self.batch.put_transaction(&hash, &SigOrTxn::txn(txn.clone()))?;
        self.batch.put_status(&hash, &status)?;

        Ok(Envelope {
            signatures: vec![Signature::Partition(PartitionSignature {
                source_network: self.partition.node_url(),
                destination_network: destination_partition,
                sequence_number,
                transaction_hash: hash,
            })],
            transaction: Some(txn),
        })
    }

    fn take_pending_updates(
        &mut self,
    ) -> Result<Vec<primitives::NetworkAccountUpdate>> {
        let url = self.partition.ledger_url();
        let mut ledger = match self.batch.get_account(&url)? {
            Some(Account::SystemLedger(ledger)) => ledger,
            _ => return Ok(Vec::new()),
        };
        let updates = std::mem::take(&mut ledger.pending_updates);
        if !updates.is_empty() {
            self.batch.put_account(&Account::SystemLedger(ledger))?;
        }
        Ok(updates)
    }

    /// Commits the block atomically. Promotes the pending globals and
    /// returns the new BPT root, the app hash.
    pub fn commit(self) -> Result<Hash> {
        self.globals.promote();
        let root = self
            .batch
            .commit()?
            .ok_or_else(|| Error::internal("block batch was not a root batch"))?;
        log::info!(
            "committed block {} on {}: root {:?}",
            self.meta.index,
            self.partition.id,
            root
        );
        Ok(root)
    }
}

/// A produced synthetic transaction waiting for its end-of-block receipt.
struct SequencedTxn {
    transaction: Transaction,
    destination_id: String,
    sequence_number: u64,
    chain_name: String,
    chain_index: u64,
}
