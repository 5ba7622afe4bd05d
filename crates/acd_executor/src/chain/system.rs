// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! System transaction executors: genesis, system data writes, the ACME
//! faucet, and the anchor executors that stitch partitions together.

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use acd_database::chain_names;
use acd_types::{consts, Url};
use primitives::{
    transaction::{self, SyntheticOrigin},
    Account, Error, Result, Transaction, TransactionBody, TransactionResult,
    TransactionType,
};

/// Genesis is built by the engine itself; delivering it is a no-op that
/// exists so the genesis transaction has a status and a chain entry.
pub struct SystemGenesis;

impl TransactionExecutor for SystemGenesis {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SystemGenesis
    }

    fn allow_missing_principal(&self, _txn: &Transaction) -> Option<bool> {
        Some(true)
    }

    fn execute(
        &self, _st: &mut StateManager<'_, '_>, _delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        Ok(None)
    }

    fn validate(
        &self, _st: &mut StateManager<'_, '_>, _delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        Ok(None)
    }
}

/// A write to a system data account, produced by the engine.
pub struct SystemWriteData;

impl TransactionExecutor for SystemWriteData {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SystemWriteData
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, SystemWriteData);
        let principal_url = st.principal_url().clone();
        if !st.partition.owns(&principal_url) {
            return Err(Error::bad_request(format!(
                "{} is not a system account",
                principal_url
            )));
        }
        if let Account::DataAccount(mut account) =
            st.principal()?.clone()
        {
            if body.write_to_state {
                account.entry = Some(body.entry.clone());
                st.update(&Account::DataAccount(account))?;
            }
        } else {
            return Err(Error::bad_request(format!(
                "{} is not a data account",
                principal_url
            )));
        }
        let entry_hash = body.entry.hash();
        let txn_hash = st.txn_hash();
        st.batch().add_data_entry(&principal_url, &entry_hash, &txn_hash)?;
        Ok(Some(TransactionResult::WriteData {
            account: principal_url,
            entry_hash,
        }))
    }
}

/// Grants test tokens to a lite account. Runs against the ACME issuer.
pub struct AcmeFaucet;

impl TransactionExecutor for AcmeFaucet {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::AcmeFaucet
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, AcmeFaucet);
        let mut issuer = match st.principal()? {
            Account::TokenIssuer(issuer) => issuer.clone(),
            other => {
                return Err(Error::bad_request(format!(
                    "{} is not a token issuer",
                    other.url()
                )));
            }
        };
        let amount = transaction::AcmeFaucet::AMOUNT;
        issuer.issued = issuer.issued.saturating_add(amount);
        let token_url = issuer.url.clone();
        st.update(&Account::TokenIssuer(issuer))?;

        if st.router.routes_to(&body.url, &st.partition.id)? {
            crate::chain::deposit_tokens_local(st, &body.url, &token_url, amount)?;
        } else {
            st.submit(
                body.url.clone(),
                TransactionBody::SyntheticDepositTokens(
                    transaction::SyntheticDepositTokens {
                        origin: SyntheticOrigin::default(),
                        token: token_url,
                        amount,
                    },
                ),
            );
        }
        Ok(None)
    }
}

/// Appends a source partition's roots to the local intermediate anchor
/// chains and reports them to the block runner, which releases synthetic
/// transactions waiting on them.
fn record_partition_root(
    st: &mut StateManager<'_, '_>, source_id: &str,
    root: acd_types::Hash, bpt_root: Option<acd_types::Hash>,
) -> Result<()> {
    let pool = st.partition.anchor_pool_url();
    {
        let mut accessor = st
            .batch()
            .account_chain(&pool, &chain_names::anchor_root(source_id));
        let mut chain = accessor.open()?;
        chain.add_entry(root)?;
    }
    if let Some(bpt_root) = bpt_root {
        let mut accessor = st
            .batch()
            .account_chain(&pool, &chain_names::anchor_bpt(source_id));
        let mut chain = accessor.open()?;
        chain.add_entry(bpt_root)?;
    }
    st.did_receive_anchor(source_id, root);
    Ok(())
}

fn source_partition_id(source: &Url) -> Result<String> {
    consts::parse_partition_url(source).ok_or_else(|| {
        Error::bad_request(format!("{} is not a partition URL", source))
    })
}

/// A BVN's anchor arriving on the Directory.
pub struct PartitionAnchor;

impl TransactionExecutor for PartitionAnchor {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::PartitionAnchor
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, PartitionAnchor);
        if !st.partition.is_directory() {
            return Err(Error::bad_request(
                "partition anchors are addressed to the directory",
            ));
        }
        let source_id = source_partition_id(&body.anchor.source)?;
        record_partition_root(
            st,
            &source_id,
            body.anchor.root_chain_anchor,
            Some(body.anchor.state_tree_anchor),
        )?;
        Ok(None)
    }
}

/// The Directory's anchor arriving on a BVN: the DN root, plus receipts
/// carrying every other partition's root, plus pushed network-account
/// updates.
pub struct DirectoryAnchor;

impl TransactionExecutor for DirectoryAnchor {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::DirectoryAnchor
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, DirectoryAnchor);
        if st.partition.is_directory() {
            return Err(Error::bad_request(
                "directory anchors are addressed to block validators",
            ));
        }
        if source_partition_id(&body.anchor.source)? != consts::DIRECTORY {
            return Err(Error::bad_request(format!(
                "{} is not the directory",
                body.anchor.source
            )));
        }

        record_partition_root(
            st,
            consts::DIRECTORY,
            body.anchor.root_chain_anchor,
            Some(body.anchor.state_tree_anchor),
        )?;

        // Each receipt proves a peer partition's root into the DN root
        // carried by this anchor.
        for receipt in &body.receipts {
            if !receipt.receipt.validate()
                || receipt.receipt.anchor != body.anchor.root_chain_anchor
            {
                return Err(Error::bad_request(format!(
                    "receipt for {} does not prove into the anchor",
                    receipt.source
                )));
            }
            let source_id = source_partition_id(&receipt.source)?;
            if source_id == st.partition.id {
                continue;
            }
            record_partition_root(st, &source_id, receipt.receipt.start, None)?;
        }

        // Mirror pushed network-account updates into the local accounts.
        for update in &body.updates {
            apply_network_update(st, update)?;
        }
        Ok(None)
    }
}

fn apply_network_update(
    st: &mut StateManager<'_, '_>, update: &primitives::NetworkAccountUpdate,
) -> Result<()> {
    let target = st.partition.node_url().join(&update.name);
    match &update.body {
        TransactionBody::WriteData(write) => {
            let existing = st.load_account(&target)?;
            let exists = existing.is_some();
            let mut account = match existing {
                Some(Account::DataAccount(account)) => account,
                Some(_) => {
                    return Err(Error::bad_request(format!(
                        "{} is not a data account",
                        target
                    )));
                }
                None => primitives::DataAccount {
                    url: target.clone(),
                    auth: primitives::AccountAuth::with_authority(
                        st.partition.operator_book_url(),
                    ),
                    entry: None,
                },
            };
            account.entry = Some(write.entry.clone());
            if exists {
                st.update(&Account::DataAccount(account))?;
            } else {
                st.create(Account::DataAccount(account))?;
            }
            let entry_hash = write.entry.hash();
            let txn_hash = st.txn_hash();
            st.batch().add_data_entry(&target, &entry_hash, &txn_hash)?;
            Ok(())
        }
        TransactionBody::UpdateKeyPage(update_page) => {
            let page_url = st.partition.operator_page_url();
            let mut page = match st.require_account(&page_url)? {
                Account::KeyPage(page) => page,
                _ => {
                    return Err(Error::internal(format!(
                        "{} is not a key page",
                        page_url
                    )));
                }
            };
            super::update_key_page::apply_page_operations(
                &mut page,
                &update_page.operations,
            )?;
            st.update(&Account::KeyPage(page))?;
            Ok(())
        }
        other => Err(Error::bad_request(format!(
            "network accounts cannot be updated by {}",
            other.transaction_type()
        ))),
    }
}
