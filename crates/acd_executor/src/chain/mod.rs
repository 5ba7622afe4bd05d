// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Per-transaction-type executors and the state manager they run against.

mod add_credits;
mod burn_tokens;
mod create_data_account;
mod create_identity;
mod create_key_book;
mod create_key_page;
mod create_token;
mod create_token_account;
mod issue_tokens;
mod send_tokens;
mod synthetic_burn_tokens;
mod synthetic_create_identity;
mod synthetic_deposit_credits;
mod synthetic_deposit_tokens;
mod synthetic_forward;
mod synthetic_write_data;
mod system;
mod update_account_auth;
mod update_key;
mod update_key_page;
mod write_data;
mod write_data_to;

use crate::{config::PartitionInfo, delivery::Delivery, router::Router};
use acd_database::Batch;
use acd_types::{Hash, Url};
use primitives::{
    network::GlobalValues, Account, Error, Result, Transaction,
    TransactionBody, TransactionResult, TransactionStatus, TransactionType,
};
use std::collections::HashMap;

/// Extracts an executor's body type from a delivery; a mismatch is an
/// internal error because dispatch is by type code.
macro_rules! body {
    ($delivery:expr, $variant:ident) => {
        match &$delivery.transaction.body {
            primitives::TransactionBody::$variant(body) => body,
            other => {
                return Err(primitives::Error::internal(format!(
                    "invalid payload: want {}, got {}",
                    stringify!($variant),
                    other.transaction_type()
                )));
            }
        }
    };
}
pub(crate) use body;

/// A synthetic transaction queued for production at end of block.
#[derive(Debug, Clone)]
pub struct ProducedTxn {
    pub destination: Url,
    pub body: TransactionBody,
}

/// Side effects an execution hands back to the block runner.
#[derive(Debug, Clone, Default)]
pub struct ProducedState {
    pub produced: Vec<ProducedTxn>,
    /// Partition roots recorded on intermediate anchor chains during this
    /// execution, by source partition ID.
    pub received_anchors: Vec<(String, Hash)>,
    /// Transactions unwrapped from a forward, to be delivered in-block.
    pub forwarded: Vec<crate::delivery::Delivery>,
}

impl ProducedState {
    pub fn merge(&mut self, other: ProducedState) {
        self.produced.extend(other.produced);
        self.received_anchors.extend(other.received_anchors);
        self.forwarded.extend(other.forwarded);
    }

    /// Queues a synthetic transaction against a remote principal.
    pub fn did_produce(&mut self, destination: Url, body: TransactionBody) {
        self.produced.push(ProducedTxn { destination, body });
    }
}

/// The view an executor mutates: a child batch over the block batch plus
/// the execution context. Dropping it discards every staged write;
/// `commit` folds them into the block.
pub struct StateManager<'b, 'a> {
    batch: Batch<'b>,
    pub partition: &'b PartitionInfo,
    pub globals: &'b GlobalValues,
    pub router: &'b Router,
    pub block_index: u64,
    pub block_time: u64,
    txn_hash: Hash,
    principal_url: Url,
    principal: Option<Account>,
    state: ProducedState,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'b, 'a> StateManager<'b, 'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        batch: Batch<'b>, partition: &'b PartitionInfo,
        globals: &'b GlobalValues, router: &'b Router, block_index: u64,
        block_time: u64, transaction: &Transaction, principal: Option<Account>,
    ) -> StateManager<'b, 'a> {
        StateManager {
            batch,
            partition,
            globals,
            router,
            block_index,
            block_time,
            txn_hash: transaction.hash(),
            principal_url: transaction.header.principal.clone(),
            principal,
            state: ProducedState::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn txn_hash(&self) -> Hash { self.txn_hash }

    pub fn principal_url(&self) -> &Url { &self.principal_url }

    /// The principal account. Fails for executors that require one.
    pub fn principal(&self) -> Result<&Account> {
        self.principal.as_ref().ok_or_else(|| {
            Error::new(
                primitives::Status::InvalidPrincipal,
                format!("principal {} does not exist", self.principal_url),
            )
        })
    }

    pub fn principal_opt(&self) -> Option<&Account> { self.principal.as_ref() }

    pub fn batch(&mut self) -> &mut Batch<'b> { &mut self.batch }

    pub fn load_account(&self, url: &Url) -> Result<Option<Account>> {
        Ok(self.batch.get_account(url)?)
    }

    pub fn require_account(&self, url: &Url) -> Result<Account> {
        self.load_account(url)?
            .ok_or_else(|| Error::not_found(format!("{} not found", url)))
    }

    /// Creates an account on this partition, registering it under its
    /// identity's directory.
    pub fn create(&mut self, account: Account) -> Result<()> {
        let url = account.url().clone();
        if !self.router.routes_to(&url, &self.partition.id)? {
            return Err(Error::internal(format!(
                "{} does not route to {}; a synthetic transaction must \
                 create it",
                url, self.partition.id
            )));
        }
        if self.batch.account_exists(&url)? {
            return Err(Error::bad_request(format!("{} already exists", url)));
        }
        self.batch.put_account(&account)?;
        if !url.is_root_identity() {
            self.batch.add_directory_entry(&url.identity(), &url)?;
        }
        Ok(())
    }

    /// Stores a changed account. The account must already exist.
    pub fn update(&mut self, account: &Account) -> Result<()> {
        self.batch.put_account(account)?;
        if account.url() == &self.principal_url {
            self.principal = Some(account.clone());
        }
        Ok(())
    }

    /// Queues a synthetic transaction to `destination`, stamped with this
    /// transaction as its cause.
    pub fn submit(&mut self, destination: Url, mut body: TransactionBody) {
        if let Some(origin) = body.synthetic_origin_mut() {
            origin.cause = self.txn_hash;
            origin.source = self.partition.node_url();
        }
        self.state.did_produce(destination, body);
    }

    /// Records that a peer partition's root landed on an intermediate
    /// anchor chain; the block runner releases transactions waiting on it.
    pub fn did_receive_anchor(&mut self, source: &str, root: Hash) {
        self.state.received_anchors.push((source.to_lowercase(), root));
    }

    /// Queues an unwrapped forwarded transaction for in-block delivery.
    pub fn forward(
        &mut self, transaction: Transaction,
        signatures: Vec<primitives::Signature>,
    ) {
        let mut delivery =
            crate::delivery::Delivery::new(transaction, signatures);
        delivery.internal = true;
        self.state.forwarded.push(delivery);
    }

    /// Applies the authority list of a create transaction, defaulting to
    /// the principal identity's first authority when none is named.
    pub fn build_auth(
        &self, authorities: &[Url],
    ) -> Result<primitives::AccountAuth> {
        let mut auth = primitives::AccountAuth::default();
        if authorities.is_empty() {
            let principal = self.principal()?;
            let inherited = principal
                .auth()
                .and_then(|a| a.authorities.first())
                .map(|a| a.url.clone())
                .or_else(|| match principal {
                    Account::KeyBook(book) => Some(book.url.clone()),
                    _ => None,
                })
                .ok_or_else(|| {
                    Error::bad_request(
                        "no authorities specified and none to inherit",
                    )
                })?;
            auth.add_authority(inherited);
        } else {
            for url in authorities {
                auth.add_authority(url.clone());
            }
        }
        Ok(auth)
    }

    /// Folds staged writes into the block batch and hands back the
    /// produced side effects.
    pub fn commit(self) -> Result<ProducedState> {
        self.batch.commit()?;
        Ok(self.state)
    }
}

/// An executor for one transaction type.
///
/// `validate` runs at admission (CheckTx) with no chain mutation;
/// `execute` runs at delivery and must be deterministic given the batch
/// view. The remaining methods are optional capabilities.
pub trait TransactionExecutor: Send + Sync {
    fn transaction_type(&self) -> TransactionType;

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>>;

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>>;

    /// Whether this type may execute without an existing principal.
    /// `None` falls back to the engine's default rules.
    fn allow_missing_principal(&self, _txn: &Transaction) -> Option<bool> {
        None
    }

    /// Overrides the default ready predicate. `None` falls back.
    fn transaction_is_ready(
        &self, _batch: &mut Batch<'_>, _txn: &Transaction,
        _status: &TransactionStatus,
    ) -> Result<Option<bool>> {
        Ok(None)
    }

    /// Post-failure hook, e.g. to refund a synthetic deposit.
    fn did_fail(
        &self, _state: &mut ProducedState, _txn: &Transaction,
    ) -> Result<()> {
        Ok(())
    }
}

/// The executor registry: transaction type to implementation, fixed at
/// startup.
pub struct Registry {
    executors: HashMap<TransactionType, Box<dyn TransactionExecutor>>,
}

impl Registry {
    /// Builds a registry. Registering two executors for one type is a
    /// configuration bug and panics.
    pub fn new(executors: Vec<Box<dyn TransactionExecutor>>) -> Registry {
        let mut map: HashMap<TransactionType, Box<dyn TransactionExecutor>> =
            HashMap::new();
        for executor in executors {
            let typ = executor.transaction_type();
            if map.insert(typ, executor).is_some() {
                panic!("duplicate executor registered for {}", typ);
            }
        }
        Registry { executors: map }
    }

    /// Every standard executor.
    pub fn standard() -> Registry {
        Registry::new(vec![
            Box::new(create_identity::CreateIdentity),
            Box::new(create_token_account::CreateTokenAccount),
            Box::new(send_tokens::SendTokens),
            Box::new(create_data_account::CreateDataAccount),
            Box::new(write_data::WriteData),
            Box::new(write_data_to::WriteDataTo),
            Box::new(create_token::CreateToken),
            Box::new(issue_tokens::IssueTokens),
            Box::new(burn_tokens::BurnTokens),
            Box::new(create_key_page::CreateKeyPage),
            Box::new(create_key_book::CreateKeyBook),
            Box::new(add_credits::AddCredits),
            Box::new(update_key_page::UpdateKeyPage),
            Box::new(update_key::UpdateKey),
            Box::new(update_account_auth::UpdateAccountAuth),
            Box::new(system::AcmeFaucet),
            Box::new(synthetic_create_identity::SyntheticCreateIdentity),
            Box::new(synthetic_write_data::SyntheticWriteData),
            Box::new(synthetic_deposit_tokens::SyntheticDepositTokens),
            Box::new(synthetic_deposit_credits::SyntheticDepositCredits),
            Box::new(synthetic_burn_tokens::SyntheticBurnTokens),
            Box::new(synthetic_forward::SyntheticForward),
            Box::new(system::SystemGenesis),
            Box::new(system::SystemWriteData),
            Box::new(system::DirectoryAnchor),
            Box::new(system::PartitionAnchor),
        ])
    }

    pub fn get(&self, typ: TransactionType) -> Option<&dyn TransactionExecutor> {
        self.executors.get(&typ).map(Box::as_ref)
    }
}

/// Credits tokens to a local account, creating a lite token account (and
/// its lite identity) on first deposit to a lite address.
pub(crate) fn deposit_tokens_local(
    st: &mut StateManager<'_, '_>, recipient: &Url, token: &Url, amount: u128,
) -> Result<()> {
    match st.load_account(recipient)? {
        Some(Account::TokenAccount(mut account)) => {
            if account.token_url != *token {
                return Err(Error::bad_request(format!(
                    "token mismatch: {} holds {}, deposit is {}",
                    recipient, account.token_url, token
                )));
            }
            account.balance = account.balance.saturating_add(amount);
            st.update(&Account::TokenAccount(account))
        }
        Some(Account::LiteTokenAccount(mut account)) => {
            if account.token_url != *token {
                return Err(Error::bad_request(format!(
                    "token mismatch: {} holds {}, deposit is {}",
                    recipient, account.token_url, token
                )));
            }
            account.balance = account.balance.saturating_add(amount);
            st.update(&Account::LiteTokenAccount(account))
        }
        Some(other) => Err(Error::bad_request(format!(
            "{} is not a token account (type {})",
            recipient,
            other.account_type().code()
        ))),
        None => {
            let (_key, lite_token) =
                acd_types::parse_lite_token_address(recipient).map_err(
                    |_| {
                        Error::not_found(format!(
                            "recipient {} does not exist",
                            recipient
                        ))
                    },
                )?;
            if lite_token != *token {
                return Err(Error::bad_request(format!(
                    "lite address {} does not hold {}",
                    recipient, token
                )));
            }
            let identity = recipient.root_identity();
            if st.load_account(&identity)?.is_none() {
                st.create(Account::LiteIdentity(primitives::LiteIdentity {
                    url: identity,
                    credit_balance: 0,
                    last_used: 0,
                }))?;
            }
            st.create(Account::LiteTokenAccount(
                primitives::LiteTokenAccount {
                    url: recipient.clone(),
                    token_url: token.clone(),
                    balance: amount,
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "duplicate executor")]
    fn duplicate_registration_panics() {
        Registry::new(vec![
            Box::new(send_tokens::SendTokens),
            Box::new(send_tokens::SendTokens),
        ]);
    }

    #[test]
    fn standard_registry_covers_the_type_set() {
        let registry = Registry::standard();
        for typ in [
            TransactionType::CreateIdentity,
            TransactionType::SendTokens,
            TransactionType::WriteData,
            TransactionType::UpdateKey,
            TransactionType::SyntheticDepositTokens,
            TransactionType::SystemGenesis,
            TransactionType::DirectoryAnchor,
            TransactionType::PartitionAnchor,
        ] {
            assert!(registry.get(typ).is_some(), "missing executor for {}", typ);
        }
        assert!(registry.get(TransactionType::Remote).is_none());
    }
}
