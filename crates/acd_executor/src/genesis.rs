// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Genesis: builds a partition's system accounts and delivers the
//! genesis transaction as block 0.

use crate::{block::BlockExecutor, delivery::Delivery};
use acd_types::consts;
use primitives::{
    key_page::{KeyPage, KeySpec},
    network::{GlobalValues, NetworkDefinition, Oracle, RoutingTable},
    Account, AccountAuth, AnchorLedger, DataAccount, Identity, KeyBook,
    Result, SyntheticLedger, SystemLedger, TokenIssuer, Transaction,
    TransactionBody,
};

/// Parameters for block 0.
#[derive(Debug, Clone)]
pub struct GenesisConfig {
    pub network: NetworkDefinition,
    pub routing: RoutingTable,
    /// Key hashes of the operator page.
    pub operator_keys: Vec<Vec<u8>>,
    pub oracle_price: u64,
    pub timestamp: u64,
    /// Additional accounts seeded at genesis; each lands on the
    /// partition it routes to.
    pub extra_accounts: Vec<Account>,
}

impl GenesisConfig {
    pub fn new(
        network: NetworkDefinition, operator_keys: Vec<Vec<u8>>,
    ) -> GenesisConfig {
        GenesisConfig {
            network,
            routing: RoutingTable::default(),
            operator_keys,
            oracle_price: primitives::fees::ORACLE_PRECISION,
            timestamp: 1,
            extra_accounts: Vec::new(),
        }
    }

    /// The network variables genesis starts from.
    pub fn values(&self) -> GlobalValues {
        GlobalValues {
            oracle: Oracle { price: self.oracle_price },
            network: self.network.clone(),
            ..Default::default()
        }
    }
}

/// Creates the partition's system accounts and delivers the genesis
/// transaction into the open block 0.
pub fn populate(
    block: &mut BlockExecutor<'_>, config: &GenesisConfig,
) -> Result<()> {
    let info = block.partition;
    let node = info.node_url();
    let book_url = info.operator_book_url();
    let values = config.values();

    let batch = block.batch();

    // The partition ADI and its operator book.
    batch.put_account(&Account::Identity(Identity {
        url: node.clone(),
        auth: AccountAuth::with_authority(book_url.clone()),
    }))?;
    batch.put_account(&Account::KeyBook(KeyBook {
        url: book_url.clone(),
        auth: AccountAuth::with_authority(book_url.clone()),
        page_count: 1,
    }))?;
    batch.add_directory_entry(&node, &book_url)?;
    let threshold = values
        .globals
        .validator_threshold
        .threshold(config.operator_keys.len());
    batch.put_account(&Account::KeyPage(KeyPage {
        url: info.operator_page_url(),
        accept_threshold: threshold,
        version: 1,
        keys: config
            .operator_keys
            .iter()
            .map(|key| KeySpec {
                public_key_hash: key.clone(),
                delegate: None,
                last_used: 0,
            })
            .collect(),
        ..Default::default()
    }))?;
    batch.add_directory_entry(&book_url, &info.operator_page_url())?;

    // Ledgers.
    batch.put_account(&Account::SystemLedger(SystemLedger {
        url: info.ledger_url(),
        ..Default::default()
    }))?;
    batch.add_directory_entry(&node, &info.ledger_url())?;
    batch.put_account(&Account::SyntheticLedger(SyntheticLedger {
        url: info.synthetic_url(),
        ..Default::default()
    }))?;
    batch.add_directory_entry(&node, &info.synthetic_url())?;
    batch.put_account(&Account::AnchorLedger(AnchorLedger {
        url: info.anchor_pool_url(),
        ..Default::default()
    }))?;
    batch.add_directory_entry(&node, &info.anchor_pool_url())?;

    // Network variable accounts, seeded with the genesis values.
    let variables = [
        (consts::ORACLE, Some(values.oracle_entry())),
        (consts::GLOBALS, None),
        (consts::NETWORK, Some(values.network_entry())),
        (consts::ROUTING, None),
        (consts::VOTES, None),
        (consts::EVIDENCE, None),
    ];
    for (name, entry) in variables {
        let url = node.join(name);
        batch.put_account(&Account::DataAccount(DataAccount {
            url: url.clone(),
            auth: AccountAuth::with_authority(book_url.clone()),
            entry: entry.clone(),
        }))?;
        batch.add_directory_entry(&node, &url)?;
    }

    // Seed accounts, each on the partition that owns it.
    for account in &config.extra_accounts {
        if !block.router.routes_to(account.url(), &info.id)? {
            continue;
        }
        let batch = block.batch();
        batch.put_account(account)?;
        let url = account.url();
        if !url.is_root_identity() {
            batch.add_directory_entry(&url.identity(), url)?;
        }
    }

    let batch = block.batch();

    // The ACME issuer lives on the Directory.
    if info.is_directory() {
        batch.put_account(&Account::TokenIssuer(TokenIssuer {
            url: consts::acme_url(),
            auth: AccountAuth::with_authority(book_url.clone()),
            symbol: "ACME".to_string(),
            precision: 8,
            supply_limit: 500_000_000 * 100_000_000,
            issued: 0,
        }))?;
    }

    // Deliver the genesis transaction itself.
    let genesis = Transaction::new(
        node,
        TransactionBody::SystemGenesis(Default::default()),
    );
    block.deliver(Delivery::internal(genesis))?;
    Ok(())
}
