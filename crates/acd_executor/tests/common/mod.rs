// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! A miniature multi-partition network: one engine per partition over
//! in-memory stores, joined by a loopback dispatcher. The test driver
//! plays the consensus role, pumping queued envelopes into blocks.

use acd_executor::{
    genesis::GenesisConfig, BlockMeta, Dispatcher, Engine, EngineOptions,
    LoopbackDispatcher, PartitionInfo, Router,
};
use acd_kv::MemoryStore;
use acd_types::{consts, lite_identity_url, lite_token_account_url, sha256, Hash, Url};
use ed25519_dalek::SigningKey;
use primitives::{
    network::{NetworkDefinition, RouteOverride, RoutingTable},
    signing::sign_ed25519,
    Account, Envelope, LiteIdentity, LiteTokenAccount, Signature, Transaction,
    TransactionStatus,
};
use std::{collections::BTreeMap, sync::Arc};

pub use acd_executor::engine::BlockOutcome;

pub struct SimBuilder {
    bvns: Vec<String>,
    seeds: Vec<Account>,
    overrides: Vec<RouteOverride>,
}

impl SimBuilder {
    pub fn new(bvns: &[&str]) -> SimBuilder {
        SimBuilder {
            bvns: bvns.iter().map(|s| s.to_string()).collect(),
            seeds: Vec::new(),
            // The ACME issuer lives on the directory.
            overrides: vec![RouteOverride {
                account: "acme".into(),
                partition: consts::DIRECTORY.into(),
            }],
        }
    }

    pub fn seed(mut self, account: Account) -> SimBuilder {
        self.seeds.push(account);
        self
    }

    /// Seeds a lite identity with credits and an ACME balance.
    pub fn seed_lite(
        mut self, key: &SigningKey, credits: u64, acme: u128,
    ) -> SimBuilder {
        self.seeds.push(Account::LiteIdentity(LiteIdentity {
            url: lite_id(key),
            credit_balance: credits,
            last_used: 0,
        }));
        if acme > 0 {
            self.seeds.push(Account::LiteTokenAccount(LiteTokenAccount {
                url: lite_acme(key),
                token_url: consts::acme_url(),
                balance: acme,
            }));
        }
        self
    }

    /// Pins an authority to a partition via a routing override.
    pub fn pin(mut self, authority: &str, partition: &str) -> SimBuilder {
        self.overrides.push(RouteOverride {
            account: authority.to_lowercase(),
            partition: partition.to_lowercase(),
        });
        self
    }

    pub fn build(self) -> Sim {
        let network =
            NetworkDefinition::for_bvns(
                &self.bvns.iter().map(String::as_str).collect::<Vec<_>>(),
            );
        let routing = RoutingTable { overrides: self.overrides };
        let dispatcher = Arc::new(LoopbackDispatcher::new());
        let router = Router::new(network.clone(), routing.clone());

        let mut partitions = vec![PartitionInfo::directory()];
        for bvn in &self.bvns {
            partitions.push(PartitionInfo::block_validator(bvn));
        }

        let mut engines = BTreeMap::new();
        let mut heights = BTreeMap::new();
        for info in partitions {
            let id = info.id.clone();
            let mut engine = Engine::new(
                MemoryStore::new(),
                EngineOptions {
                    partition: info,
                    dispatcher: dispatcher.clone() as Arc<dyn Dispatcher>,
                },
            );
            let mut config =
                GenesisConfig::new(network.clone(), vec![operator_key_hash()]);
            config.routing = routing.clone();
            config.extra_accounts = self.seeds.clone();
            engine.init_chain(config).expect("genesis");
            engines.insert(id.clone(), engine);
            heights.insert(id, 1u64);
        }

        Sim { dispatcher, engines, heights, router }
    }
}

pub struct Sim {
    pub dispatcher: Arc<LoopbackDispatcher>,
    pub engines: BTreeMap<String, Engine<MemoryStore>>,
    heights: BTreeMap<String, u64>,
    pub router: Router,
}

impl Sim {
    /// Executes a block on one partition with the given envelopes.
    pub fn step(&mut self, id: &str, envelopes: Vec<Envelope>) -> BlockOutcome {
        let height = self.heights.get_mut(id).expect("unknown partition");
        *height += 1;
        let meta = BlockMeta { index: *height, timestamp: *height };
        self.engines
            .get_mut(id)
            .expect("unknown partition")
            .execute_block(meta, envelopes)
            .expect("block execution")
    }

    /// Routes an envelope to its principal's partition and delivers it.
    pub fn submit(&mut self, envelope: Envelope) -> Vec<TransactionStatus> {
        let principal = envelope
            .transaction
            .as_ref()
            .map(|t| t.header.principal.clone())
            .expect("envelope has a transaction");
        let id = self.router.route(&principal).expect("routable");
        self.step(&id, vec![envelope]).statuses
    }

    /// Delivers every queued envelope, one block per partition. Returns
    /// how many envelopes were processed.
    pub fn relay_round(&mut self) -> usize {
        let ids: Vec<String> = self.engines.keys().cloned().collect();
        let mut processed = 0;
        for id in ids {
            let queued = self.dispatcher.drain(&id);
            if queued.is_empty() {
                continue;
            }
            processed += queued.len();
            self.step(&id, queued);
        }
        processed
    }

    pub fn run_rounds(&mut self, rounds: usize) {
        for _ in 0..rounds {
            self.relay_round();
        }
    }

    pub fn account(&self, id: &str, url: &Url) -> Option<Account> {
        let batch = self.engines[id].database().begin(false);
        batch.get_account(url).expect("get account")
    }

    pub fn status(&self, id: &str, hash: &Hash) -> TransactionStatus {
        let batch = self.engines[id].database().begin(false);
        batch.get_status(hash).expect("get status")
    }

    pub fn balance(&self, id: &str, url: &Url) -> u128 {
        match self.account(id, url) {
            Some(Account::TokenAccount(a)) => a.balance,
            Some(Account::LiteTokenAccount(a)) => a.balance,
            _ => 0,
        }
    }

    pub fn credits(&self, id: &str, url: &Url) -> u64 {
        match self.account(id, url) {
            Some(Account::LiteIdentity(a)) => a.credit_balance,
            Some(Account::KeyPage(a)) => a.credit_balance,
            _ => 0,
        }
    }
}

pub fn keypair(seed: u8) -> SigningKey { SigningKey::from_bytes(&[seed; 32]) }

pub fn operator_key_hash() -> Vec<u8> {
    sha256(keypair(0xEE).verifying_key().as_bytes()).as_bytes().to_vec()
}

pub fn key_hash(key: &SigningKey) -> Vec<u8> {
    sha256(key.verifying_key().as_bytes()).as_bytes().to_vec()
}

fn key_hash_20(key: &SigningKey) -> [u8; 20] {
    let mut kh = [0u8; 20];
    kh.copy_from_slice(&key_hash(key)[..20]);
    kh
}

pub fn lite_id(key: &SigningKey) -> Url { lite_identity_url(&key_hash_20(key)) }

pub fn lite_acme(key: &SigningKey) -> Url {
    lite_token_account_url(&key_hash_20(key), &consts::acme_url())
}

/// Signs a transaction as its initiator and wraps it in an envelope.
pub fn sign(
    key: &SigningKey, signer: Url, signer_version: u64, timestamp: u64,
    mut txn: Transaction,
) -> Envelope {
    // The initiator hash binds the signature metadata, which is
    // independent of the transaction hash.
    let probe =
        sign_ed25519(key, signer.clone(), signer_version, timestamp, &Hash::ZERO);
    txn.header.initiator = probe.metadata_hash();
    let signature =
        sign_ed25519(key, signer, signer_version, timestamp, &txn.hash());
    Envelope { signatures: vec![signature], transaction: Some(txn) }
}

/// Signs a transaction as its initiator through a delegation entry: the
/// key signs for `inner_signer`, and the signature counts toward
/// `delegator`'s slot that delegates to the inner signer's book.
pub fn sign_delegated(
    key: &SigningKey, inner_signer: Url, delegator: Url, signer_version: u64,
    timestamp: u64, mut txn: Transaction,
) -> Envelope {
    use primitives::DelegatedSignature;

    let probe = Signature::Delegated(DelegatedSignature {
        signature: Box::new(sign_ed25519(
            key,
            inner_signer.clone(),
            signer_version,
            timestamp,
            &Hash::ZERO,
        )),
        delegator: delegator.clone(),
    });
    txn.header.initiator = probe.metadata_hash();
    let signature = Signature::Delegated(DelegatedSignature {
        signature: Box::new(sign_ed25519(
            key,
            inner_signer,
            signer_version,
            timestamp,
            &txn.hash(),
        )),
        delegator,
    });
    Envelope { signatures: vec![signature], transaction: Some(txn) }
}

/// An additional signature for a transaction the destination already
/// holds.
pub fn sign_only(
    key: &SigningKey, signer: Url, signer_version: u64, timestamp: u64,
    txn_hash: &Hash,
) -> Envelope {
    let signature =
        sign_ed25519(key, signer, signer_version, timestamp, txn_hash);
    Envelope { signatures: vec![signature], transaction: None }
}

/// Finds the synthetic-deposit envelopes in a block outcome.
pub fn deposits_in(outcome: &BlockOutcome) -> Vec<(String, Envelope)> {
    outcome
        .sent
        .iter()
        .filter(|(_, env)| {
            env.transaction.as_ref().map_or(false, |t| {
                t.transaction_type().is_synthetic()
            })
        })
        .cloned()
        .collect()
}

/// The sequence number of a sequenced envelope.
pub fn sequence_of(envelope: &Envelope) -> Option<u64> {
    envelope.signatures.iter().find_map(|s| match s {
        Signature::Partition(p) => Some(p.sequence_number),
        _ => None,
    })
}
