// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Authority and key-page flows: thresholds, late signatures, key
//! rotation.

mod common;

use acd_types::Url;
use common::*;
use primitives::{
    key_page::{KeyPage, KeySpec},
    transaction::{SendTokens, TokenRecipient, UpdateKey},
    Account, AccountAuth, Identity, KeyBook, Status, TokenAccount,
    Transaction, TransactionBody,
};

fn url(s: &str) -> Url { Url::parse(s).unwrap() }

fn page(keys: &[&ed25519_dalek::SigningKey], threshold: u64) -> KeyPage {
    KeyPage {
        url: url("acc://alice/book/1"),
        credit_balance: 1_000_000,
        accept_threshold: threshold,
        version: 1,
        keys: keys
            .iter()
            .map(|key| KeySpec {
                public_key_hash: key_hash(key),
                delegate: None,
                last_used: 0,
            })
            .collect(),
        ..Default::default()
    }
}

fn alice_accounts(page: KeyPage) -> Vec<Account> {
    vec![
        Account::Identity(Identity {
            url: url("acc://alice"),
            auth: AccountAuth::with_authority(url("acc://alice/book")),
        }),
        Account::KeyBook(KeyBook {
            url: url("acc://alice/book"),
            auth: AccountAuth::with_authority(url("acc://alice/book")),
            page_count: 1,
        }),
        Account::KeyPage(page),
        Account::TokenAccount(TokenAccount {
            url: url("acc://alice/tokens"),
            auth: AccountAuth::with_authority(url("acc://alice/book")),
            token_url: acd_types::consts::acme_url(),
            balance: 100,
        }),
    ]
}

/// Scenario: a 2-of-3 page. One signature leaves the transaction
/// pending; the second delivers it; a third is rejected.
#[test]
fn threshold_collects_signatures_across_envelopes() {
    let k1 = keypair(21);
    let k2 = keypair(22);
    let k3 = keypair(23);
    let receiver = keypair(24);
    let mut builder = SimBuilder::new(&["a"])
        .pin("alice", "a")
        .pin(lite_acme(&receiver).authority(), "a");
    for account in alice_accounts(page(&[&k1, &k2, &k3], 2)) {
        builder = builder.seed(account);
    }
    let mut sim = builder.build();

    let txn = Transaction::new(
        url("acc://alice/tokens"),
        TransactionBody::SendTokens(SendTokens {
            to: vec![TokenRecipient { url: lite_acme(&receiver), amount: 10 }],
        }),
    );
    let page_url = url("acc://alice/book/1");

    // First signature: pending.
    let statuses =
        sim.step("a", vec![sign(&k1, page_url.clone(), 1, 1, txn.clone())]);
    assert_eq!(statuses.statuses[0].code, Status::Pending);
    assert_eq!(sim.balance("a", &url("acc://alice/tokens")), 100);

    // Second signature, different key: delivered.
    let statuses = sim.step(
        "a",
        vec![sign_only(&k2, page_url.clone(), 1, 2, &txn.hash())],
    );
    assert_eq!(statuses.statuses[0].code, Status::Delivered);
    assert_eq!(sim.balance("a", &url("acc://alice/tokens")), 90);
    assert_eq!(sim.balance("a", &lite_acme(&receiver)), 10);

    // Third signature after delivery: rejected.
    let statuses =
        sim.step("a", vec![sign_only(&k3, page_url, 1, 3, &txn.hash())]);
    assert_eq!(statuses.statuses[0].code, Status::InvalidSignature);
    assert!(statuses.statuses[0].message.contains("already delivered"));
    // And nothing moved.
    assert_eq!(sim.balance("a", &url("acc://alice/tokens")), 90);
}

/// UpdateKey is always single-signature: the signing key replaces itself
/// even on a page with a higher threshold.
#[test]
fn update_key_rotates_the_signing_key() {
    let k1 = keypair(25);
    let k2 = keypair(26);
    let replacement = keypair(27);
    let mut builder = SimBuilder::new(&["a"]).pin("alice", "a");
    for account in alice_accounts(page(&[&k1, &k2], 2)) {
        builder = builder.seed(account);
    }
    let mut sim = builder.build();

    let page_url = url("acc://alice/book/1");
    let txn = Transaction::new(
        page_url.clone(),
        TransactionBody::UpdateKey(UpdateKey {
            new_key_hash: key_hash(&replacement),
        }),
    );
    let statuses =
        sim.step("a", vec![sign(&k1, page_url.clone(), 1, 1, txn)]);
    assert_eq!(statuses.statuses[0].code, Status::Delivered);

    match sim.account("a", &page_url) {
        Some(Account::KeyPage(page)) => {
            assert!(page.entry_index(&key_hash(&replacement)).is_some());
            assert!(page.entry_index(&key_hash(&k1)).is_none());
            assert!(page.entry_index(&key_hash(&k2)).is_some());
            assert_eq!(page.version, 2, "rotation bumps the page version");
        }
        other => panic!("missing page: {:?}", other),
    }
}

/// A delegation entry satisfies its page: alice's page holds no usable
/// key of its own, only a slot delegated to the ops book, and a
/// transaction signed solely through that delegate is delivered.
#[test]
fn delegated_signature_satisfies_the_page() {
    let ops_key = keypair(31);
    let placeholder = keypair(32);
    let receiver = keypair(33);

    let mut builder = SimBuilder::new(&["a"])
        .pin("alice", "a")
        .pin("ops", "a")
        .pin(lite_acme(&receiver).authority(), "a");
    // Alice's page delegates its only slot to the ops book.
    for account in alice_accounts(KeyPage {
        url: url("acc://alice/book/1"),
        accept_threshold: 1,
        version: 1,
        keys: vec![KeySpec {
            public_key_hash: key_hash(&placeholder),
            delegate: Some(url("acc://ops/book")),
            last_used: 0,
        }],
        ..Default::default()
    }) {
        builder = builder.seed(account);
    }
    builder = builder
        .seed(Account::Identity(Identity {
            url: url("acc://ops"),
            auth: AccountAuth::with_authority(url("acc://ops/book")),
        }))
        .seed(Account::KeyBook(KeyBook {
            url: url("acc://ops/book"),
            auth: AccountAuth::with_authority(url("acc://ops/book")),
            page_count: 1,
        }))
        .seed(Account::KeyPage(KeyPage {
            url: url("acc://ops/book/1"),
            credit_balance: 1_000_000,
            accept_threshold: 1,
            version: 1,
            keys: vec![KeySpec {
                public_key_hash: key_hash(&ops_key),
                delegate: None,
                last_used: 0,
            }],
            ..Default::default()
        }));
    let mut sim = builder.build();

    let txn = Transaction::new(
        url("acc://alice/tokens"),
        TransactionBody::SendTokens(SendTokens {
            to: vec![TokenRecipient { url: lite_acme(&receiver), amount: 10 }],
        }),
    );
    let envelope = sign_delegated(
        &ops_key,
        url("acc://ops/book/1"),
        url("acc://alice/book/1"),
        1,
        1,
        txn,
    );
    let outcome = sim.step("a", vec![envelope]);
    assert_eq!(outcome.statuses[0].code, Status::Delivered);
    assert_eq!(sim.balance("a", &url("acc://alice/tokens")), 90);
    assert_eq!(sim.balance("a", &lite_acme(&receiver)), 10);

    // The inner signer paid the fee, not alice's page.
    assert!(sim.credits("a", &url("acc://ops/book/1")) < 1_000_000);
    assert_eq!(sim.credits("a", &url("acc://alice/book/1")), 0);
}

/// A signature from a key that is not on the page is rejected outright.
#[test]
fn unauthorized_key_is_rejected() {
    let k1 = keypair(28);
    let outsider = keypair(29);
    let receiver = keypair(30);
    let mut builder = SimBuilder::new(&["a"])
        .pin("alice", "a")
        .pin(lite_acme(&receiver).authority(), "a");
    for account in alice_accounts(page(&[&k1], 1)) {
        builder = builder.seed(account);
    }
    let mut sim = builder.build();

    let txn = Transaction::new(
        url("acc://alice/tokens"),
        TransactionBody::SendTokens(SendTokens {
            to: vec![TokenRecipient { url: lite_acme(&receiver), amount: 10 }],
        }),
    );
    let statuses = sim.step(
        "a",
        vec![sign(&outsider, url("acc://alice/book/1"), 1, 1, txn)],
    );
    assert_eq!(statuses.statuses[0].code, Status::Unauthorized);
    assert_eq!(sim.balance("a", &url("acc://alice/tokens")), 100);
}
