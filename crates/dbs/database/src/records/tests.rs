// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{batch::Database, types::SigOrTxn};
use acd_kv::MemoryStore;
use acd_types::{sha256, Hash, TxId, Url};
use primitives::{
    Account, AccountAuth, Identity, Status, TransactionStatus,
};

fn url(s: &str) -> Url { Url::parse(s).unwrap() }

fn identity(s: &str) -> Account {
    Account::Identity(Identity {
        url: url(s),
        auth: AccountAuth::with_authority(url(s).join("book")),
    })
}

fn txid(s: &str, n: u8) -> TxId { TxId::new(url(s), sha256(&[n])) }

#[test]
fn accounts_round_trip_through_commit() {
    let db = Database::new(MemoryStore::new());
    {
        let mut batch = db.begin(true);
        batch.put_account(&identity("acc://alice")).unwrap();
        batch.commit().unwrap();
    }
    let batch = db.begin(false);
    let loaded = batch.get_account(&url("acc://alice")).unwrap().unwrap();
    assert_eq!(loaded, identity("acc://alice"));
    assert!(batch.get_account(&url("acc://bob")).unwrap().is_none());
}

#[test]
fn read_only_batches_reject_writes() {
    let db = Database::new(MemoryStore::new());
    let mut batch = db.begin(false);
    assert!(batch.put_account(&identity("acc://alice")).is_err());
}

#[test]
fn child_batches_fold_into_parents() {
    let db = Database::new(MemoryStore::new());
    let mut parent = db.begin(true);
    {
        let mut child = parent.begin();
        child.put_account(&identity("acc://alice")).unwrap();
        // Visible inside the child before commit.
        assert!(child.account_exists(&url("acc://alice")).unwrap());
        child.commit().unwrap();
    }
    assert!(parent.account_exists(&url("acc://alice")).unwrap());

    {
        let mut child = parent.begin();
        child.put_account(&identity("acc://bob")).unwrap();
        // Dropped without commit: discarded.
    }
    assert!(!parent.account_exists(&url("acc://bob")).unwrap());

    parent.commit().unwrap();
    let batch = db.begin(false);
    assert!(batch.account_exists(&url("acc://alice")).unwrap());
    assert!(!batch.account_exists(&url("acc://bob")).unwrap());
}

#[test]
fn pending_set_is_sorted_and_deduplicated() {
    let db = Database::new(MemoryStore::new());
    let mut batch = db.begin(true);
    let account = url("acc://alice/tokens");
    let a = txid("acc://alice/tokens", 1);
    let b = txid("acc://alice/tokens", 2);
    batch.add_pending(&account, &b).unwrap();
    batch.add_pending(&account, &a).unwrap();
    batch.add_pending(&account, &a).unwrap();

    let mut expect = vec![a.clone(), b.clone()];
    expect.sort();
    assert_eq!(batch.account_pending(&account).unwrap(), expect);

    batch.remove_pending(&account, &a).unwrap();
    assert_eq!(batch.account_pending(&account).unwrap(), vec![b]);
}

#[test]
fn chains_register_and_persist() {
    let db = Database::new(MemoryStore::new());
    let account = url("acc://alice/tokens");
    {
        let mut batch = db.begin(true);
        let mut accessor = batch.account_chain(&account, "main");
        let mut chain = accessor.open().unwrap();
        chain.add_entry(sha256(b"tx1")).unwrap();
        chain.add_entry(sha256(b"tx2")).unwrap();
        let chains = batch.account_chains(&account).unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].name, "main");
        let updates = batch.take_chain_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, "main");
        batch.commit().unwrap();
    }
    let mut batch = db.begin(false);
    let mut accessor = batch.account_chain(&account, "main");
    let mut chain = accessor.open().unwrap();
    assert_eq!(chain.height(), 2);
    assert_eq!(chain.entry(0).unwrap(), sha256(b"tx1"));
    assert_eq!(chain.height_of(&sha256(b"tx2")).unwrap(), Some(1));
}

#[test]
fn transaction_records_and_statuses() {
    let db = Database::new(MemoryStore::new());
    let mut batch = db.begin(true);
    let hash = sha256(b"txn");

    // Missing status decodes as the zero status.
    assert_eq!(batch.get_status(&hash).unwrap().code, Status::Unknown);

    batch.put_transaction(&hash, &SigOrTxn::default()).unwrap();
    let mut status = TransactionStatus::default();
    status.code = Status::Pending;
    status.sequence_number = 4;
    batch.put_status(&hash, &status).unwrap();
    assert_eq!(batch.get_status(&hash).unwrap(), status);
}

#[test]
fn bpt_root_tracks_account_changes_deterministically() {
    let run = |accounts: &[&str]| -> Hash {
        let db = Database::new(MemoryStore::new());
        let mut batch = db.begin(true);
        for name in accounts {
            batch.put_account(&identity(name)).unwrap();
        }
        batch.commit().unwrap().unwrap()
    };

    // Insertion order does not matter.
    let a = run(&["acc://alice", "acc://bob", "acc://carol"]);
    let b = run(&["acc://carol", "acc://alice", "acc://bob"]);
    assert_eq!(a, b);

    // Contents do.
    let c = run(&["acc://alice", "acc://bob"]);
    assert_ne!(a, c);

    // The committed root is readable from a fresh batch.
    let db = Database::new(MemoryStore::new());
    let mut batch = db.begin(true);
    batch.put_account(&identity("acc://alice")).unwrap();
    let committed = batch.commit().unwrap().unwrap();
    let mut reader = db.begin(false);
    assert_eq!(reader.bpt_root().unwrap(), committed);
}

#[test]
fn bpt_entry_reflects_chain_and_data_state() {
    let db = Database::new(MemoryStore::new());
    let account = url("acc://alice/data");

    let mut batch = db.begin(true);
    batch.put_account(&identity("acc://alice/data")).unwrap();
    let first = batch.refresh_bpt().unwrap();

    batch
        .add_data_entry(&account, &sha256(b"entry"), &sha256(b"txn"))
        .unwrap();
    let second = batch.refresh_bpt().unwrap();
    assert_ne!(first, second, "data entries must move the account state");

    let mut accessor = batch.account_chain(&account, "main");
    accessor.open().unwrap().add_entry(sha256(b"txn")).unwrap();
    let third = batch.refresh_bpt().unwrap();
    assert_ne!(second, third, "chain growth must move the account state");
}
