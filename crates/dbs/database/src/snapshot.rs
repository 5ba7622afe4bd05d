// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Snapshot export and import. A snapshot is a header (partition, height,
//! time, BPT root), the account records walked in BPT key order, and the
//! transactions those accounts reference. Import replays everything and
//! refuses the snapshot if the rebuilt BPT root does not match the header.

use crate::{
    batch::{Batch, Database},
    errors::{DbError, DbResult},
    records::chain_names,
    types::SigOrTxn,
};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_kv::KeyValueStore;
use acd_merkle::MerkleError;
use acd_types::{Hash, TxId, Url};
use std::collections::BTreeSet;

pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u64,
    pub partition: Url,
    pub height: u64,
    pub timestamp: u64,
    pub root: Hash,
}

impl Encodable for SnapshotHeader {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.version);
        w.write_url(2, &self.partition);
        w.write_uint(3, self.height);
        w.write_uint(4, self.timestamp);
        w.write_hash(5, &self.root);
    }
}

impl Decodable for SnapshotHeader {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SnapshotHeader {
            version: r.read_uint(1)?,
            partition: r.read_required_url(2)?,
            height: r.read_uint(3)?,
            timestamp: r.read_uint(4)?,
            root: r.read_hash(5)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ChainSnapshot {
    name: String,
    entries: Vec<Hash>,
}

impl Encodable for ChainSnapshot {
    fn append(&self, w: &mut Writer) {
        w.write_string(1, &self.name);
        w.write_hashes(2, &self.entries);
    }
}

impl Decodable for ChainSnapshot {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(ChainSnapshot {
            name: r.read_string(1)?,
            entries: r.read_hashes(2)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct AccountRecord {
    url: Url,
    main: Vec<u8>,
    pending: Vec<TxId>,
    directory: Vec<Url>,
    chains: Vec<ChainSnapshot>,
    // (entry hash, writing transaction hash) pairs, in order.
    data: Vec<(Hash, Hash)>,
}

impl Encodable for AccountRecord {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.url);
        w.write_bytes(2, &self.main);
        w.write_txids(3, &self.pending);
        w.write_urls(4, &self.directory);
        w.write_values(5, &self.chains);
        let mut flat = Vec::with_capacity(self.data.len() * 2);
        for (entry, txn) in &self.data {
            flat.push(*entry);
            flat.push(*txn);
        }
        w.write_hashes(6, &flat);
    }
}

impl Decodable for AccountRecord {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        let url = r.read_required_url(1)?;
        let main = r.read_bytes(2)?;
        let pending = r.read_txids(3)?;
        let directory = r.read_urls(4)?;
        let chains = r.read_values(5)?;
        let flat = r.read_hashes(6)?;
        if flat.len() % 2 != 0 {
            return Err(DecoderError::InvalidValue(
                "account record",
                "odd data-entry pair count".into(),
            ));
        }
        let data =
            flat.chunks(2).map(|pair| (pair[0], pair[1])).collect::<Vec<_>>();
        Ok(AccountRecord { url, main, pending, directory, chains, data })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct TxRecord {
    hash: Hash,
    main: Vec<u8>,
    status: Vec<u8>,
}

impl Encodable for TxRecord {
    fn append(&self, w: &mut Writer) {
        w.write_hash(1, &self.hash);
        w.write_bytes(2, &self.main);
        w.write_bytes(3, &self.status);
    }
}

impl Decodable for TxRecord {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(TxRecord {
            hash: r.read_hash(1)?,
            main: r.read_bytes(2)?,
            status: r.read_bytes(3)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Snapshot {
    header: SnapshotHeader,
    accounts: Vec<AccountRecord>,
    transactions: Vec<TxRecord>,
}

impl Encodable for Snapshot {
    fn append(&self, w: &mut Writer) {
        w.write_value(1, &self.header);
        w.write_values(2, &self.accounts);
        w.write_values(3, &self.transactions);
    }
}

impl Decodable for Snapshot {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(Snapshot {
            header: r.read_value(1)?.ok_or(DecoderError::MissingField(1))?,
            accounts: r.read_values(2)?,
            transactions: r.read_values(3)?,
        })
    }
}

/// Exports the full state of a partition.
pub fn export(
    batch: &mut Batch<'_>, partition: &Url, height: u64, timestamp: u64,
) -> DbResult<Vec<u8>> {
    let root = batch.bpt_root()?;
    let leaves = batch.bpt_range(&Hash::ZERO, usize::MAX)?;

    let mut accounts = Vec::with_capacity(leaves.len());
    let mut txn_hashes = BTreeSet::new();
    for (account_id, state_hash) in leaves {
        let url = batch.account_url_by_state(&state_hash)?.ok_or_else(|| {
            DbError::Merkle(MerkleError::Store(format!(
                "no account for BPT leaf {:?}",
                account_id
            )))
        })?;
        accounts.push(export_account(batch, &url, &mut txn_hashes)?);
    }

    let mut transactions = Vec::new();
    for hash in txn_hashes {
        let main = match batch.get_transaction(&hash)? {
            None => continue,
            Some(main) => acd_encoding::encode(&main),
        };
        let status = acd_encoding::encode(&batch.get_status(&hash)?);
        transactions.push(TxRecord { hash, main, status });
    }

    let snapshot = Snapshot {
        header: SnapshotHeader {
            version: SNAPSHOT_VERSION,
            partition: partition.clone(),
            height,
            timestamp,
            root,
        },
        accounts,
        transactions,
    };
    Ok(acd_encoding::encode(&snapshot))
}

fn export_account(
    batch: &mut Batch<'_>, url: &Url, txn_hashes: &mut BTreeSet<Hash>,
) -> DbResult<AccountRecord> {
    let main = batch
        .get_raw_record(
            &crate::key::RecordKey::new()
                .append("Account")
                .append(url)
                .append("Main"),
        )?
        .unwrap_or_default();
    let pending = batch.account_pending(url)?;
    for txid in &pending {
        txn_hashes.insert(txid.hash());
    }
    let directory = batch.account_directory(url)?;

    let metadata = batch.account_chains(url)?;
    let mut chains = Vec::with_capacity(metadata.len());
    for meta in metadata {
        let mut accessor = batch.account_chain(url, &meta.name);
        let mut chain = accessor.open()?;
        let height = chain.height();
        let entries = chain.entries(0, height)?;
        if matches!(
            meta.name.as_str(),
            chain_names::MAIN | chain_names::SCRATCH | chain_names::SIGNATURE
        ) {
            txn_hashes.extend(entries.iter().copied());
        }
        chains.push(ChainSnapshot { name: meta.name, entries });
    }

    let count = batch.data_entry_count(url)?;
    let mut data = Vec::with_capacity(count as usize);
    for index in 0..count {
        let entry = batch.data_entry_hash(url, index)?.ok_or_else(|| {
            DbError::Merkle(MerkleError::Store(format!(
                "data entry {} of {} is missing",
                index, url
            )))
        })?;
        let txn = batch.data_transaction(url, &entry)?.unwrap_or(Hash::ZERO);
        data.push((entry, txn));
    }

    Ok(AccountRecord {
        url: url.clone(),
        main,
        pending,
        directory,
        chains,
        data,
    })
}

/// Imports a snapshot into an empty database. Fails without committing if
/// the rebuilt BPT root does not match the snapshot header.
pub fn import<S: KeyValueStore>(
    db: &Database<S>, bytes: &[u8],
) -> DbResult<SnapshotHeader> {
    let snapshot: Snapshot = acd_encoding::decode(bytes)?;
    let mut batch = db.begin(true);

    for account in &snapshot.accounts {
        if !account.main.is_empty() {
            batch.put_raw_record(
                &crate::key::RecordKey::new()
                    .append("Account")
                    .append(&account.url)
                    .append("Main"),
                account.main.clone(),
            )?;
            batch.note_account_dirty(&account.url);
        }
        for txid in &account.pending {
            batch.add_pending(&account.url, txid)?;
        }
        for child in &account.directory {
            batch.add_directory_entry(&account.url, child)?;
        }
        for chain in &account.chains {
            let mut accessor = batch.account_chain(&account.url, &chain.name);
            let mut live = accessor.open()?;
            for entry in &chain.entries {
                live.add_entry(*entry)?;
            }
        }
        for (entry, txn) in &account.data {
            batch.add_data_entry(&account.url, entry, txn)?;
        }
    }

    for txn in &snapshot.transactions {
        if !txn.main.is_empty() {
            batch.put_transaction(
                &txn.hash,
                &acd_encoding::decode::<SigOrTxn>(&txn.main)?,
            )?;
        }
        if !txn.status.is_empty() {
            batch.put_status(&txn.hash, &acd_encoding::decode(&txn.status)?)?;
        }
    }

    let root = batch.refresh_bpt()?;
    if root != snapshot.header.root {
        return Err(DbError::Merkle(MerkleError::Store(format!(
            "snapshot root mismatch: header {} rebuilt {}",
            snapshot.header.root, root
        ))));
    }
    batch.commit()?;
    Ok(snapshot.header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_kv::MemoryStore;
    use acd_types::sha256;
    use primitives::{Account, AccountAuth, Identity, TokenAccount};

    fn url(s: &str) -> Url { Url::parse(s).unwrap() }

    fn populate(db: &Database<MemoryStore>) -> Hash {
        let mut batch = db.begin(true);
        batch
            .put_account(&Account::Identity(Identity {
                url: url("acc://alice"),
                auth: AccountAuth::with_authority(url("acc://alice/book")),
            }))
            .unwrap();
        batch
            .put_account(&Account::TokenAccount(TokenAccount {
                url: url("acc://alice/tokens"),
                auth: AccountAuth::with_authority(url("acc://alice/book")),
                token_url: url("acc://acme"),
                balance: 70,
            }))
            .unwrap();
        batch
            .add_directory_entry(&url("acc://alice"), &url("acc://alice/tokens"))
            .unwrap();
        let mut accessor =
            batch.account_chain(&url("acc://alice/tokens"), "main");
        let mut chain = accessor.open().unwrap();
        chain.add_entry(sha256(b"txn-1")).unwrap();
        drop(chain);
        batch
            .add_data_entry(
                &url("acc://alice"),
                &sha256(b"entry"),
                &sha256(b"txn-1"),
            )
            .unwrap();
        batch.commit().unwrap().unwrap()
    }

    #[test]
    fn export_import_reproduces_the_root() {
        let source = Database::new(MemoryStore::new());
        let root = populate(&source);

        let mut batch = source.begin(true);
        let bytes = export(&mut batch, &url("acc://bvn-a.acme"), 7, 99).unwrap();
        drop(batch);

        let target = Database::new(MemoryStore::new());
        let header = import(&target, &bytes).unwrap();
        assert_eq!(header.root, root);
        assert_eq!(header.height, 7);

        let restored = target.begin(false);
        let account = restored
            .get_account(&url("acc://alice/tokens"))
            .unwrap()
            .unwrap();
        match account {
            Account::TokenAccount(t) => assert_eq!(t.balance, 70),
            other => panic!("wrong account type: {:?}", other),
        }
        assert_eq!(
            restored.account_directory(&url("acc://alice")).unwrap(),
            vec![url("acc://alice/tokens")]
        );
    }

    #[test]
    fn tampered_snapshot_is_refused() {
        let source = Database::new(MemoryStore::new());
        populate(&source);
        let mut batch = source.begin(true);
        let bytes = export(&mut batch, &url("acc://bvn-a.acme"), 7, 99).unwrap();
        drop(batch);

        let mut snapshot: Snapshot = acd_encoding::decode(&bytes).unwrap();
        snapshot.header.root = sha256(b"wrong");
        let target = Database::new(MemoryStore::new());
        assert!(import(&target, &acd_encoding::encode(&snapshot)).is_err());
    }
}
