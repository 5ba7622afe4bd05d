// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Typed record accessors: the account and transaction forests, account
//! chains, and the account-state hash that feeds the BPT.

use crate::{
    batch::Batch,
    errors::DbResult,
    key::RecordKey,
    types::{
        hash_value, value_hash, ChainMetadata, ChainUpdate, SigOrTxn,
        TransactionChainEntry,
    },
};
use acd_encoding::{Decodable, Encodable, Reader, Writer};
use acd_merkle::{Chain, ChainKey, ChainStore, MerkleError};
use acd_types::{sha256, Hash, TxId, Url};
use primitives::{Account, SignatureSetData, TransactionStatus};
use sha2::{Digest, Sha256};

/// Chain naming. Every account has zero or more named chains; the kinds
/// with a partition parameter embed the partition ID in the name.
pub mod chain_names {
    pub const MAIN: &str = "main";
    pub const SCRATCH: &str = "scratch";
    pub const SIGNATURE: &str = "signature";
    pub const ROOT: &str = "root";
    pub const ANCHOR_SEQUENCE: &str = "anchor-sequence";
    pub const MAJOR_BLOCK: &str = "major-block";

    /// The outgoing sequence chain for synthetic transactions bound to a
    /// partition.
    pub fn synthetic_sequence(partition: &str) -> String {
        format!("synthetic-sequence({})", partition)
    }

    /// The intermediate anchor chain recording a peer partition's roots.
    pub fn anchor_root(partition: &str) -> String {
        format!("anchor({})-root", partition)
    }

    /// The chain recording a peer partition's BPT roots.
    pub fn anchor_bpt(partition: &str) -> String {
        format!("anchor({})-bpt", partition)
    }

    /// Anchor chains dedup entries; consensus may deliver the same anchor
    /// root more than once.
    pub fn is_unique(name: &str) -> bool {
        name.starts_with("anchor(")
    }
}

fn account_key(url: &Url) -> RecordKey {
    RecordKey::new().append("Account").append(url)
}

fn transaction_key(hash: &Hash) -> RecordKey {
    RecordKey::new().append("Transaction").append(*hash)
}

fn encode_list<T: Encodable>(items: &[T]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_values(1, items);
    w.into_bytes()
}

fn decode_list<T: Decodable>(bytes: &[u8]) -> DbResult<Vec<T>> {
    let mut r = Reader::new(bytes);
    let items = r.read_values(1)?;
    r.finish()?;
    Ok(items)
}

fn encode_txids(items: &[TxId]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_txids(1, items);
    w.into_bytes()
}

fn decode_txids(bytes: &[u8]) -> DbResult<Vec<TxId>> {
    let mut r = Reader::new(bytes);
    let items = r.read_txids(1)?;
    r.finish()?;
    Ok(items)
}

fn encode_urls(items: &[Url]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_urls(1, items);
    w.into_bytes()
}

fn decode_urls(bytes: &[u8]) -> DbResult<Vec<Url>> {
    let mut r = Reader::new(bytes);
    let items = r.read_urls(1)?;
    r.finish()?;
    Ok(items)
}

impl<'a> Batch<'a> {
    // ----- account records -----

    pub fn get_account(&self, url: &Url) -> DbResult<Option<Account>> {
        self.get_record(&account_key(url).append("Main"))
    }

    /// Stores an account's main state and marks it for the next BPT
    /// refresh. Also indexes the account ID back to its URL for legacy
    /// chain-ID queries.
    pub fn put_account(&mut self, account: &Account) -> DbResult<()> {
        let url = account.url().clone();
        self.put_record(&account_key(&url).append("Main"), account)?;
        self.put_raw_record(
            &RecordKey::new().append("AccountId").append(url.account_id()),
            url.to_string().into_bytes(),
        )?;
        self.note_account_dirty(&url);
        Ok(())
    }

    /// Resolves a 32-byte account ID to its URL.
    pub fn account_url_by_id(&self, id: &Hash) -> DbResult<Option<Url>> {
        let key = RecordKey::new().append("AccountId").append(*id);
        match self.get_raw_record(&key)? {
            None => Ok(None),
            Some(bytes) => {
                let s = String::from_utf8(bytes)
                    .map_err(|_| acd_encoding::DecoderError::BadUtf8)?;
                Ok(Some(Url::parse(&s).map_err(|e| {
                    acd_encoding::DecoderError::InvalidValue(
                        "url",
                        e.to_string(),
                    )
                })?))
            }
        }
    }

    pub fn account_exists(&self, url: &Url) -> DbResult<bool> {
        Ok(self.get_raw_record(&account_key(url).append("Main"))?.is_some())
    }

    pub fn account_pending(&self, url: &Url) -> DbResult<Vec<TxId>> {
        match self.get_raw_record(&account_key(url).append("Pending"))? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_txids(&bytes),
        }
    }

    pub fn add_pending(&mut self, url: &Url, txid: &TxId) -> DbResult<()> {
        let mut pending = self.account_pending(url)?;
        if pending.contains(txid) {
            return Ok(());
        }
        pending.push(txid.clone());
        pending.sort();
        self.put_raw_record(
            &account_key(url).append("Pending"),
            encode_txids(&pending),
        )?;
        self.note_account_dirty(url);
        Ok(())
    }

    pub fn remove_pending(&mut self, url: &Url, txid: &TxId) -> DbResult<()> {
        let mut pending = self.account_pending(url)?;
        let before = pending.len();
        pending.retain(|t| t != txid);
        if pending.len() == before {
            return Ok(());
        }
        self.put_raw_record(
            &account_key(url).append("Pending"),
            encode_txids(&pending),
        )?;
        self.note_account_dirty(url);
        Ok(())
    }

    pub fn account_directory(&self, url: &Url) -> DbResult<Vec<Url>> {
        match self.get_raw_record(&account_key(url).append("Directory"))? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_urls(&bytes),
        }
    }

    /// Registers a sub-account under its identity.
    pub fn add_directory_entry(
        &mut self, identity: &Url, child: &Url,
    ) -> DbResult<()> {
        let mut entries = self.account_directory(identity)?;
        if entries.contains(child) {
            return Ok(());
        }
        entries.push(child.clone());
        entries.sort();
        self.put_raw_record(
            &account_key(identity).append("Directory"),
            encode_urls(&entries),
        )?;
        self.note_account_dirty(identity);
        Ok(())
    }

    pub fn account_chains(&self, url: &Url) -> DbResult<Vec<ChainMetadata>> {
        match self.get_raw_record(&account_key(url).append("Chains"))? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_list(&bytes),
        }
    }

    fn register_chain(&mut self, url: &Url, name: &str) -> DbResult<()> {
        let mut chains = self.account_chains(url)?;
        if chains.iter().any(|c| c.name == name) {
            return Ok(());
        }
        chains.push(ChainMetadata { name: name.to_string() });
        chains.sort();
        self.put_raw_record(
            &account_key(url).append("Chains"),
            encode_list(&chains),
        )
    }

    /// Access to one named chain of an account. Open it with
    /// [`ChainAccessor::open`].
    pub fn account_chain<'b>(
        &'b mut self, url: &Url, name: &str,
    ) -> ChainAccessor<'b, 'a> {
        ChainAccessor {
            batch: self,
            account: url.clone(),
            name: name.to_string(),
        }
    }

    pub fn synthetic_for_anchor(
        &self, ledger: &Url, anchor: &Hash,
    ) -> DbResult<Vec<TxId>> {
        let key =
            account_key(ledger).append("SyntheticForAnchor").append(*anchor);
        match self.get_raw_record(&key)? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_txids(&bytes),
        }
    }

    pub fn add_synthetic_for_anchor(
        &mut self, ledger: &Url, anchor: &Hash, txid: &TxId,
    ) -> DbResult<()> {
        let mut waiting = self.synthetic_for_anchor(ledger, anchor)?;
        if waiting.contains(txid) {
            return Ok(());
        }
        waiting.push(txid.clone());
        waiting.sort();
        let key =
            account_key(ledger).append("SyntheticForAnchor").append(*anchor);
        self.put_raw_record(&key, encode_txids(&waiting))
    }

    /// Removes and returns the transactions waiting on an anchor.
    pub fn take_synthetic_for_anchor(
        &mut self, ledger: &Url, anchor: &Hash,
    ) -> DbResult<Vec<TxId>> {
        let waiting = self.synthetic_for_anchor(ledger, anchor)?;
        if !waiting.is_empty() {
            let key = account_key(ledger)
                .append("SyntheticForAnchor")
                .append(*anchor);
            self.delete_record(&key)?;
        }
        Ok(waiting)
    }

    // ----- data records -----

    pub fn data_entry_count(&self, url: &Url) -> DbResult<u64> {
        let key = account_key(url).append("Data").append("Count");
        match self.get_raw_record(&key)? {
            None => Ok(0),
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    MerkleError::Store("data count is not 8 bytes".into())
                })?;
                Ok(u64::from_be_bytes(raw))
            }
        }
    }

    pub fn data_entry_hash(
        &self, url: &Url, index: u64,
    ) -> DbResult<Option<Hash>> {
        let key = account_key(url).append("Data").append("Entry").append(index);
        match self.get_raw_record(&key)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(value_hash(&bytes)?)),
        }
    }

    /// Appends a data entry hash and records which transaction wrote it.
    /// Returns the entry's index.
    pub fn add_data_entry(
        &mut self, url: &Url, entry_hash: &Hash, txn_hash: &Hash,
    ) -> DbResult<u64> {
        let index = self.data_entry_count(url)?;
        let base = account_key(url).append("Data");
        self.put_raw_record(
            &base.clone().append("Entry").append(index),
            hash_value(entry_hash),
        )?;
        self.put_raw_record(
            &base.clone().append("Count"),
            (index + 1).to_be_bytes().to_vec(),
        )?;
        self.put_raw_record(
            &base.append("Transaction").append(*entry_hash),
            hash_value(txn_hash),
        )?;
        self.note_account_dirty(url);
        Ok(index)
    }

    /// The transaction that wrote a data entry.
    pub fn data_transaction(
        &self, url: &Url, entry_hash: &Hash,
    ) -> DbResult<Option<Hash>> {
        let key = account_key(url)
            .append("Data")
            .append("Transaction")
            .append(*entry_hash);
        match self.get_raw_record(&key)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(value_hash(&bytes)?)),
        }
    }

    // ----- transaction records -----

    pub fn get_transaction(&self, hash: &Hash) -> DbResult<Option<SigOrTxn>> {
        self.get_record(&transaction_key(hash).append("Main"))
    }

    pub fn put_transaction(
        &mut self, hash: &Hash, value: &SigOrTxn,
    ) -> DbResult<()> {
        self.put_record(&transaction_key(hash).append("Main"), value)
    }

    /// The status record; a default (unknown) status when none exists.
    pub fn get_status(&self, hash: &Hash) -> DbResult<TransactionStatus> {
        Ok(self
            .get_record(&transaction_key(hash).append("Status"))?
            .unwrap_or_default())
    }

    pub fn put_status(
        &mut self, hash: &Hash, status: &TransactionStatus,
    ) -> DbResult<()> {
        self.put_record(&transaction_key(hash).append("Status"), status)
    }

    pub fn transaction_produced(&self, hash: &Hash) -> DbResult<Vec<TxId>> {
        match self.get_raw_record(&transaction_key(hash).append("Produced"))? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_txids(&bytes),
        }
    }

    pub fn add_produced(
        &mut self, cause: &Hash, produced: &TxId,
    ) -> DbResult<()> {
        let mut list = self.transaction_produced(cause)?;
        if list.contains(produced) {
            return Ok(());
        }
        list.push(produced.clone());
        list.sort();
        self.put_raw_record(
            &transaction_key(cause).append("Produced"),
            encode_txids(&list),
        )
    }

    pub fn signatures(
        &self, hash: &Hash, signer: &Url,
    ) -> DbResult<SignatureSetData> {
        let key = transaction_key(hash).append("Signatures").append(signer);
        Ok(self.get_record(&key)?.unwrap_or_default())
    }

    pub fn put_signatures(
        &mut self, hash: &Hash, signer: &Url, set: &SignatureSetData,
    ) -> DbResult<()> {
        let key = transaction_key(hash).append("Signatures").append(signer);
        self.put_record(&key, set)
    }

    pub fn transaction_chains(
        &self, hash: &Hash,
    ) -> DbResult<Vec<TransactionChainEntry>> {
        match self.get_raw_record(&transaction_key(hash).append("Chains"))? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_list(&bytes),
        }
    }

    pub fn add_transaction_chain(
        &mut self, hash: &Hash, entry: TransactionChainEntry,
    ) -> DbResult<()> {
        let mut entries = self.transaction_chains(hash)?;
        if entries.contains(&entry) {
            return Ok(());
        }
        entries.push(entry);
        entries.sort();
        self.put_raw_record(
            &transaction_key(hash).append("Chains"),
            encode_list(&entries),
        )
    }
}

/// Chain persistence for one named chain of one account. Implements the
/// merkle layer's [`ChainStore`]; open with [`ChainAccessor::open`].
pub struct ChainAccessor<'b, 'a> {
    batch: &'b mut Batch<'a>,
    account: Url,
    name: String,
}

impl<'b, 'a> ChainAccessor<'b, 'a> {
    pub fn open(&mut self) -> acd_merkle::Result<Chain<'_, Self>> {
        let unique = chain_names::is_unique(&self.name);
        Chain::open(self, unique)
    }

    pub fn account(&self) -> &Url { &self.account }

    pub fn name(&self) -> &str { &self.name }

    fn record_key(&self, key: &ChainKey) -> RecordKey {
        let base = account_key(&self.account)
            .append("Chain")
            .append(self.name.as_str());
        match key {
            ChainKey::Head => base.append("Head"),
            ChainKey::Element(index) => base.append("Element").append(*index),
            ChainKey::ElementIndex(hash) => {
                base.append("ElementIndex").append(*hash)
            }
            ChainKey::State(index) => base.append("States").append(*index),
        }
    }
}

impl ChainStore for ChainAccessor<'_, '_> {
    fn chain_get(&mut self, key: &ChainKey) -> acd_merkle::Result<Option<Vec<u8>>> {
        self.batch
            .get_raw_record(&self.record_key(key))
            .map_err(|e| MerkleError::Store(e.to_string()))
    }

    fn chain_put(
        &mut self, key: &ChainKey, value: Vec<u8>,
    ) -> acd_merkle::Result<()> {
        if matches!(key, ChainKey::Head) {
            let account = self.account.clone();
            let name = self.name.clone();
            self.batch
                .register_chain(&account, &name)
                .map_err(|e| MerkleError::Store(e.to_string()))?;
            self.batch.note_account_dirty(&account);
            self.batch.note_chain_update(ChainUpdate { account, name });
        }
        self.batch
            .put_raw_record(&self.record_key(key), value)
            .map_err(|e| MerkleError::Store(e.to_string()))
    }
}

/// The hash of an account's canonical state: its main record, the anchors
/// of its chains (sorted by name), and its latest data entry. This is the
/// value the BPT stores for the account.
pub fn account_state_hash(batch: &Batch<'_>, url: &Url) -> DbResult<Hash> {
    let main_hash = match batch.get_raw_record(&account_key(url).append("Main"))?
    {
        Some(bytes) => sha256(&bytes),
        None => Hash::ZERO,
    };

    let mut chains = batch.account_chains(url)?;
    chains.sort();
    let mut hasher = Sha256::new();
    for chain in &chains {
        let head_key = account_key(url)
            .append("Chain")
            .append(chain.name.as_str())
            .append("Head");
        let anchor = match batch.get_raw_record(&head_key)? {
            Some(bytes) => {
                acd_encoding::decode::<acd_merkle::MerkleState>(&bytes)?
                    .anchor()
            }
            None => Hash::ZERO,
        };
        hasher.update(sha256(chain.name.as_bytes()).as_bytes());
        hasher.update(anchor.as_bytes());
    }
    let chains_hash = Hash(hasher.finalize().into());

    let data_hash = match batch.data_entry_count(url)? {
        0 => Hash::ZERO,
        count => batch.data_entry_hash(url, count - 1)?.unwrap_or(Hash::ZERO),
    };

    let mut state = Sha256::new();
    state.update(main_hash.as_bytes());
    state.update(chains_hash.as_bytes());
    state.update(data_hash.as_bytes());
    Ok(Hash(state.finalize().into()))
}

#[cfg(test)]
mod tests;
