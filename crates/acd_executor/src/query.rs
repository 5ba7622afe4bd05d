// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The query engine: resolves accounts, chains, transactions, data
//! entries, directories and blocks, optionally attaching composed
//! receipts that prove the answer into the partition root.

use crate::config::PartitionInfo;
use acd_database::{chain_names, Batch, ChainMetadata};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_merkle::Receipt;
use acd_types::{Hash, TxId, Url};
use primitives::{
    Account, DataEntry, Error, Result, TransactionBody, TransactionStatus,
    Transaction,
};

#[derive(Debug, Clone)]
pub enum QueryRequest {
    /// By URL, with optional fragment selectors:
    /// `chain/<name>[/<height|hash>]`, `anchor/<hash>`,
    /// `tx[/<height|hash>]`, `signature[/<height|hash>]`,
    /// `pending[/<height|hash>]`, `data[/<height|hash>]`.
    Url { url: Url, prove: bool },
    /// By transaction hash.
    TxId { hash: Hash, prove: bool },
    /// Legacy: by 32-byte account ID.
    ChainId { id: Hash, prove: bool },
    DataEntry { url: Url, entry_hash: Option<Hash> },
    DataSet { url: Url, start: u64, count: u64, expand: bool },
    Directory { url: Url, start: u64, count: u64, expand: bool },
    /// Which signer of the account's authorities holds a key hash.
    KeyPageIndex { url: Url, key_hash: Vec<u8> },
    TxHistory { url: Url, chain: String, start: u64, count: u64 },
    MinorBlocks { start: u64, count: u64 },
    Pending { url: Url },
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Account {
        account: Account,
        chains: Vec<ChainSummary>,
        receipt: Option<Receipt>,
    },
    ChainEntry {
        account: Url,
        chain: String,
        index: u64,
        entry: Hash,
        receipt: Option<Receipt>,
    },
    Transaction {
        transaction: Transaction,
        status: TransactionStatus,
        produced: Vec<TxId>,
        receipt: Option<Receipt>,
    },
    Signature {
        signature: primitives::Signature,
    },
    DataEntry {
        entry_hash: Hash,
        transaction: Option<Hash>,
        entry: Option<DataEntry>,
    },
    DataSet {
        total: u64,
        entries: Vec<(u64, Hash)>,
    },
    Directory {
        total: u64,
        entries: Vec<Url>,
        expanded: Vec<Account>,
    },
    KeyPageIndex {
        authority: Url,
        signer: Url,
        index: u64,
    },
    TxHistory {
        height: u64,
        transactions: Vec<(Hash, TransactionStatus)>,
    },
    MinorBlocks {
        records: Vec<MinorBlockRecord>,
    },
    Pending {
        ids: Vec<TxId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainSummary {
    pub name: String,
    pub height: u64,
    pub anchor: Hash,
}

/// The per-block index record written at EndBlock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinorBlockRecord {
    pub index: u64,
    pub timestamp: u64,
    pub root: Hash,
    pub transactions: Vec<Hash>,
}

impl Encodable for MinorBlockRecord {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.index);
        w.write_uint(2, self.timestamp);
        w.write_hash(3, &self.root);
        w.write_hashes(4, &self.transactions);
    }
}

impl Decodable for MinorBlockRecord {
    fn decode(
        r: &mut Reader<'_>,
    ) -> std::result::Result<Self, DecoderError> {
        Ok(MinorBlockRecord {
            index: r.read_uint(1)?,
            timestamp: r.read_uint(2)?,
            root: r.read_hash(3)?,
            transactions: r.read_hashes(4)?,
        })
    }
}

pub fn execute(
    partition: &PartitionInfo, batch: &mut Batch<'_>, request: QueryRequest,
) -> Result<QueryResponse> {
    match request {
        QueryRequest::Url { url, prove } => query_url(partition, batch, &url, prove),
        QueryRequest::TxId { hash, prove } => {
            query_transaction(partition, batch, &hash, prove)
        }
        QueryRequest::ChainId { id, prove } => {
            let url = batch.account_url_by_id(&id)?.ok_or_else(|| {
                Error::not_found(format!("no account with ID {}", id))
            })?;
            query_account(partition, batch, &url, prove)
        }
        QueryRequest::DataEntry { url, entry_hash } => {
            query_data_entry(batch, &url, entry_hash)
        }
        QueryRequest::DataSet { url, start, count, .. } => {
            let total = batch.data_entry_count(&url)?;
            let mut entries = Vec::new();
            for index in start..start.saturating_add(count).min(total) {
                if let Some(hash) = batch.data_entry_hash(&url, index)? {
                    entries.push((index, hash));
                }
            }
            Ok(QueryResponse::DataSet { total, entries })
        }
        QueryRequest::Directory { url, start, count, expand } => {
            let all = batch.account_directory(&url)?;
            let total = all.len() as u64;
            let entries: Vec<Url> = all
                .into_iter()
                .skip(start as usize)
                .take(count as usize)
                .collect();
            let mut expanded = Vec::new();
            if expand {
                for entry in &entries {
                    if let Some(account) = batch.get_account(entry)? {
                        expanded.push(account);
                    }
                }
            }
            Ok(QueryResponse::Directory { total, entries, expanded })
        }
        QueryRequest::KeyPageIndex { url, key_hash } => {
            query_key_page_index(batch, &url, &key_hash)
        }
        QueryRequest::TxHistory { url, chain, start, count } => {
            query_tx_history(batch, &url, &chain, start, count)
        }
        QueryRequest::MinorBlocks { start, count } => {
            let mut records = Vec::new();
            for index in start..start.saturating_add(count) {
                match get_minor_block(batch, index)? {
                    Some(record) => records.push(record),
                    None => break,
                }
            }
            Ok(QueryResponse::MinorBlocks { records })
        }
        QueryRequest::Pending { url } => {
            Ok(QueryResponse::Pending { ids: batch.account_pending(&url)? })
        }
    }
}

fn query_url(
    partition: &PartitionInfo, batch: &mut Batch<'_>, url: &Url, prove: bool,
) -> Result<QueryResponse> {
    let fragment = match url.fragment() {
        None => return query_account(partition, batch, &url.strip_extras(), prove),
        Some(fragment) => fragment.to_string(),
    };
    let base = url.strip_extras();
    let mut parts = fragment.split('/');
    let kind = parts.next().unwrap_or_default();
    let start = url.query_u64("start")?.unwrap_or(0);
    let count = url.query_u64("count")?.unwrap_or(10);

    match kind {
        "chain" => {
            let name = parts
                .next()
                .ok_or_else(|| Error::bad_request("chain fragment needs a name"))?;
            match parts.next() {
                None => {
                    chain_entry_at(partition, batch, &base, name, None, prove)
                }
                Some(selector) => chain_entry_at(
                    partition,
                    batch,
                    &base,
                    name,
                    Some(selector),
                    prove,
                ),
            }
        }
        "anchor" => {
            let selector = parts.next().ok_or_else(|| {
                Error::bad_request("anchor fragment needs a hash")
            })?;
            let anchor = Hash::from_hex(selector).ok_or_else(|| {
                Error::bad_request("anchor selector must be a hash")
            })?;
            // Search the account's chains for the anchor.
            for meta in batch.account_chains(&base)? {
                let found = {
                    let mut accessor = batch.account_chain(&base, &meta.name);
                    accessor.open()?.height_of(&anchor)?
                };
                if let Some(index) = found {
                    return chain_entry_response(
                        partition, batch, &base, &meta.name, index, prove,
                    );
                }
            }
            Err(Error::not_found(format!("anchor {} not found on {}", anchor, base)))
        }
        "tx" => {
            transaction_on_chain(partition, batch, &base, chain_names::MAIN, parts.next(), prove)
        }
        "signature" => transaction_on_chain(
            partition,
            batch,
            &base,
            chain_names::SIGNATURE,
            parts.next(),
            prove,
        ),
        "pending" => {
            let ids = batch.account_pending(&base)?;
            match parts.next() {
                None => Ok(QueryResponse::Pending { ids }),
                Some(selector) => {
                    let id = select_pending(&ids, selector)?;
                    query_transaction(partition, batch, &id.hash(), prove)
                }
            }
        }
        "data" => {
            let total = batch.data_entry_count(&base)?;
            match parts.next() {
                None => {
                    if total == 0 {
                        return Err(Error::not_found(format!(
                            "{} has no data entries",
                            base
                        )));
                    }
                    let hash = batch
                        .data_entry_hash(&base, total - 1)?
                        .ok_or_else(|| Error::internal("data entry missing"))?;
                    query_data_entry(batch, &base, Some(hash))
                }
                Some(selector) => match Hash::from_hex(selector) {
                    Some(hash) => query_data_entry(batch, &base, Some(hash)),
                    None => {
                        let index: u64 =
                            selector.parse().map_err(|_| {
                                Error::bad_request(
                                    "data selector must be a height or hash",
                                )
                            })?;
                        let hash = batch
                            .data_entry_hash(&base, index)?
                            .ok_or_else(|| {
                                Error::not_found(format!(
                                    "no data entry {} on {}",
                                    index, base
                                ))
                            })?;
                        query_data_entry(batch, &base, Some(hash))
                    }
                },
            }
        }
        _ => {
            // Unknown fragments fall back to a range listing.
            let _ = (start, count);
            Err(Error::bad_request(format!("unknown fragment {:?}", kind)))
        }
    }
}

fn query_account(
    partition: &PartitionInfo, batch: &mut Batch<'_>, url: &Url, prove: bool,
) -> Result<QueryResponse> {
    let account = batch
        .get_account(url)?
        .ok_or_else(|| Error::not_found(format!("{} not found", url)))?;
    let mut chains = Vec::new();
    for ChainMetadata { name } in batch.account_chains(url)? {
        let (height, anchor) = {
            let mut accessor = batch.account_chain(url, &name);
            let chain = accessor.open()?;
            (chain.height(), chain.anchor())
        };
        chains.push(ChainSummary { name, height, anchor });
    }
    // Prove the latest main chain entry when asked and present.
    let receipt = if prove {
        main_chain_receipt(partition, batch, url)?
    } else {
        None
    };
    Ok(QueryResponse::Account { account, chains, receipt })
}

fn main_chain_receipt(
    partition: &PartitionInfo, batch: &mut Batch<'_>, url: &Url,
) -> Result<Option<Receipt>> {
    let height = {
        let mut accessor = batch.account_chain(url, chain_names::MAIN);
        accessor.open()?.height()
    };
    if height == 0 {
        return Ok(None);
    }
    Ok(Some(prove_chain_entry(
        partition,
        batch,
        url,
        chain_names::MAIN,
        height - 1,
    )?))
}

fn chain_entry_at(
    partition: &PartitionInfo, batch: &mut Batch<'_>, url: &Url, name: &str,
    selector: Option<&str>, prove: bool,
) -> Result<QueryResponse> {
    let index = match selector {
        None => {
            let height = {
                let mut accessor = batch.account_chain(url, name);
                accessor.open()?.height()
            };
            if height == 0 {
                return Err(Error::not_found(format!(
                    "chain {} of {} is empty",
                    name, url
                )));
            }
            height - 1
        }
        Some(selector) => match Hash::from_hex(selector) {
            Some(hash) => {
                let found = {
                    let mut accessor = batch.account_chain(url, name);
                    accessor.open()?.height_of(&hash)?
                };
                found.ok_or_else(|| {
                    Error::not_found(format!(
                        "{} is not on chain {} of {}",
                        hash, name, url
                    ))
                })?
            }
            None => selector.parse().map_err(|_| {
                Error::bad_request("chain selector must be a height or hash")
            })?,
        },
    };
    chain_entry_response(partition, batch, url, name, index, prove)
}

fn chain_entry_response(
    partition: &PartitionInfo, batch: &mut Batch<'_>, url: &Url, name: &str,
    index: u64, prove: bool,
) -> Result<QueryResponse> {
    let entry = {
        let mut accessor = batch.account_chain(url, name);
        accessor.open()?.entry(index)?
    };
    let receipt = if prove {
        Some(prove_chain_entry(partition, batch, url, name, index)?)
    } else {
        None
    };
    Ok(QueryResponse::ChainEntry {
        account: url.clone(),
        chain: name.to_string(),
        index,
        entry,
        receipt,
    })
}

fn transaction_on_chain(
    partition: &PartitionInfo, batch: &mut Batch<'_>, url: &Url, chain: &str,
    selector: Option<&str>, prove: bool,
) -> Result<QueryResponse> {
    let entry = match chain_entry_at(partition, batch, url, chain, selector, false)? {
        QueryResponse::ChainEntry { entry, .. } => entry,
        _ => unreachable!("chain_entry_at returns a chain entry"),
    };
    query_transaction(partition, batch, &entry, prove)
}

fn query_transaction(
    partition: &PartitionInfo, batch: &mut Batch<'_>, hash: &Hash, prove: bool,
) -> Result<QueryResponse> {
    let record = batch
        .get_transaction(hash)?
        .ok_or_else(|| Error::not_found(format!("transaction {} not found", hash)))?;
    let transaction = match (record.transaction, record.signature) {
        (Some(transaction), _) => transaction,
        (None, Some(signature)) => {
            return Ok(QueryResponse::Signature { signature });
        }
        (None, None) => {
            return Err(Error::not_found(format!(
                "{} is an empty record",
                hash
            )));
        }
    };
    let status = batch.get_status(hash)?;
    let produced = batch.transaction_produced(hash)?;

    let receipt = if prove {
        let placements = batch.transaction_chains(hash)?;
        match placements.first() {
            None => None,
            Some(entry) => Some(prove_chain_entry(
                partition,
                batch,
                &entry.account,
                &entry.chain,
                entry.chain_index,
            )?),
        }
    } else {
        None
    };
    Ok(QueryResponse::Transaction { transaction, status, produced, receipt })
}

fn query_data_entry(
    batch: &mut Batch<'_>, url: &Url, entry_hash: Option<Hash>,
) -> Result<QueryResponse> {
    let entry_hash = match entry_hash {
        Some(hash) => hash,
        None => {
            let total = batch.data_entry_count(url)?;
            if total == 0 {
                return Err(Error::not_found(format!(
                    "{} has no data entries",
                    url
                )));
            }
            batch
                .data_entry_hash(url, total - 1)?
                .ok_or_else(|| Error::internal("data entry missing"))?
        }
    };
    let transaction = batch.data_transaction(url, &entry_hash)?;
    // Recover the entry body from the transaction that wrote it.
    let entry = match transaction {
        None => None,
        Some(txn_hash) => batch
            .get_transaction(&txn_hash)?
            .and_then(|r| r.transaction)
            .and_then(|txn| match txn.body {
                TransactionBody::WriteData(body) => Some(body.entry),
                TransactionBody::WriteDataTo(body) => Some(body.entry),
                TransactionBody::SyntheticWriteData(body) => Some(body.entry),
                TransactionBody::SystemWriteData(body) => Some(body.entry),
                _ => None,
            }),
    };
    Ok(QueryResponse::DataEntry { entry_hash, transaction, entry })
}

fn query_key_page_index(
    batch: &mut Batch<'_>, url: &Url, key_hash: &[u8],
) -> Result<QueryResponse> {
    let account = batch
        .get_account(url)?
        .ok_or_else(|| Error::not_found(format!("{} not found", url)))?;
    for authority in account.authorities() {
        // Walk the authority's pages in order.
        let book = match batch.get_account(&authority.url)? {
            Some(Account::KeyBook(book)) => book,
            _ => continue,
        };
        for page_number in 1..=book.page_count {
            let page_url = book.page_url(page_number);
            if let Some(Account::KeyPage(page)) =
                batch.get_account(&page_url)?
            {
                if let Some(index) = page.entry_index(key_hash) {
                    return Ok(QueryResponse::KeyPageIndex {
                        authority: authority.url,
                        signer: page_url,
                        index: index as u64,
                    });
                }
            }
        }
    }
    Err(Error::not_found(format!(
        "no authority of {} holds the given key",
        url
    )))
}

fn query_tx_history(
    batch: &mut Batch<'_>, url: &Url, chain: &str, start: u64, count: u64,
) -> Result<QueryResponse> {
    let (height, entries) = {
        let mut accessor = batch.account_chain(url, chain);
        let mut live = accessor.open()?;
        let height = live.height();
        (height, live.entries(start, start.saturating_add(count))?)
    };
    let mut transactions = Vec::with_capacity(entries.len());
    for entry in entries {
        let status = batch.get_status(&entry)?;
        transactions.push((entry, status));
    }
    Ok(QueryResponse::TxHistory { height, transactions })
}

fn select_pending(ids: &[TxId], selector: &str) -> Result<TxId> {
    if let Some(hash) = Hash::from_hex(selector) {
        return ids
            .iter()
            .find(|id| id.hash() == hash)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{} is not pending", hash)));
    }
    let index: usize = selector
        .parse()
        .map_err(|_| Error::bad_request("pending selector must be a height or hash"))?;
    ids.get(index).cloned().ok_or_else(|| {
        Error::not_found(format!("no pending transaction at {}", index))
    })
}

/// Proves an entry of an account chain into the partition's current root:
/// entry to chain anchor, chain anchor to the root chain's fold.
pub fn prove_chain_entry(
    partition: &PartitionInfo, batch: &mut Batch<'_>, account: &Url,
    chain: &str, index: u64,
) -> Result<Receipt> {
    let (inner, chain_anchor) = {
        let mut accessor = batch.account_chain(account, chain);
        let mut live = accessor.open()?;
        let height = live.height();
        if index >= height {
            return Err(Error::not_found(format!(
                "entry {} is beyond chain {} of {}",
                index, chain, account
            )));
        }
        (live.receipt(index, height - 1)?, live.anchor())
    };

    let ledger = partition.ledger_url();
    let mut accessor = batch.account_chain(&ledger, chain_names::ROOT);
    let mut root_chain = accessor.open()?;
    let at = root_chain.height_of(&chain_anchor)?.ok_or_else(|| {
        Error::internal(format!(
            "chain {} anchor is not on the root chain",
            chain
        ))
    })?;
    let root_height = root_chain.height();
    let outer = root_chain.receipt(at, root_height - 1)?;
    inner.combine(&outer).ok_or_else(|| {
        Error::internal("chain receipt does not connect to the root chain")
    })
}

pub(crate) fn minor_block_key(index: u64) -> acd_database::RecordKey {
    acd_database::RecordKey::new().append("MinorBlock").append(index)
}

fn get_minor_block(
    batch: &Batch<'_>, index: u64,
) -> Result<Option<MinorBlockRecord>> {
    match batch.read_raw(&minor_block_key(index)).map_err(Error::from)? {
        None => Ok(None),
        Some(bytes) => Ok(Some(acd_encoding::decode(&bytes)?)),
    }
}
