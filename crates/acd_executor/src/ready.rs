// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The ready predicate: decides whether a pending transaction may execute
//! now. User transactions wait on authority satisfaction; synthetic
//! transactions wait on their proof's anchor and their sequence number;
//! system transactions other than anchors are always ready.

use crate::{
    chain::Registry,
    config::PartitionInfo,
    delivery::Delivery,
};
use acd_database::{chain_names, Batch};
use acd_types::{consts, Hash, Url};
use primitives::{
    Account, Error, Result, Signer as _, TransactionStatus, TransactionType,
};

pub fn transaction_is_ready(
    partition: &PartitionInfo, registry: &Registry, batch: &mut Batch<'_>,
    delivery: &Delivery, status: &TransactionStatus,
) -> Result<bool> {
    // Work the engine generated itself (genesis, forwarded transactions,
    // locally-routed produced transactions) is ready by construction.
    if delivery.internal {
        return Ok(true);
    }
    let typ = delivery.transaction_type();
    if typ.is_user() {
        user_ready(partition, registry, batch, delivery, status)
    } else if typ.is_synthetic() {
        synthetic_ready(partition, batch, status)
    } else {
        system_ready(partition, batch, delivery, status)
    }
}

fn user_ready(
    _partition: &PartitionInfo, registry: &Registry, batch: &mut Batch<'_>,
    delivery: &Delivery, status: &TransactionStatus,
) -> Result<bool> {
    let txn = &delivery.transaction;
    let typ = delivery.transaction_type();

    // An executor may supply its own readiness rule.
    if let Some(executor) = registry.get(typ) {
        if let Some(ready) =
            executor.transaction_is_ready(batch, txn, status)?
        {
            return Ok(ready);
        }
    }

    // UpdateKey is always M=1: ready as soon as the initiator has signed.
    if typ == TransactionType::UpdateKey {
        let initiator = status.initiator.as_ref().ok_or_else(|| {
            Error::internal("transaction initiator is missing")
        })?;
        let set = batch.signatures(&txn.hash(), initiator)?;
        return Ok(set.count() > 0);
    }

    let principal = match batch.get_account(&txn.header.principal)? {
        Some(principal) => principal,
        None => {
            // Allowed-missing-principal transactions are gated only on
            // having at least one recorded signature.
            return Ok(!status.signers.is_empty());
        }
    };

    let authorities = principal.authorities();
    if authorities.is_empty() {
        return Ok(!status.signers.is_empty());
    }

    let requires_auth = typ.requires_authorization();
    let mut all_disabled = true;
    'authorities: for entry in &authorities {
        if entry.disabled && !requires_auth {
            continue;
        }
        all_disabled = false;
        for signer in status.find_signers(&entry.url) {
            if signer_is_satisfied(batch, status, &txn.hash(), &signer)? {
                continue 'authorities;
            }
        }
        return Ok(false);
    }

    if all_disabled {
        // Every authority is disabled: any one signature suffices.
        return Ok(!status.signers.is_empty());
    }
    Ok(true)
}

/// A signer is satisfied by a completion marker, by reaching its
/// threshold directly, or by delegation entries whose own signers are
/// satisfied, recursively.
pub fn signer_is_satisfied(
    batch: &mut Batch<'_>, status: &TransactionStatus, txn_hash: &Hash,
    signer_url: &Url,
) -> Result<bool> {
    let set = batch.signatures(txn_hash, signer_url)?;
    if set.has_set_marker() {
        return Ok(true);
    }

    let account = match batch.get_account(signer_url)? {
        Some(account) => account,
        None => return Ok(false),
    };
    let threshold = match account.as_signer() {
        Some(signer) => signer.signature_threshold(),
        None => return Ok(false),
    };
    if set.count() as u64 >= threshold {
        return Ok(true);
    }

    // Count satisfied delegates toward the threshold.
    let page = match &account {
        Account::KeyPage(page) => page,
        _ => return Ok(false),
    };
    let mut required = threshold - set.count() as u64;
    for key in &page.keys {
        let delegate = match &key.delegate {
            Some(delegate) => delegate,
            None => continue,
        };
        let mut satisfied = false;
        for signer in status.find_signers(delegate) {
            if signer_is_satisfied(batch, status, txn_hash, &signer)? {
                satisfied = true;
                break;
            }
        }
        if !satisfied {
            // The delegate book itself may be the recorded signer.
            for signer in status.find_signers(&delegate.join("1")) {
                if signer_is_satisfied(batch, status, txn_hash, &signer)? {
                    satisfied = true;
                    break;
                }
            }
        }
        if satisfied {
            required = required.saturating_sub(1);
            if required == 0 {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn synthetic_ready(
    partition: &PartitionInfo, batch: &mut Batch<'_>,
    status: &TransactionStatus,
) -> Result<bool> {
    // The proof must be present...
    let proof = match &status.proof {
        Some(proof) => proof,
        None => return Ok(false),
    };
    let source = match &status.source_network {
        Some(source) => source,
        None => return Ok(false),
    };
    let source_id = match consts::parse_partition_url(source) {
        Some(id) => id,
        None => {
            return Err(Error::bad_request(format!(
                "{} is not a valid partition URL",
                source
            )));
        }
    };

    // ...its anchor must have been observed on the intermediate anchor
    // chain for the source partition...
    let pool = partition.anchor_pool_url();
    let anchored = {
        let mut accessor = batch
            .account_chain(&pool, &chain_names::anchor_root(&source_id));
        let mut chain = accessor.open()?;
        chain.height_of(&proof.anchor)?.is_some()
    };
    if !anchored {
        return Ok(false);
    }

    // ...and the sequence number must be exactly next.
    let delivered = synthetic_delivered(batch, partition, source)?;
    Ok(status.sequence_number == delivered + 1)
}

fn system_ready(
    partition: &PartitionInfo, batch: &mut Batch<'_>, delivery: &Delivery,
    status: &TransactionStatus,
) -> Result<bool> {
    if !delivery.transaction_type().is_anchor() {
        // Genesis and system data writes are exempt from sequencing.
        return Ok(true);
    }
    let source = match &status.source_network {
        Some(source) => source,
        None => return Ok(false),
    };
    let delivered = anchor_delivered(batch, partition, source)?;
    Ok(status.sequence_number == delivered + 1)
}

pub(crate) fn synthetic_delivered(
    batch: &Batch<'_>, partition: &PartitionInfo, source: &Url,
) -> Result<u64> {
    match batch.get_account(&partition.synthetic_url())? {
        Some(Account::SyntheticLedger(ledger)) => Ok(ledger
            .partition_ref(source)
            .map(|p| p.delivered)
            .unwrap_or(0)),
        _ => Ok(0),
    }
}

pub(crate) fn anchor_delivered(
    batch: &Batch<'_>, partition: &PartitionInfo, source: &Url,
) -> Result<u64> {
    match batch.get_account(&partition.anchor_pool_url())? {
        Some(Account::AnchorLedger(ledger)) => Ok(ledger
            .partition_ref(source)
            .map(|p| p.delivered)
            .unwrap_or(0)),
        _ => Ok(0),
    }
}
