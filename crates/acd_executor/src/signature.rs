// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Signature processing: verify an incoming signature, check it against
//! its signer, charge fees, and record it in the signer's signature set.

use crate::{config::PartitionInfo, delivery::Delivery};
use acd_database::{chain_names, Batch, SigOrTxn};
use acd_types::Hash;
use primitives::{
    fees, SigSetEntry, Signature, Signer as _, Status, TransactionStatus,
    Error, Result,
};

/// Processes every signer-facing signature of a delivery. Mutates the
/// status in place; the caller persists it. Fails atomically: an invalid
/// signature rejects the whole envelope.
pub fn process_signatures(
    partition: &PartitionInfo, batch: &mut Batch<'_>, delivery: &Delivery,
    status: &mut TransactionStatus,
) -> Result<()> {
    let txn_hash = delivery.transaction.hash();
    for signature in delivery.key_signatures() {
        process_signature(partition, batch, delivery, signature, &txn_hash, status)?;
    }
    Ok(())
}

fn process_signature(
    partition: &PartitionInfo, batch: &mut Batch<'_>, delivery: &Delivery,
    signature: &Signature, txn_hash: &Hash, status: &mut TransactionStatus,
) -> Result<()> {
    // The signature must be for this transaction and must verify.
    if let Some(hash) = signature.transaction_hash() {
        if hash != *txn_hash {
            return Err(Error::invalid_signature(format!(
                "signature is for {}, not {}",
                hash, txn_hash
            )));
        }
    }
    if !signature.verify(txn_hash) {
        return Err(Error::invalid_signature("signature verification failed"));
    }

    let signer_url = signature
        .signer_url()
        .ok_or_else(|| Error::invalid_signature("signature has no signer"))?
        .clone();
    let key_hash = signature.key_hash().ok_or_else(|| {
        Error::invalid_signature("signature carries no key")
    })?;

    let mut account =
        batch.get_account(&signer_url)?.ok_or_else(|| {
            Error::not_found(format!("signer {} not found", signer_url))
        })?;
    let signer = account.as_signer_mut().ok_or_else(|| {
        Error::invalid_signature(format!("{} is not a signer", signer_url))
    })?;

    let key_signature = signature.key_signature();
    if let Some(key_sig) = key_signature {
        if key_sig.signer_version != 0
            && key_sig.signer_version != signer.signer_version()
        {
            return Err(Error::invalid_signature(format!(
                "signer version mismatch: signature has {}, {} is at {}",
                key_sig.signer_version,
                signer_url,
                signer.signer_version()
            )));
        }
    }

    let entry_index = signer.entry_index(&key_hash).ok_or_else(|| {
        Error::unauthorized(format!(
            "the key is not an entry of {}",
            signer_url
        ))
    })?;

    // Replay protection: the slot's timestamp watermark must advance.
    if let Some(key_sig) = key_signature {
        if key_sig.timestamp != 0
            && !signer.update_last_used(entry_index, key_sig.timestamp)
        {
            return Err(Error::invalid_signature(format!(
                "timestamp {} does not advance the key's watermark",
                key_sig.timestamp
            )));
        }
    }

    // The initiating signature pays the transaction fee; additional
    // signatures pay the flat signature fee.
    let is_initiator =
        signature.metadata_hash() == delivery.transaction.header.initiator;
    let fee = if is_initiator {
        fees::compute_transaction_fee(&delivery.transaction)?
    } else {
        fees::FEE_SIGNATURE
    };
    if fee > 0 && !signer.debit_credits(fee) {
        return Err(Error::new(
            Status::InsufficientCredits,
            format!("{} has insufficient credits for the fee", signer_url),
        ));
    }
    let signer_version = signer.signer_version();
    batch.put_account(&account)?;

    // Record the signature set entry and the signature itself.
    let mut set = batch.signatures(txn_hash, &signer_url)?;
    let added = set.add(
        signer_version,
        SigSetEntry {
            sig_type: signature.signature_type().code(),
            hash: signature.hash(),
            key_index: entry_index as u64,
        },
    );
    if added {
        batch.put_signatures(txn_hash, &signer_url, &set)?;
        batch.put_transaction(
            &signature.hash(),
            &SigOrTxn {
                transaction: None,
                signature: Some(signature.clone()),
            },
        )?;
        let principal = delivery.transaction.header.principal.clone();
        let mut accessor =
            batch.account_chain(&principal, chain_names::SIGNATURE);
        let mut chain = accessor.open()?;
        chain.add_entry(signature.hash())?;
    }

    if is_initiator && status.initiator.is_none() {
        status.initiator = Some(signer_url.clone());
        status.initiator_hash = signature.metadata_hash();
    }
    status.add_signer(&signer_url);

    // A delegated signature also marks each delegating page, so the
    // authority walk finds the page whose delegate slot it satisfies.
    let mut outer = signature;
    while let Signature::Delegated(delegated) = outer {
        status.add_signer(&delegated.delegator);
        outer = delegated.signature.as_ref();
    }

    log::debug!(
        "recorded signature from {} for {} on {}",
        signer_url,
        txn_hash,
        partition.id
    );
    Ok(())
}
