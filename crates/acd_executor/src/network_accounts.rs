// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Guarding and staging of writes to the network variable accounts under
//! a partition's node URL. The Directory is the only source of truth:
//! BVNs only accept updates pushed through a directory anchor.

use crate::{chain::StateManager, config::PartitionInfo, delivery::Delivery};
use acd_types::consts;
use primitives::{
    network::GlobalValues, Account, Error, NetworkAccountUpdate, Result,
    SystemLedger, TransactionBody,
};
use acd_database::Batch;

/// The managed variable accounts.
const MANAGED: [&str; 4] =
    [consts::ORACLE, consts::GLOBALS, consts::NETWORK, consts::ROUTING];

/// The sub-account name a principal has under the node URL, if any.
fn target_name(partition: &PartitionInfo, principal: &acd_types::Url) -> Option<String> {
    if !partition.owns(principal) || principal.is_root_identity() {
        return None;
    }
    Some(
        principal
            .path()
            .trim_start_matches('/')
            .to_string(),
    )
}

/// Validates a transaction against the network-account rules. Runs after
/// the executor, against the updated principal, before its writes are
/// folded into the block; failure fails the transaction.
pub fn check(
    partition: &PartitionInfo, globals: &GlobalValues,
    st: &StateManager<'_, '_>, delivery: &Delivery,
) -> Result<()> {
    let name = match target_name(partition, st.principal_url()) {
        Some(name) => name,
        None => return Ok(()),
    };
    if delivery.transaction_type().is_system() {
        // Anchors and genesis maintain these accounts themselves.
        return Ok(());
    }

    match &delivery.transaction.body {
        TransactionBody::UpdateKeyPage(_) => {
            let operator_page = format!("{}/1", consts::OPERATOR_BOOK);
            if name == operator_page {
                let page = match st.principal_opt() {
                    Some(Account::KeyPage(page)) => page,
                    _ => {
                        return Err(Error::internal(format!(
                            "{} is not a key page",
                            st.principal_url()
                        )));
                    }
                };
                let expected = globals
                    .globals
                    .validator_threshold
                    .threshold(page.keys.len());
                if page.accept_threshold != expected {
                    return Err(Error::bad_request(format!(
                        "invalid operator page update: accept threshold \
                         must be {}, got {}",
                        expected, page.accept_threshold
                    )));
                }
            }
        }
        TransactionBody::UpdateAccountAuth(_) => {
            return Err(Error::bad_request(
                "the authority set of a network account cannot be updated",
            ));
        }
        TransactionBody::WriteData(body) => {
            if name == consts::VOTES || name == consts::EVIDENCE {
                return Err(Error::bad_request(format!(
                    "{} cannot be updated directly",
                    st.principal_url()
                )));
            }
            if !MANAGED.contains(&name.as_str()) {
                return Ok(());
            }
            // Must parse, and must land in the account state.
            let mut scratch = globals.clone();
            parse_update(&mut scratch, &name, &body.entry)?;
            if !body.write_to_state {
                return Err(Error::bad_request(format!(
                    "updates to {} must write to state",
                    st.principal_url()
                )));
            }
        }
        _ => return Ok(()),
    }

    // Only the Directory takes these updates first-hand.
    if !partition.is_directory() && !delivery.internal {
        return Err(Error::bad_request(format!(
            "{} cannot be updated directly",
            st.principal_url()
        )));
    }
    Ok(())
}

/// Applies the effects of a successful network-account update: parse into
/// the pending globals and, on the Directory, stage the update on the
/// system ledger for the next anchor.
pub fn apply(
    partition: &PartitionInfo, pending: &mut GlobalValues,
    batch: &mut Batch<'_>, delivery: &Delivery,
) -> Result<()> {
    let name = match target_name(
        partition,
        &delivery.transaction.header.principal,
    ) {
        Some(name) => name,
        None => return Ok(()),
    };

    let entry = match &delivery.transaction.body {
        TransactionBody::WriteData(body) => Some(&body.entry),
        TransactionBody::SystemWriteData(body) => Some(&body.entry),
        TransactionBody::UpdateKeyPage(_) => None,
        _ => return Ok(()),
    };
    match entry {
        Some(entry) => {
            if !MANAGED.contains(&name.as_str()) {
                return Ok(());
            }
            parse_update(pending, &name, entry)?;
        }
        None => {
            // Only operator-page updates are pushed to the BVNs.
            if name != format!("{}/1", consts::OPERATOR_BOOK) {
                return Ok(());
            }
        }
    }

    if partition.is_directory() {
        let ledger_url = partition.ledger_url();
        let mut ledger = match batch.get_account(&ledger_url)? {
            Some(Account::SystemLedger(ledger)) => ledger,
            _ => SystemLedger { url: ledger_url, ..Default::default() },
        };
        ledger.pending_updates.push(NetworkAccountUpdate {
            name,
            body: delivery.transaction.body.clone(),
        });
        batch.put_account(&Account::SystemLedger(ledger))?;
    }
    Ok(())
}

fn parse_update(
    values: &mut GlobalValues, name: &str, entry: &primitives::DataEntry,
) -> Result<()> {
    match name {
        consts::ORACLE => values.parse_oracle(entry),
        consts::GLOBALS => values.parse_globals(entry),
        consts::NETWORK => values.parse_network(entry),
        consts::ROUTING => values.parse_routing(entry),
        _ => Ok(()),
    }
}

/// Parses every pushed update in a directory anchor into the pending
/// globals of a BVN.
pub fn absorb_pushed_updates(
    pending: &mut GlobalValues, updates: &[NetworkAccountUpdate],
) -> Result<()> {
    for update in updates {
        if let TransactionBody::WriteData(body) = &update.body {
            parse_update(pending, &update.name, &body.entry)?;
        }
    }
    Ok(())
}
