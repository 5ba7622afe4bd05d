// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    key_page::KeySpec,
    transaction::KeyPageOperation,
    Account, Error, Result, Status, TransactionResult, TransactionType,
};

pub struct UpdateKeyPage;

impl TransactionExecutor for UpdateKeyPage {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::UpdateKeyPage
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, UpdateKeyPage);
        if body.operations.is_empty() {
            return Err(Error::bad_request("no operations"));
        }

        let mut page = match st.principal()? {
            Account::KeyPage(page) => page.clone(),
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!("{} is not a key page", other.url()),
                ));
            }
        };

        apply_page_operations(&mut page, &body.operations)?;
        st.update(&Account::KeyPage(page))?;
        Ok(None)
    }
}

/// Applies page operations in order. Shared with the directory-anchor
/// executor, which mirrors operator-page updates pushed from the DN.
pub(crate) fn apply_page_operations(
    page: &mut primitives::KeyPage, operations: &[KeyPageOperation],
) -> Result<()> {
    for operation in operations {
        match operation {
            KeyPageOperation::Add { entry } => {
                if page.entry_index(&entry.key_hash).is_some() {
                    return Err(Error::bad_request(
                        "key is already on the page",
                    ));
                }
                page.keys.push(KeySpec {
                    public_key_hash: entry.key_hash.clone(),
                    delegate: entry.delegate.clone(),
                    last_used: 0,
                });
            }
            KeyPageOperation::Remove { entry } => {
                let index =
                    page.entry_index(&entry.key_hash).ok_or_else(|| {
                        Error::bad_request("key is not on the page")
                    })?;
                page.keys.remove(index);
                if page.keys.is_empty() {
                    return Err(Error::bad_request(
                        "cannot remove the last key",
                    ));
                }
                if page.accept_threshold > page.keys.len() as u64 {
                    page.accept_threshold = page.keys.len() as u64;
                }
            }
            KeyPageOperation::Update { old, new } => {
                let index =
                    page.entry_index(&old.key_hash).ok_or_else(|| {
                        Error::bad_request("key is not on the page")
                    })?;
                page.keys[index].public_key_hash = new.key_hash.clone();
                page.keys[index].delegate = new.delegate.clone();
            }
            KeyPageOperation::SetThreshold { threshold } => {
                if *threshold == 0 || *threshold > page.keys.len() as u64 {
                    return Err(Error::bad_request(format!(
                        "threshold {} is out of range for {} keys",
                        threshold,
                        page.keys.len()
                    )));
                }
                page.accept_threshold = *threshold;
            }
        }
    }

    // Any change voids signatures collected against the old version.
    page.version += 1;
    Ok(())
}
