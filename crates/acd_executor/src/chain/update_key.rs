// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    Account, Error, Result, Status, TransactionResult, TransactionType,
};

/// Replaces the key that initiated the transaction. Always M=1: only the
/// initiator's own signature is required, which lets a key holder rotate
/// a possibly compromised key without waiting on the page threshold.
pub struct UpdateKey;

impl TransactionExecutor for UpdateKey {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::UpdateKey
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, UpdateKey);
        if body.new_key_hash.is_empty() {
            return Err(Error::bad_request("a new key hash is required"));
        }

        // The key to replace is the one that signed.
        let old_key_hash = delivery
            .key_signatures()
            .find_map(|s| s.key_hash())
            .ok_or_else(|| {
                Error::invalid_signature("missing initiator signature")
            })?;

        let mut page = match st.principal()? {
            Account::KeyPage(page) => page.clone(),
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!("{} is not a key page", other.url()),
                ));
            }
        };
        let index = page.entry_index(&old_key_hash).ok_or_else(|| {
            Error::unauthorized("the signing key is not on this page")
        })?;
        if page.entry_index(&body.new_key_hash).is_some() {
            return Err(Error::bad_request("key is already on the page"));
        }
        page.keys[index].public_key_hash = body.new_key_hash.clone();
        page.version += 1;
        st.update(&Account::KeyPage(page))?;
        Ok(None)
    }
}
