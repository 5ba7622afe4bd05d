// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    Error, Result, Transaction, TransactionResult, TransactionType,
};

pub struct SyntheticCreateIdentity;

impl TransactionExecutor for SyntheticCreateIdentity {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticCreateIdentity
    }

    fn allow_missing_principal(&self, _txn: &Transaction) -> Option<bool> {
        // The whole point is to create the principal.
        Some(true)
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, SyntheticCreateIdentity);
        if body.accounts.is_empty() {
            return Err(Error::bad_request("no accounts to create"));
        }
        for account in &body.accounts {
            if st.load_account(account.url())?.is_some() {
                return Err(Error::bad_request(format!(
                    "{} already exists",
                    account.url()
                )));
            }
        }
        for account in &body.accounts {
            st.create(account.clone())?;
        }
        Ok(None)
    }
}
