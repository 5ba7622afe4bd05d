// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use acd_types::parse_lite_data_address;
use primitives::{
    Account, Error, LiteDataAccount, Result, Transaction, TransactionResult,
    TransactionType,
};

pub struct WriteData;

impl TransactionExecutor for WriteData {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::WriteData
    }

    fn allow_missing_principal(&self, txn: &Transaction) -> Option<bool> {
        // Writing to a lite data address creates the account.
        Some(parse_lite_data_address(&txn.header.principal).is_ok())
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, WriteData);
        if body.entry.size() == 0 {
            return Err(Error::bad_request("empty data entry"));
        }
        if body.scratch && body.write_to_state {
            return Err(Error::bad_request(
                "scratch entries cannot be written to state",
            ));
        }

        let principal_url = st.principal_url().clone();
        match st.principal_opt() {
            Some(Account::DataAccount(account)) => {
                if body.write_to_state {
                    let mut account = account.clone();
                    account.entry = Some(body.entry.clone());
                    st.update(&Account::DataAccount(account))?;
                }
            }
            Some(Account::LiteDataAccount(_)) => {}
            Some(other) => {
                return Err(Error::bad_request(format!(
                    "{} is not a data account (type {})",
                    principal_url,
                    other.account_type().code()
                )));
            }
            None => {
                parse_lite_data_address(&principal_url).map_err(|_| {
                    Error::not_found(format!(
                        "{} does not exist",
                        principal_url
                    ))
                })?;
                st.create(Account::LiteDataAccount(LiteDataAccount {
                    url: principal_url.clone(),
                }))?;
            }
        }

        let entry_hash = body.entry.hash();
        let txn_hash = st.txn_hash();
        st.batch().add_data_entry(&principal_url, &entry_hash, &txn_hash)?;
        Ok(Some(TransactionResult::WriteData {
            account: principal_url,
            entry_hash,
        }))
    }
}
