// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    Account, DataAccount, Error, Result, TransactionResult, TransactionType,
};

pub struct CreateDataAccount;

impl TransactionExecutor for CreateDataAccount {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateDataAccount
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, CreateDataAccount);
        if !st.principal_url().prefix_of(&body.url) {
            return Err(Error::bad_request(format!(
                "{} is not under {}",
                body.url,
                st.principal_url()
            )));
        }
        let auth = st.build_auth(&body.authorities)?;
        st.create(Account::DataAccount(DataAccount {
            url: body.url.clone(),
            auth,
            entry: None,
        }))?;
        Ok(None)
    }
}
