// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    Error, Result, Signer as _, TransactionResult, TransactionType,
};

pub struct SyntheticDepositCredits;

impl TransactionExecutor for SyntheticDepositCredits {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticDepositCredits
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, SyntheticDepositCredits);
        let mut principal = st.principal()?.clone();
        match principal.as_signer_mut() {
            Some(signer) => signer.credit_credits(body.amount),
            None => {
                return Err(Error::bad_request(format!(
                    "{} cannot hold credits",
                    st.principal_url()
                )));
            }
        }
        st.update(&principal)?;
        Ok(None)
    }
}
