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

pub struct SyntheticBurnTokens;

impl TransactionExecutor for SyntheticBurnTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticBurnTokens
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, SyntheticBurnTokens);
        let mut issuer = match st.principal()? {
            Account::TokenIssuer(issuer) => issuer.clone(),
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!("{} is not a token issuer", other.url()),
                ));
            }
        };
        issuer.issued = issuer.issued.saturating_sub(body.amount);
        st.update(&Account::TokenIssuer(issuer))?;
        Ok(None)
    }
}
