// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    Account, Error, Result, TokenIssuer, TransactionResult, TransactionType,
};

pub struct CreateToken;

impl TransactionExecutor for CreateToken {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateToken
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, CreateToken);
        if body.precision > 18 {
            return Err(Error::bad_request(
                "precision must be in range 0 to 18",
            ));
        }
        if !st.principal_url().prefix_of(&body.url) {
            return Err(Error::bad_request(format!(
                "{} is not under {}",
                body.url,
                st.principal_url()
            )));
        }

        let auth = st.build_auth(&body.authorities)?;
        st.create(Account::TokenIssuer(TokenIssuer {
            url: body.url.clone(),
            auth,
            symbol: body.symbol.clone(),
            precision: body.precision,
            supply_limit: body.supply_limit,
            issued: 0,
        }))?;
        Ok(None)
    }
}
