// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    Account, Error, Result, TokenAccount, TransactionResult, TransactionType,
};

pub struct CreateTokenAccount;

impl TransactionExecutor for CreateTokenAccount {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateTokenAccount
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, CreateTokenAccount);
        if !st.principal_url().prefix_of(&body.url) {
            return Err(Error::bad_request(format!(
                "{} is not under {}",
                body.url,
                st.principal_url()
            )));
        }

        // A local token issuer must exist; a remote one is taken on faith
        // and checked when deposits route through it.
        if st.router.routes_to(&body.token_url, &st.partition.id)? {
            match st.require_account(&body.token_url)? {
                Account::TokenIssuer(_) => {}
                _ => {
                    return Err(Error::bad_request(format!(
                        "{} is not a token issuer",
                        body.token_url
                    )));
                }
            }
        }

        let auth = st.build_auth(&body.authorities)?;
        st.create(Account::TokenAccount(TokenAccount {
            url: body.url.clone(),
            auth,
            token_url: body.token_url.clone(),
            balance: 0,
        }))?;
        Ok(None)
    }
}
