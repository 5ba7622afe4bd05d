// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, deposit_tokens_local, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    transaction::{self, SyntheticOrigin},
    Account, Error, Result, Status, TransactionBody, TransactionResult,
    TransactionType,
};

pub struct IssueTokens;

impl TransactionExecutor for IssueTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::IssueTokens
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, IssueTokens);
        if body.amount == 0 {
            return Err(Error::bad_request("amount must be nonzero"));
        }

        let mut issuer = match st.principal()? {
            Account::TokenIssuer(issuer) => issuer.clone(),
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!(
                        "{} is not a token issuer",
                        other.url()
                    ),
                ));
            }
        };
        let issued = issuer.issued.saturating_add(body.amount);
        if issuer.supply_limit != 0 && issued > issuer.supply_limit {
            return Err(Error::bad_request(format!(
                "issuing {} would exceed the supply limit",
                body.amount
            )));
        }
        issuer.issued = issued;
        let token_url = issuer.url.clone();
        st.update(&Account::TokenIssuer(issuer))?;

        if st.router.routes_to(&body.recipient, &st.partition.id)? {
            deposit_tokens_local(st, &body.recipient, &token_url, body.amount)?;
        } else {
            st.submit(
                body.recipient.clone(),
                TransactionBody::SyntheticDepositTokens(
                    transaction::SyntheticDepositTokens {
                        origin: SyntheticOrigin::default(),
                        token: token_url,
                        amount: body.amount,
                    },
                ),
            );
        }
        Ok(None)
    }
}
