// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    transaction::{self, SyntheticOrigin},
    Account, Error, Result, Status, TransactionBody, TransactionResult,
    TransactionType,
};

pub struct BurnTokens;

impl TransactionExecutor for BurnTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::BurnTokens
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, BurnTokens);
        if body.amount == 0 {
            return Err(Error::bad_request("amount must be nonzero"));
        }

        let mut principal = st.principal()?.clone();
        let token_url = match &mut principal {
            Account::TokenAccount(account) => {
                if account.balance < body.amount {
                    return Err(Error::new(
                        Status::InsufficientBalance,
                        format!(
                            "balance {} is less than {}",
                            account.balance, body.amount
                        ),
                    ));
                }
                account.balance -= body.amount;
                account.token_url.clone()
            }
            Account::LiteTokenAccount(account) => {
                if account.balance < body.amount {
                    return Err(Error::new(
                        Status::InsufficientBalance,
                        format!(
                            "balance {} is less than {}",
                            account.balance, body.amount
                        ),
                    ));
                }
                account.balance -= body.amount;
                account.token_url.clone()
            }
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!("{} cannot burn tokens", other.url()),
                ));
            }
        };
        st.update(&principal)?;

        if st.router.routes_to(&token_url, &st.partition.id)? {
            // The issuer is local: shrink the supply directly.
            let mut issuer = match st.require_account(&token_url)? {
                Account::TokenIssuer(issuer) => issuer,
                _ => {
                    return Err(Error::bad_request(format!(
                        "{} is not a token issuer",
                        token_url
                    )));
                }
            };
            issuer.issued = issuer.issued.saturating_sub(body.amount);
            st.update(&Account::TokenIssuer(issuer))?;
        } else {
            st.submit(
                token_url,
                TransactionBody::SyntheticBurnTokens(
                    transaction::SyntheticBurnTokens {
                        origin: SyntheticOrigin::default(),
                        amount: body.amount,
                    },
                ),
            );
        }
        Ok(None)
    }
}
