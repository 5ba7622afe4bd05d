// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    fees::credits_for_acme,
    transaction::{self, SyntheticOrigin},
    Account, Error, Result, Signer as _, Status, TransactionBody,
    TransactionResult, TransactionType,
};

/// The ACME token's decimal precision.
const ACME_PRECISION: u64 = 8;

pub struct AddCredits;

impl TransactionExecutor for AddCredits {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::AddCredits
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, AddCredits);
        if body.amount == 0 {
            return Err(Error::bad_request("amount must be nonzero"));
        }

        // The stated oracle price must match the active oracle; otherwise
        // the sender would be buying at a price they did not see.
        let price = st.globals.oracle.price;
        if body.oracle != price {
            return Err(Error::bad_request(format!(
                "oracle price mismatch: transaction says {}, network says {}",
                body.oracle, price
            )));
        }
        let credits = credits_for_acme(body.amount, price, ACME_PRECISION);
        if credits == 0 {
            return Err(Error::bad_request(
                "amount is too small to purchase any credits",
            ));
        }

        let mut principal = st.principal()?.clone();
        match &mut principal {
            Account::TokenAccount(account) => {
                if account.token_url != acd_types::consts::acme_url() {
                    return Err(Error::bad_request(
                        "credits may only be purchased with ACME",
                    ));
                }
                if account.balance < body.amount {
                    return Err(Error::new(
                        Status::InsufficientBalance,
                        "insufficient ACME balance",
                    ));
                }
                account.balance -= body.amount;
            }
            Account::LiteTokenAccount(account) => {
                if account.token_url != acd_types::consts::acme_url() {
                    return Err(Error::bad_request(
                        "credits may only be purchased with ACME",
                    ));
                }
                if account.balance < body.amount {
                    return Err(Error::new(
                        Status::InsufficientBalance,
                        "insufficient ACME balance",
                    ));
                }
                account.balance -= body.amount;
            }
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!("{} cannot purchase credits", other.url()),
                ));
            }
        }
        st.update(&principal)?;

        if st.router.routes_to(&body.recipient, &st.partition.id)? {
            let mut recipient = st.require_account(&body.recipient)?;
            match recipient.as_signer_mut() {
                Some(signer) => signer.credit_credits(credits),
                None => {
                    return Err(Error::bad_request(format!(
                        "{} cannot hold credits",
                        body.recipient
                    )));
                }
            }
            st.update(&recipient)?;
        } else {
            st.submit(
                body.recipient.clone(),
                TransactionBody::SyntheticDepositCredits(
                    transaction::SyntheticDepositCredits {
                        origin: SyntheticOrigin::default(),
                        amount: credits,
                    },
                ),
            );
        }
        Ok(None)
    }
}
