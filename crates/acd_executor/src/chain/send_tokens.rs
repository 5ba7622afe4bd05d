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

pub struct SendTokens;

impl TransactionExecutor for SendTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SendTokens
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, SendTokens);
        if body.to.is_empty() {
            return Err(Error::bad_request("no recipients"));
        }
        let total: u128 = body.to.iter().map(|r| r.amount).sum();
        if body.to.iter().any(|r| r.amount == 0) {
            return Err(Error::bad_request("amount must be nonzero"));
        }

        let (token_url, balance) = match st.principal()? {
            Account::TokenAccount(a) => (a.token_url.clone(), a.balance),
            Account::LiteTokenAccount(a) => (a.token_url.clone(), a.balance),
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!(
                        "{} cannot send tokens",
                        other.account_type().code()
                    ),
                ));
            }
        };
        if balance < total {
            return Err(Error::new(
                Status::InsufficientBalance,
                format!("balance {} is less than {}", balance, total),
            ));
        }

        // Debit the sender.
        let mut principal = st.principal()?.clone();
        match &mut principal {
            Account::TokenAccount(a) => a.balance -= total,
            Account::LiteTokenAccount(a) => a.balance -= total,
            _ => unreachable!("checked above"),
        }
        st.update(&principal)?;

        // Credit local recipients directly; everyone else gets a synthetic
        // deposit sequenced to their partition.
        for recipient in &body.to {
            if st.router.routes_to(&recipient.url, &st.partition.id)? {
                crate::chain::deposit_tokens_local(
                    st,
                    &recipient.url,
                    &token_url,
                    recipient.amount,
                )?;
            } else {
                st.submit(
                    recipient.url.clone(),
                    TransactionBody::SyntheticDepositTokens(
                        transaction::SyntheticDepositTokens {
                            origin: SyntheticOrigin::default(),
                            token: token_url.clone(),
                            amount: recipient.amount,
                        },
                    ),
                );
            }
        }
        Ok(None)
    }
}
