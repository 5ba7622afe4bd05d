// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, deposit_tokens_local, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use acd_types::parse_lite_token_address;
use primitives::{
    Result, Transaction, TransactionResult, TransactionType,
};

pub struct SyntheticDepositTokens;

impl TransactionExecutor for SyntheticDepositTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticDepositTokens
    }

    fn allow_missing_principal(&self, txn: &Transaction) -> Option<bool> {
        // A deposit to a lite token address creates the account.
        Some(parse_lite_token_address(&txn.header.principal).is_ok())
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, SyntheticDepositTokens);
        let principal = st.principal_url().clone();
        deposit_tokens_local(st, &principal, &body.token, body.amount)?;
        Ok(None)
    }
}
