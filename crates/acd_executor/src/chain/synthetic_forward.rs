// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    Error, Result, Transaction, TransactionResult, TransactionType,
};

/// Unwraps a forwarded transaction and queues it for delivery inside the
/// current block, as work produced by the engine.
pub struct SyntheticForward;

impl TransactionExecutor for SyntheticForward {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticForwardTransaction
    }

    fn allow_missing_principal(&self, _txn: &Transaction) -> Option<bool> {
        // The forward's own principal is the inner transaction's; the
        // inner delivery applies its own rules.
        Some(true)
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, SyntheticForwardTransaction);
        let inner = body
            .transaction
            .as_ref()
            .ok_or_else(|| Error::bad_request("forward has no transaction"))?;
        st.forward(inner.as_ref().clone(), body.signatures.clone());
        Ok(None)
    }
}
