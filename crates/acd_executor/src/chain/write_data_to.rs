// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use acd_types::parse_lite_data_address;
use primitives::{
    transaction::{self, SyntheticOrigin},
    Error, Result, TransactionBody, TransactionResult, TransactionType,
};

pub struct WriteDataTo;

impl TransactionExecutor for WriteDataTo {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::WriteDataTo
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, WriteDataTo);
        parse_lite_data_address(&body.recipient).map_err(|_| {
            Error::bad_request(format!(
                "{} is not a lite data address",
                body.recipient
            ))
        })?;
        if body.entry.size() == 0 {
            return Err(Error::bad_request("empty data entry"));
        }
        st.submit(
            body.recipient.clone(),
            TransactionBody::SyntheticWriteData(transaction::SyntheticWriteData {
                origin: SyntheticOrigin::default(),
                entry: body.entry.clone(),
            }),
        );
        Ok(None)
    }
}
