// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    transaction::AccountAuthOperation,
    Error, Result, Status, TransactionResult, TransactionType,
};

pub struct UpdateAccountAuth;

impl TransactionExecutor for UpdateAccountAuth {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::UpdateAccountAuth
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, UpdateAccountAuth);
        if body.operations.is_empty() {
            return Err(Error::bad_request("no operations"));
        }

        let mut principal = st.principal()?.clone();
        let auth = principal.auth_mut().ok_or_else(|| {
            Error::new(
                Status::InvalidPrincipal,
                "this account's authority set cannot be updated",
            )
        })?;

        for operation in &body.operations {
            let authority = operation.authority();
            match operation {
                AccountAuthOperation::Enable { .. } => {
                    auth.entry_mut(authority)
                        .ok_or_else(|| {
                            Error::bad_request(format!(
                                "{} is not an authority",
                                authority
                            ))
                        })?
                        .disabled = false;
                }
                AccountAuthOperation::Disable { .. } => {
                    auth.entry_mut(authority)
                        .ok_or_else(|| {
                            Error::bad_request(format!(
                                "{} is not an authority",
                                authority
                            ))
                        })?
                        .disabled = true;
                }
                AccountAuthOperation::AddAuthority { .. } => {
                    auth.add_authority(authority.clone());
                }
                AccountAuthOperation::RemoveAuthority { .. } => {
                    if !auth.remove_authority(authority) {
                        return Err(Error::bad_request(format!(
                            "{} is not an authority",
                            authority
                        )));
                    }
                    if auth.authorities.is_empty() {
                        return Err(Error::bad_request(
                            "cannot remove the last authority",
                        ));
                    }
                }
            }
        }

        st.update(&principal)?;
        Ok(None)
    }
}
