// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    key_page::{KeyPage, KeySpec},
    Account, AccountAuth, Error, KeyBook, Result, TransactionResult,
    TransactionType,
};

pub struct CreateKeyBook;

impl TransactionExecutor for CreateKeyBook {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateKeyBook
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, CreateKeyBook);
        if !st.principal_url().prefix_of(&body.url) {
            return Err(Error::bad_request(format!(
                "{} is not under {}",
                body.url,
                st.principal_url()
            )));
        }
        if body.public_key_hash.is_empty() {
            return Err(Error::bad_request("a key hash is required"));
        }

        let auth = if body.authorities.is_empty() {
            AccountAuth::with_authority(body.url.clone())
        } else {
            st.build_auth(&body.authorities)?
        };
        st.create(Account::KeyBook(KeyBook {
            url: body.url.clone(),
            auth,
            page_count: 1,
        }))?;
        st.create(Account::KeyPage(KeyPage {
            url: body.url.join("1"),
            accept_threshold: 1,
            version: 1,
            keys: vec![KeySpec {
                public_key_hash: body.public_key_hash.clone(),
                delegate: None,
                last_used: 0,
            }],
            ..Default::default()
        }))?;
        Ok(None)
    }
}
