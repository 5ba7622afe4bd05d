// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{body, StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    key_page::{KeyPage, KeySpec},
    Account, Error, Result, Status, TransactionResult, TransactionType,
};

pub struct CreateKeyPage;

impl TransactionExecutor for CreateKeyPage {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateKeyPage
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = body!(delivery, CreateKeyPage);
        if body.keys.is_empty() {
            return Err(Error::bad_request("a page needs at least one key"));
        }

        let mut book = match st.principal()? {
            Account::KeyBook(book) => book.clone(),
            other => {
                return Err(Error::new(
                    Status::InvalidPrincipal,
                    format!("{} is not a key book", other.url()),
                ));
            }
        };
        book.page_count += 1;
        let page_url = book.page_url(book.page_count);

        let keys = body
            .keys
            .iter()
            .map(|params| KeySpec {
                public_key_hash: params.key_hash.clone(),
                delegate: params.delegate.clone(),
                last_used: 0,
            })
            .collect();
        st.create(Account::KeyPage(KeyPage {
            url: page_url,
            accept_threshold: 1,
            version: 1,
            keys,
            ..Default::default()
        }))?;
        st.update(&Account::KeyBook(book))?;
        Ok(None)
    }
}
