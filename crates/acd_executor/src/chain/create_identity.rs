// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    chain::{StateManager, TransactionExecutor},
    delivery::Delivery,
};
use primitives::{
    key_page::{KeyPage, KeySpec},
    transaction::{self, SyntheticOrigin},
    Account, AccountAuth, Error, Identity, KeyBook, Result, TransactionBody,
    TransactionResult, TransactionType,
};

pub struct CreateIdentity;

impl TransactionExecutor for CreateIdentity {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateIdentity
    }

    fn execute(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        self.validate(st, delivery)
    }

    fn validate(
        &self, st: &mut StateManager<'_, '_>, delivery: &Delivery,
    ) -> Result<Option<TransactionResult>> {
        let body = match &delivery.transaction.body {
            TransactionBody::CreateIdentity(body) => body,
            other => {
                return Err(Error::internal(format!(
                    "invalid payload: want CreateIdentity, got {}",
                    other.transaction_type()
                )));
            }
        };

        if body.url.query().is_some() || body.url.fragment().is_some() {
            return Err(Error::bad_request(format!(
                "{} is not a valid identity URL",
                body.url
            )));
        }
        if !body.url.is_root_identity()
            && !st.principal_url().prefix_of(&body.url)
        {
            return Err(Error::bad_request(format!(
                "a sub-identity of {} must be created by its parent",
                body.url.identity()
            )));
        }

        // Build the identity with its book and first page.
        let book_url = match &body.key_book_url {
            Some(url) => {
                if !body.url.prefix_of(url) {
                    return Err(Error::bad_request(format!(
                        "key book {} is not under {}",
                        url, body.url
                    )));
                }
                url.clone()
            }
            None => body.url.join("book"),
        };

        let mut accounts = Vec::new();
        let mut auth = AccountAuth::default();
        if body.authorities.is_empty() {
            auth.add_authority(book_url.clone());
        } else {
            for authority in &body.authorities {
                auth.add_authority(authority.clone());
            }
        }
        accounts.push(Account::Identity(Identity {
            url: body.url.clone(),
            auth: auth.clone(),
        }));

        if body.authorities.is_empty() {
            if body.key_hash.is_empty() {
                return Err(Error::bad_request(
                    "a key hash or an authority set is required",
                ));
            }
            accounts.push(Account::KeyBook(KeyBook {
                url: book_url.clone(),
                auth: AccountAuth::with_authority(book_url.clone()),
                page_count: 1,
            }));
            accounts.push(Account::KeyPage(KeyPage {
                url: book_url.join("1"),
                accept_threshold: 1,
                version: 1,
                keys: vec![KeySpec {
                    public_key_hash: body.key_hash.clone(),
                    delegate: None,
                    last_used: 0,
                }],
                ..Default::default()
            }));
        }

        if st.router.routes_to(&body.url, &st.partition.id)? {
            for account in accounts {
                st.create(account)?;
            }
        } else {
            st.submit(
                body.url.clone(),
                TransactionBody::SyntheticCreateIdentity(
                    transaction::SyntheticCreateIdentity {
                        origin: SyntheticOrigin::default(),
                        accounts,
                    },
                ),
            );
        }
        Ok(None)
    }
}
