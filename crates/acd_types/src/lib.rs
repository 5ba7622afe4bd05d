// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Core types shared by every Accord crate: the `acc://` URL model, the
//! 32-byte hash newtype, transaction IDs, and partition routing.

#[macro_use]
extern crate lazy_static;

pub mod consts;
mod errors;
mod hash;
mod lite;
mod txid;
mod url;

pub use self::{
    errors::UrlError,
    hash::{sha256, sha256_concat, Hash},
    lite::{
        lite_data_account_url, lite_identity_url, lite_token_account_url,
        parse_lite_data_address, parse_lite_identity, parse_lite_token_address,
    },
    txid::TxId,
    url::Url,
};
