// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The Accord protocol objects. Everything that goes on chain lives here:
//! accounts, transactions, signatures, statuses, ledgers and the fee
//! schedule, together with their canonical encodings.

pub mod account;
pub mod data;
pub mod errors;
pub mod fees;
pub mod key_page;
pub mod ledger;
pub mod network;
pub mod signature;
pub mod signing;
pub mod status;
pub mod transaction;

pub use self::{
    account::{
        Account, AccountAuth, AccountType, AuthorityEntry, DataAccount,
        Identity, LiteDataAccount, LiteIdentity, LiteTokenAccount,
        TokenAccount, TokenIssuer, UnknownSigner,
    },
    data::DataEntry,
    errors::{Error, Result, Status},
    key_page::{KeyBook, KeyPage, KeySpec},
    ledger::{
        AnchorLedger, NetworkAccountUpdate, PartitionSyntheticLedger,
        SyntheticLedger, SystemLedger,
    },
    signature::{
        DelegatedSignature, InternalSignature, KeySignature,
        PartitionSignature, ReceiptSignature, RemoteSignature, Signature,
        SignatureSet, SignatureType,
    },
    signing::{Signer, SignatureSetData, SigSetEntry},
    status::{TransactionResult, TransactionStatus},
    transaction::{
        Envelope, SyntheticOrigin, Transaction, TransactionBody,
        TransactionHeader, TransactionType,
    },
};

pub use acd_merkle::{Receipt, ReceiptEntry};
