// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! User transaction bodies: submitted by external signers.

use crate::data::DataEntry;
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{Hash, Url};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateIdentity {
    pub url: Url,
    pub key_hash: Vec<u8>,
    pub key_book_url: Option<Url>,
    pub authorities: Vec<Url>,
}

impl CreateIdentity {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_bytes(3, &self.key_hash);
        if let Some(book) = &self.key_book_url {
            w.write_url(4, book);
        }
        w.write_urls(5, &self.authorities);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(CreateIdentity {
            url: r.read_required_url(2)?,
            key_hash: r.read_bytes(3)?,
            key_book_url: r.read_url(4)?,
            authorities: r.read_urls(5)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTokenAccount {
    pub url: Url,
    pub token_url: Url,
    pub authorities: Vec<Url>,
}

impl CreateTokenAccount {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_url(3, &self.token_url);
        w.write_urls(4, &self.authorities);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(CreateTokenAccount {
            url: r.read_required_url(2)?,
            token_url: r.read_required_url(3)?,
            authorities: r.read_urls(4)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRecipient {
    pub url: Url,
    pub amount: u128,
}

impl Encodable for TokenRecipient {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.url);
        w.write_biguint(2, self.amount);
    }
}

impl Decodable for TokenRecipient {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(TokenRecipient {
            url: r.read_required_url(1)?,
            amount: r.read_biguint(2)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendTokens {
    pub to: Vec<TokenRecipient>,
}

impl SendTokens {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_values(2, &self.to);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(SendTokens { to: r.read_values(2)? })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDataAccount {
    pub url: Url,
    pub authorities: Vec<Url>,
}

impl CreateDataAccount {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_urls(3, &self.authorities);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(CreateDataAccount {
            url: r.read_required_url(2)?,
            authorities: r.read_urls(3)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteData {
    pub entry: DataEntry,
    pub scratch: bool,
    pub write_to_state: bool,
}

impl WriteData {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_value(2, &self.entry);
        w.write_bool(3, self.scratch);
        w.write_bool(4, self.write_to_state);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(WriteData {
            entry: r.read_value(2)?.unwrap_or_default(),
            scratch: r.read_bool(3)?,
            write_to_state: r.read_bool(4)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteDataTo {
    pub recipient: Url,
    pub entry: DataEntry,
}

impl WriteDataTo {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.recipient);
        w.write_value(3, &self.entry);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(WriteDataTo {
            recipient: r.read_required_url(2)?,
            entry: r.read_value(3)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcmeFaucet {
    pub url: Url,
}

impl AcmeFaucet {
    /// Tokens granted per faucet transaction, in ACME base units.
    pub const AMOUNT: u128 = 2_000_000_000_000;

    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(AcmeFaucet { url: r.read_required_url(2)? })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateToken {
    pub url: Url,
    pub symbol: String,
    pub precision: u64,
    pub supply_limit: u128,
    pub authorities: Vec<Url>,
}

impl CreateToken {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_string(3, &self.symbol);
        w.write_uint(4, self.precision);
        w.write_biguint(5, self.supply_limit);
        w.write_urls(6, &self.authorities);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(CreateToken {
            url: r.read_required_url(2)?,
            symbol: r.read_string(3)?,
            precision: r.read_uint(4)?,
            supply_limit: r.read_biguint(5)?,
            authorities: r.read_urls(6)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueTokens {
    pub recipient: Url,
    pub amount: u128,
}

impl IssueTokens {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.recipient);
        w.write_biguint(3, self.amount);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(IssueTokens {
            recipient: r.read_required_url(2)?,
            amount: r.read_biguint(3)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BurnTokens {
    pub amount: u128,
}

impl BurnTokens {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_biguint(2, self.amount);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(BurnTokens { amount: r.read_biguint(2)? })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpecParams {
    pub key_hash: Vec<u8>,
    pub delegate: Option<Url>,
}

impl Encodable for KeySpecParams {
    fn append(&self, w: &mut Writer) {
        w.write_bytes(1, &self.key_hash);
        if let Some(delegate) = &self.delegate {
            w.write_url(2, delegate);
        }
    }
}

impl Decodable for KeySpecParams {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(KeySpecParams { key_hash: r.read_bytes(1)?, delegate: r.read_url(2)? })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateKeyPage {
    pub keys: Vec<KeySpecParams>,
}

impl CreateKeyPage {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_values(2, &self.keys);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(CreateKeyPage { keys: r.read_values(2)? })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateKeyBook {
    pub url: Url,
    pub public_key_hash: Vec<u8>,
    pub authorities: Vec<Url>,
}

impl CreateKeyBook {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_bytes(3, &self.public_key_hash);
        w.write_urls(4, &self.authorities);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(CreateKeyBook {
            url: r.read_required_url(2)?,
            public_key_hash: r.read_bytes(3)?,
            authorities: r.read_urls(4)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddCredits {
    pub recipient: Url,
    /// ACME spent, in base units.
    pub amount: u128,
    /// The oracle price the sender observed, checked against the active
    /// oracle at execution.
    pub oracle: u64,
}

impl AddCredits {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.recipient);
        w.write_biguint(3, self.amount);
        w.write_uint(4, self.oracle);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(AddCredits {
            recipient: r.read_required_url(2)?,
            amount: r.read_biguint(3)?,
            oracle: r.read_uint(4)?,
        })
    }
}

/// One mutation of a key page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPageOperation {
    Add { entry: KeySpecParams },
    Remove { entry: KeySpecParams },
    Update { old: KeySpecParams, new: KeySpecParams },
    SetThreshold { threshold: u64 },
}

impl Encodable for KeyPageOperation {
    fn append(&self, w: &mut Writer) {
        match self {
            KeyPageOperation::Add { entry } => {
                w.write_uint(1, 1);
                w.write_value(2, entry);
            }
            KeyPageOperation::Remove { entry } => {
                w.write_uint(1, 2);
                w.write_value(2, entry);
            }
            KeyPageOperation::Update { old, new } => {
                w.write_uint(1, 3);
                w.write_value(2, old);
                w.write_value(3, new);
            }
            KeyPageOperation::SetThreshold { threshold } => {
                w.write_uint(1, 4);
                w.write_uint(2, *threshold);
            }
        }
    }
}

impl Decodable for KeyPageOperation {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        match r.read_uint(1)? {
            1 => Ok(KeyPageOperation::Add {
                entry: r.read_value(2)?.unwrap_or_default(),
            }),
            2 => Ok(KeyPageOperation::Remove {
                entry: r.read_value(2)?.unwrap_or_default(),
            }),
            3 => Ok(KeyPageOperation::Update {
                old: r.read_value(2)?.unwrap_or_default(),
                new: r.read_value(3)?.unwrap_or_default(),
            }),
            4 => Ok(KeyPageOperation::SetThreshold {
                threshold: r.read_uint(2)?,
            }),
            code => Err(DecoderError::UnknownType("key page operation", code)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateKeyPage {
    pub operations: Vec<KeyPageOperation>,
}

impl UpdateKeyPage {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_values(2, &self.operations);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(UpdateKeyPage { operations: r.read_values(2)? })
    }
}

/// Replaces the key that signed the transaction with a new key. Always
/// single-signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateKey {
    pub new_key_hash: Vec<u8>,
}

impl UpdateKey {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_bytes(2, &self.new_key_hash);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(UpdateKey { new_key_hash: r.read_bytes(2)? })
    }
}

/// One mutation of an account's authority set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountAuthOperation {
    Enable { authority: Url },
    Disable { authority: Url },
    AddAuthority { authority: Url },
    RemoveAuthority { authority: Url },
}

impl AccountAuthOperation {
    fn code(&self) -> u64 {
        match self {
            AccountAuthOperation::Enable { .. } => 1,
            AccountAuthOperation::Disable { .. } => 2,
            AccountAuthOperation::AddAuthority { .. } => 3,
            AccountAuthOperation::RemoveAuthority { .. } => 4,
        }
    }

    pub fn authority(&self) -> &Url {
        match self {
            AccountAuthOperation::Enable { authority }
            | AccountAuthOperation::Disable { authority }
            | AccountAuthOperation::AddAuthority { authority }
            | AccountAuthOperation::RemoveAuthority { authority } => authority,
        }
    }
}

impl Encodable for AccountAuthOperation {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.code());
        w.write_url(2, self.authority());
    }
}

impl Decodable for AccountAuthOperation {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        let code = r.read_uint(1)?;
        let authority = r.read_required_url(2)?;
        Ok(match code {
            1 => AccountAuthOperation::Enable { authority },
            2 => AccountAuthOperation::Disable { authority },
            3 => AccountAuthOperation::AddAuthority { authority },
            4 => AccountAuthOperation::RemoveAuthority { authority },
            _ => {
                return Err(DecoderError::UnknownType(
                    "account auth operation",
                    code,
                ));
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateAccountAuth {
    pub operations: Vec<AccountAuthOperation>,
}

impl UpdateAccountAuth {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_values(2, &self.operations);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(UpdateAccountAuth { operations: r.read_values(2)? })
    }
}

/// A placeholder body for a transaction whose principal lives on another
/// partition; carries only the hash being signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteTransaction {
    pub hash: Hash,
}

impl RemoteTransaction {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_hash(2, &self.hash);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(RemoteTransaction { hash: r.read_hash(2)? })
    }
}
