// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    data::DataEntry,
    key_page::{KeyBook, KeyPage},
    ledger::{AnchorLedger, SyntheticLedger, SystemLedger},
};
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::Url;

/// Account type codes. Stable wire values; unknown codes round-trip
/// through [`Account::Unknown`] to stay forward compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    Unknown,
    Identity,
    TokenIssuer,
    TokenAccount,
    LiteTokenAccount,
    LiteIdentity,
    KeyPage,
    KeyBook,
    DataAccount,
    LiteDataAccount,
    UnknownSigner,
    SystemLedger,
    AnchorLedger,
    SyntheticLedger,
}

impl AccountType {
    pub fn code(self) -> u64 {
        match self {
            AccountType::Unknown => 0,
            AccountType::Identity => 1,
            AccountType::TokenIssuer => 2,
            AccountType::TokenAccount => 3,
            AccountType::LiteTokenAccount => 4,
            AccountType::LiteIdentity => 5,
            AccountType::KeyPage => 6,
            AccountType::KeyBook => 7,
            AccountType::DataAccount => 8,
            AccountType::LiteDataAccount => 9,
            AccountType::UnknownSigner => 10,
            AccountType::SystemLedger => 11,
            AccountType::AnchorLedger => 12,
            AccountType::SyntheticLedger => 13,
        }
    }

    pub fn from_code(code: u64) -> Option<AccountType> {
        Some(match code {
            0 => AccountType::Unknown,
            1 => AccountType::Identity,
            2 => AccountType::TokenIssuer,
            3 => AccountType::TokenAccount,
            4 => AccountType::LiteTokenAccount,
            5 => AccountType::LiteIdentity,
            6 => AccountType::KeyPage,
            7 => AccountType::KeyBook,
            8 => AccountType::DataAccount,
            9 => AccountType::LiteDataAccount,
            10 => AccountType::UnknownSigner,
            11 => AccountType::SystemLedger,
            12 => AccountType::AnchorLedger,
            13 => AccountType::SyntheticLedger,
            _ => return None,
        })
    }
}

/// One entry of an account's authority set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityEntry {
    pub url: Url,
    pub disabled: bool,
}

impl Encodable for AuthorityEntry {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.url);
        w.write_bool(2, self.disabled);
    }
}

impl Decodable for AuthorityEntry {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(AuthorityEntry {
            url: r.read_required_url(1)?,
            disabled: r.read_bool(2)?,
        })
    }
}

/// An account's ordered authority set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountAuth {
    pub authorities: Vec<AuthorityEntry>,
}

impl AccountAuth {
    pub fn with_authority(url: Url) -> AccountAuth {
        AccountAuth { authorities: vec![AuthorityEntry { url, disabled: false }] }
    }

    pub fn entry(&self, url: &Url) -> Option<&AuthorityEntry> {
        self.authorities.iter().find(|a| a.url == *url)
    }

    pub fn entry_mut(&mut self, url: &Url) -> Option<&mut AuthorityEntry> {
        self.authorities.iter_mut().find(|a| a.url == *url)
    }

    /// Adds an authority, keeping the set ordered by URL.
    pub fn add_authority(&mut self, url: Url) {
        if self.entry(&url).is_some() {
            return;
        }
        self.authorities.push(AuthorityEntry { url, disabled: false });
        self.authorities.sort_by(|a, b| a.url.cmp(&b.url));
    }

    pub fn remove_authority(&mut self, url: &Url) -> bool {
        let before = self.authorities.len();
        self.authorities.retain(|a| a.url != *url);
        self.authorities.len() != before
    }

    pub fn all_disabled(&self) -> bool {
        self.authorities.iter().all(|a| a.disabled)
    }
}

impl Encodable for AccountAuth {
    fn append(&self, w: &mut Writer) {
        w.write_values(1, &self.authorities);
    }
}

impl Decodable for AccountAuth {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(AccountAuth { authorities: r.read_values(1)? })
    }
}

/// An ADI: a named identity that owns sub-accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub url: Url,
    pub auth: AccountAuth,
}

/// A token issuer; `issued` tracks supply against the optional limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenIssuer {
    pub url: Url,
    pub auth: AccountAuth,
    pub symbol: String,
    pub precision: u64,
    pub supply_limit: u128,
    pub issued: u128,
}

/// A token account under an ADI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenAccount {
    pub url: Url,
    pub auth: AccountAuth,
    pub token_url: Url,
    pub balance: u128,
}

/// A lite token account; its authority is the key hash in its URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteTokenAccount {
    pub url: Url,
    pub token_url: Url,
    pub balance: u128,
}

/// A lite identity holds the credit balance for its token accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteIdentity {
    pub url: Url,
    pub credit_balance: u64,
    pub last_used: u64,
}

/// A data account under an ADI. `entry` is the latest entry written with
/// write-to-state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataAccount {
    pub url: Url,
    pub auth: AccountAuth,
    pub entry: Option<DataEntry>,
}

/// A lite data account, addressed by chain ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteDataAccount {
    pub url: Url,
}

/// Placeholder for a signer account of an unrecognized type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownSigner {
    pub url: Url,
    pub version: u64,
}

/// A protocol account. The tagged-variant encoding leads with the type
/// code; unrecognized codes are preserved byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub enum Account {
    Identity(Identity),
    TokenIssuer(TokenIssuer),
    TokenAccount(TokenAccount),
    LiteTokenAccount(LiteTokenAccount),
    LiteIdentity(LiteIdentity),
    KeyPage(KeyPage),
    KeyBook(KeyBook),
    DataAccount(DataAccount),
    LiteDataAccount(LiteDataAccount),
    UnknownSigner(UnknownSigner),
    SystemLedger(SystemLedger),
    AnchorLedger(AnchorLedger),
    SyntheticLedger(SyntheticLedger),
    /// An account of a type this build does not understand. `data` is the
    /// complete original encoding.
    Unknown { type_code: u64, url: Url, data: Vec<u8> },
}

impl Account {
    pub fn account_type(&self) -> AccountType {
        match self {
            Account::Identity(_) => AccountType::Identity,
            Account::TokenIssuer(_) => AccountType::TokenIssuer,
            Account::TokenAccount(_) => AccountType::TokenAccount,
            Account::LiteTokenAccount(_) => AccountType::LiteTokenAccount,
            Account::LiteIdentity(_) => AccountType::LiteIdentity,
            Account::KeyPage(_) => AccountType::KeyPage,
            Account::KeyBook(_) => AccountType::KeyBook,
            Account::DataAccount(_) => AccountType::DataAccount,
            Account::LiteDataAccount(_) => AccountType::LiteDataAccount,
            Account::UnknownSigner(_) => AccountType::UnknownSigner,
            Account::SystemLedger(_) => AccountType::SystemLedger,
            Account::AnchorLedger(_) => AccountType::AnchorLedger,
            Account::SyntheticLedger(_) => AccountType::SyntheticLedger,
            Account::Unknown { .. } => AccountType::Unknown,
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            Account::Identity(a) => &a.url,
            Account::TokenIssuer(a) => &a.url,
            Account::TokenAccount(a) => &a.url,
            Account::LiteTokenAccount(a) => &a.url,
            Account::LiteIdentity(a) => &a.url,
            Account::KeyPage(a) => &a.url,
            Account::KeyBook(a) => &a.url,
            Account::DataAccount(a) => &a.url,
            Account::LiteDataAccount(a) => &a.url,
            Account::UnknownSigner(a) => &a.url,
            Account::SystemLedger(a) => &a.url,
            Account::AnchorLedger(a) => &a.url,
            Account::SyntheticLedger(a) => &a.url,
            Account::Unknown { url, .. } => url,
        }
    }

    /// The authority set, for account types that carry one. Lite accounts
    /// and system ledgers are authorized by other rules.
    pub fn auth(&self) -> Option<&AccountAuth> {
        match self {
            Account::Identity(a) => Some(&a.auth),
            Account::TokenIssuer(a) => Some(&a.auth),
            Account::TokenAccount(a) => Some(&a.auth),
            Account::KeyBook(a) => Some(&a.auth),
            Account::DataAccount(a) => Some(&a.auth),
            _ => None,
        }
    }

    pub fn auth_mut(&mut self) -> Option<&mut AccountAuth> {
        match self {
            Account::Identity(a) => Some(&mut a.auth),
            Account::TokenIssuer(a) => Some(&mut a.auth),
            Account::TokenAccount(a) => Some(&mut a.auth),
            Account::KeyBook(a) => Some(&mut a.auth),
            Account::DataAccount(a) => Some(&mut a.auth),
            _ => None,
        }
    }

    /// The authorities that govern this account. A key page inherits its
    /// book; a lite account is governed by its own URL.
    pub fn authorities(&self) -> Vec<AuthorityEntry> {
        if let Some(auth) = self.auth() {
            return auth.authorities.clone();
        }
        match self {
            Account::KeyPage(page) => vec![AuthorityEntry {
                url: page.book_url(),
                disabled: false,
            }],
            Account::LiteTokenAccount(a) => vec![AuthorityEntry {
                url: a.url.root_identity(),
                disabled: false,
            }],
            Account::LiteIdentity(a) => {
                vec![AuthorityEntry { url: a.url.clone(), disabled: false }]
            }
            _ => Vec::new(),
        }
    }
}

impl Encodable for Account {
    fn append(&self, w: &mut Writer) {
        match self {
            Account::Unknown { data, .. } => {
                // Preserve the original bytes of a newer account type.
                w.write_raw(data);
                return;
            }
            _ => w.write_uint(1, self.account_type().code()),
        }
        match self {
            Account::Identity(a) => {
                w.write_url(2, &a.url);
                w.write_value(3, &a.auth);
            }
            Account::TokenIssuer(a) => {
                w.write_url(2, &a.url);
                w.write_value(3, &a.auth);
                w.write_string(4, &a.symbol);
                w.write_uint(5, a.precision);
                w.write_biguint(6, a.supply_limit);
                w.write_biguint(7, a.issued);
            }
            Account::TokenAccount(a) => {
                w.write_url(2, &a.url);
                w.write_value(3, &a.auth);
                w.write_url(4, &a.token_url);
                w.write_biguint(5, a.balance);
            }
            Account::LiteTokenAccount(a) => {
                w.write_url(2, &a.url);
                w.write_url(3, &a.token_url);
                w.write_biguint(4, a.balance);
            }
            Account::LiteIdentity(a) => {
                w.write_url(2, &a.url);
                w.write_uint(3, a.credit_balance);
                w.write_uint(4, a.last_used);
            }
            Account::KeyPage(a) => a.append_body(w),
            Account::KeyBook(a) => a.append_body(w),
            Account::DataAccount(a) => {
                w.write_url(2, &a.url);
                w.write_value(3, &a.auth);
                if let Some(entry) = &a.entry {
                    w.write_value(4, entry);
                }
            }
            Account::LiteDataAccount(a) => {
                w.write_url(2, &a.url);
            }
            Account::UnknownSigner(a) => {
                w.write_url(2, &a.url);
                w.write_uint(3, a.version);
            }
            Account::SystemLedger(a) => a.append_body(w),
            Account::AnchorLedger(a) => a.append_body(w),
            Account::SyntheticLedger(a) => a.append_body(w),
            Account::Unknown { .. } => unreachable!("handled above"),
        }
    }
}

impl Decodable for Account {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        let input = r.input();
        let code = r.read_uint(1)?;
        let typ = match AccountType::from_code(code) {
            Some(t) => t,
            None => {
                // Forward compatibility: keep the bytes, surface the URL.
                let url = r.read_required_url(2)?;
                r.skip_rest();
                return Ok(Account::Unknown {
                    type_code: code,
                    url,
                    data: input.to_vec(),
                });
            }
        };
        Ok(match typ {
            AccountType::Unknown => {
                return Err(DecoderError::UnknownType("account", code));
            }
            AccountType::Identity => Account::Identity(Identity {
                url: r.read_required_url(2)?,
                auth: r.read_value(3)?.unwrap_or_default(),
            }),
            AccountType::TokenIssuer => Account::TokenIssuer(TokenIssuer {
                url: r.read_required_url(2)?,
                auth: r.read_value(3)?.unwrap_or_default(),
                symbol: r.read_string(4)?,
                precision: r.read_uint(5)?,
                supply_limit: r.read_biguint(6)?,
                issued: r.read_biguint(7)?,
            }),
            AccountType::TokenAccount => Account::TokenAccount(TokenAccount {
                url: r.read_required_url(2)?,
                auth: r.read_value(3)?.unwrap_or_default(),
                token_url: r.read_required_url(4)?,
                balance: r.read_biguint(5)?,
            }),
            AccountType::LiteTokenAccount => {
                Account::LiteTokenAccount(LiteTokenAccount {
                    url: r.read_required_url(2)?,
                    token_url: r.read_required_url(3)?,
                    balance: r.read_biguint(4)?,
                })
            }
            AccountType::LiteIdentity => Account::LiteIdentity(LiteIdentity {
                url: r.read_required_url(2)?,
                credit_balance: r.read_uint(3)?,
                last_used: r.read_uint(4)?,
            }),
            AccountType::KeyPage => Account::KeyPage(KeyPage::decode_body(r)?),
            AccountType::KeyBook => Account::KeyBook(KeyBook::decode_body(r)?),
            AccountType::DataAccount => Account::DataAccount(DataAccount {
                url: r.read_required_url(2)?,
                auth: r.read_value(3)?.unwrap_or_default(),
                entry: r.read_value(4)?,
            }),
            AccountType::LiteDataAccount => {
                Account::LiteDataAccount(LiteDataAccount {
                    url: r.read_required_url(2)?,
                })
            }
            AccountType::UnknownSigner => {
                Account::UnknownSigner(UnknownSigner {
                    url: r.read_required_url(2)?,
                    version: r.read_uint(3)?,
                })
            }
            AccountType::SystemLedger => {
                Account::SystemLedger(SystemLedger::decode_body(r)?)
            }
            AccountType::AnchorLedger => {
                Account::AnchorLedger(AnchorLedger::decode_body(r)?)
            }
            AccountType::SyntheticLedger => {
                Account::SyntheticLedger(SyntheticLedger::decode_body(r)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_encoding::{decode, encode};

    fn url(s: &str) -> Url { Url::parse(s).unwrap() }

    #[test]
    fn accounts_round_trip() {
        let samples = vec![
            Account::Identity(Identity {
                url: url("acc://alice"),
                auth: AccountAuth::with_authority(url("acc://alice/book")),
            }),
            Account::TokenAccount(TokenAccount {
                url: url("acc://alice/tokens"),
                auth: AccountAuth::with_authority(url("acc://alice/book")),
                token_url: url("acc://acme"),
                balance: 100_000_000_000,
            }),
            Account::KeyPage(KeyPage {
                url: url("acc://alice/book/1"),
                credit_balance: 5_000,
                accept_threshold: 2,
                version: 3,
                keys: vec![crate::key_page::KeySpec {
                    public_key_hash: vec![7u8; 32],
                    delegate: None,
                    last_used: 9,
                }],
                ..Default::default()
            }),
            Account::SyntheticLedger(SyntheticLedger {
                url: url("acc://bvn-a.acme/synthetic"),
                sequence: Vec::new(),
            }),
        ];
        for account in samples {
            let bytes = encode(&account);
            let decoded: Account = decode(&bytes).unwrap();
            assert_eq!(decoded, account);
            assert_eq!(encode(&decoded), bytes);
        }
    }

    #[test]
    fn unknown_account_type_round_trips() {
        // Hand-build an account with type code 99: type, then a URL.
        let mut w = acd_encoding::Writer::new();
        w.write_uint(1, 99);
        w.write_url(2, &url("acc://future"));
        w.write_uint(3, 42);
        let bytes = w.into_bytes();

        let decoded: Account = decode(&bytes).unwrap();
        match &decoded {
            Account::Unknown { type_code, url: u, .. } => {
                assert_eq!(*type_code, 99);
                assert_eq!(u, &url("acc://future"));
            }
            other => panic!("expected unknown account, got {:?}", other),
        }
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn key_page_inherits_book_authority() {
        let page = Account::KeyPage(KeyPage {
            url: url("acc://alice/book/1"),
            ..Default::default()
        });
        let auths = page.authorities();
        assert_eq!(auths.len(), 1);
        assert_eq!(auths[0].url, url("acc://alice/book"));
    }
}
