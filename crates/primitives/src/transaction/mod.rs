// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

pub mod synthetic;
pub mod system;
pub mod user;

pub use self::{synthetic::*, system::*, user::*};

use crate::signature::Signature;
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{sha256, sha256_concat, Hash, TxId, Url};
use std::fmt;

/// Transaction type codes. The code ranges partition the types into three
/// delivery classes:
/// user `0x01..=0x2F`, synthetic `0x31..=0x5F`, system `0x60..=0x7F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransactionType {
    CreateIdentity,
    CreateTokenAccount,
    SendTokens,
    CreateDataAccount,
    WriteData,
    WriteDataTo,
    AcmeFaucet,
    CreateToken,
    IssueTokens,
    BurnTokens,
    CreateKeyPage,
    CreateKeyBook,
    AddCredits,
    UpdateKeyPage,
    UpdateKey,
    UpdateAccountAuth,
    Remote,
    SyntheticCreateIdentity,
    SyntheticWriteData,
    SyntheticDepositTokens,
    SyntheticDepositCredits,
    SyntheticBurnTokens,
    SyntheticForwardTransaction,
    SystemGenesis,
    DirectoryAnchor,
    PartitionAnchor,
    SystemWriteData,
}

impl TransactionType {
    pub fn code(self) -> u64 {
        use TransactionType::*;
        match self {
            CreateIdentity => 0x01,
            CreateTokenAccount => 0x02,
            SendTokens => 0x03,
            CreateDataAccount => 0x04,
            WriteData => 0x05,
            WriteDataTo => 0x06,
            AcmeFaucet => 0x07,
            CreateToken => 0x08,
            IssueTokens => 0x09,
            BurnTokens => 0x0a,
            CreateKeyPage => 0x0c,
            CreateKeyBook => 0x0d,
            AddCredits => 0x0e,
            UpdateKeyPage => 0x0f,
            UpdateKey => 0x10,
            UpdateAccountAuth => 0x15,
            Remote => 0x2f,
            SyntheticCreateIdentity => 0x31,
            SyntheticWriteData => 0x32,
            SyntheticDepositTokens => 0x33,
            SyntheticDepositCredits => 0x34,
            SyntheticBurnTokens => 0x35,
            SyntheticForwardTransaction => 0x36,
            SystemGenesis => 0x60,
            DirectoryAnchor => 0x61,
            PartitionAnchor => 0x62,
            SystemWriteData => 0x63,
        }
    }

    pub fn from_code(code: u64) -> Option<TransactionType> {
        use TransactionType::*;
        Some(match code {
            0x01 => CreateIdentity,
            0x02 => CreateTokenAccount,
            0x03 => SendTokens,
            0x04 => CreateDataAccount,
            0x05 => WriteData,
            0x06 => WriteDataTo,
            0x07 => AcmeFaucet,
            0x08 => CreateToken,
            0x09 => IssueTokens,
            0x0a => BurnTokens,
            0x0c => CreateKeyPage,
            0x0d => CreateKeyBook,
            0x0e => AddCredits,
            0x0f => UpdateKeyPage,
            0x10 => UpdateKey,
            0x15 => UpdateAccountAuth,
            0x2f => Remote,
            0x31 => SyntheticCreateIdentity,
            0x32 => SyntheticWriteData,
            0x33 => SyntheticDepositTokens,
            0x34 => SyntheticDepositCredits,
            0x35 => SyntheticBurnTokens,
            0x36 => SyntheticForwardTransaction,
            0x60 => SystemGenesis,
            0x61 => DirectoryAnchor,
            0x62 => PartitionAnchor,
            0x63 => SystemWriteData,
            _ => return None,
        })
    }

    pub fn is_user(self) -> bool { (0x01..=0x2f).contains(&self.code()) }

    pub fn is_synthetic(self) -> bool { (0x31..=0x5f).contains(&self.code()) }

    pub fn is_system(self) -> bool { (0x60..=0x7f).contains(&self.code()) }

    pub fn is_anchor(self) -> bool {
        matches!(
            self,
            TransactionType::DirectoryAnchor | TransactionType::PartitionAnchor
        )
    }

    /// Whether disabled authorities must still sign transactions of this
    /// type. Authority and key management cannot be opted out of.
    pub fn requires_authorization(self) -> bool {
        matches!(
            self,
            TransactionType::UpdateAccountAuth
                | TransactionType::UpdateKeyPage
                | TransactionType::UpdateKey
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A transaction body. The leading type code selects the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionBody {
    CreateIdentity(CreateIdentity),
    CreateTokenAccount(CreateTokenAccount),
    SendTokens(SendTokens),
    CreateDataAccount(CreateDataAccount),
    WriteData(WriteData),
    WriteDataTo(WriteDataTo),
    AcmeFaucet(AcmeFaucet),
    CreateToken(CreateToken),
    IssueTokens(IssueTokens),
    BurnTokens(BurnTokens),
    CreateKeyPage(CreateKeyPage),
    CreateKeyBook(CreateKeyBook),
    AddCredits(AddCredits),
    UpdateKeyPage(UpdateKeyPage),
    UpdateKey(UpdateKey),
    UpdateAccountAuth(UpdateAccountAuth),
    Remote(RemoteTransaction),
    SyntheticCreateIdentity(SyntheticCreateIdentity),
    SyntheticWriteData(SyntheticWriteData),
    SyntheticDepositTokens(SyntheticDepositTokens),
    SyntheticDepositCredits(SyntheticDepositCredits),
    SyntheticBurnTokens(SyntheticBurnTokens),
    SyntheticForwardTransaction(SyntheticForwardTransaction),
    SystemGenesis(SystemGenesis),
    DirectoryAnchor(DirectoryAnchor),
    PartitionAnchor(PartitionAnchor),
    SystemWriteData(SystemWriteData),
}

impl TransactionBody {
    pub fn transaction_type(&self) -> TransactionType {
        use TransactionBody::*;
        match self {
            CreateIdentity(_) => TransactionType::CreateIdentity,
            CreateTokenAccount(_) => TransactionType::CreateTokenAccount,
            SendTokens(_) => TransactionType::SendTokens,
            CreateDataAccount(_) => TransactionType::CreateDataAccount,
            WriteData(_) => TransactionType::WriteData,
            WriteDataTo(_) => TransactionType::WriteDataTo,
            AcmeFaucet(_) => TransactionType::AcmeFaucet,
            CreateToken(_) => TransactionType::CreateToken,
            IssueTokens(_) => TransactionType::IssueTokens,
            BurnTokens(_) => TransactionType::BurnTokens,
            CreateKeyPage(_) => TransactionType::CreateKeyPage,
            CreateKeyBook(_) => TransactionType::CreateKeyBook,
            AddCredits(_) => TransactionType::AddCredits,
            UpdateKeyPage(_) => TransactionType::UpdateKeyPage,
            UpdateKey(_) => TransactionType::UpdateKey,
            UpdateAccountAuth(_) => TransactionType::UpdateAccountAuth,
            Remote(_) => TransactionType::Remote,
            SyntheticCreateIdentity(_) => {
                TransactionType::SyntheticCreateIdentity
            }
            SyntheticWriteData(_) => TransactionType::SyntheticWriteData,
            SyntheticDepositTokens(_) => {
                TransactionType::SyntheticDepositTokens
            }
            SyntheticDepositCredits(_) => {
                TransactionType::SyntheticDepositCredits
            }
            SyntheticBurnTokens(_) => TransactionType::SyntheticBurnTokens,
            SyntheticForwardTransaction(_) => {
                TransactionType::SyntheticForwardTransaction
            }
            SystemGenesis(_) => TransactionType::SystemGenesis,
            DirectoryAnchor(_) => TransactionType::DirectoryAnchor,
            PartitionAnchor(_) => TransactionType::PartitionAnchor,
            SystemWriteData(_) => TransactionType::SystemWriteData,
        }
    }

    /// The provenance block of a synthetic body.
    pub fn synthetic_origin(&self) -> Option<&SyntheticOrigin> {
        use TransactionBody::*;
        match self {
            SyntheticCreateIdentity(b) => Some(&b.origin),
            SyntheticWriteData(b) => Some(&b.origin),
            SyntheticDepositTokens(b) => Some(&b.origin),
            SyntheticDepositCredits(b) => Some(&b.origin),
            SyntheticBurnTokens(b) => Some(&b.origin),
            SyntheticForwardTransaction(b) => Some(&b.origin),
            _ => None,
        }
    }

    pub fn synthetic_origin_mut(&mut self) -> Option<&mut SyntheticOrigin> {
        use TransactionBody::*;
        match self {
            SyntheticCreateIdentity(b) => Some(&mut b.origin),
            SyntheticWriteData(b) => Some(&mut b.origin),
            SyntheticDepositTokens(b) => Some(&mut b.origin),
            SyntheticDepositCredits(b) => Some(&mut b.origin),
            SyntheticBurnTokens(b) => Some(&mut b.origin),
            SyntheticForwardTransaction(b) => Some(&mut b.origin),
            _ => None,
        }
    }

    /// The shared anchor fields of an anchor body.
    pub fn anchor_metadata(&self) -> Option<&AnchorMetadata> {
        match self {
            TransactionBody::DirectoryAnchor(b) => Some(&b.anchor),
            TransactionBody::PartitionAnchor(b) => Some(&b.anchor),
            _ => None,
        }
    }
}

impl Encodable for TransactionBody {
    fn append(&self, w: &mut Writer) {
        use TransactionBody::*;
        w.write_uint(1, self.transaction_type().code());
        match self {
            CreateIdentity(b) => b.append_body(w),
            CreateTokenAccount(b) => b.append_body(w),
            SendTokens(b) => b.append_body(w),
            CreateDataAccount(b) => b.append_body(w),
            WriteData(b) => b.append_body(w),
            WriteDataTo(b) => b.append_body(w),
            AcmeFaucet(b) => b.append_body(w),
            CreateToken(b) => b.append_body(w),
            IssueTokens(b) => b.append_body(w),
            BurnTokens(b) => b.append_body(w),
            CreateKeyPage(b) => b.append_body(w),
            CreateKeyBook(b) => b.append_body(w),
            AddCredits(b) => b.append_body(w),
            UpdateKeyPage(b) => b.append_body(w),
            UpdateKey(b) => b.append_body(w),
            UpdateAccountAuth(b) => b.append_body(w),
            Remote(b) => b.append_body(w),
            SyntheticCreateIdentity(b) => b.append_body(w),
            SyntheticWriteData(b) => b.append_body(w),
            SyntheticDepositTokens(b) => b.append_body(w),
            SyntheticDepositCredits(b) => b.append_body(w),
            SyntheticBurnTokens(b) => b.append_body(w),
            SyntheticForwardTransaction(b) => b.append_body(w),
            SystemGenesis(b) => b.append_body(w),
            DirectoryAnchor(b) => b.append_body(w),
            PartitionAnchor(b) => b.append_body(w),
            SystemWriteData(b) => b.append_body(w),
        }
    }
}

impl Decodable for TransactionBody {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        let code = r.read_uint(1)?;
        let typ = TransactionType::from_code(code)
            .ok_or(DecoderError::UnknownType("transaction body", code))?;
        use TransactionType as T;
        Ok(match typ {
            T::CreateIdentity => {
                TransactionBody::CreateIdentity(CreateIdentity::decode_body(r)?)
            }
            T::CreateTokenAccount => TransactionBody::CreateTokenAccount(
                CreateTokenAccount::decode_body(r)?,
            ),
            T::SendTokens => {
                TransactionBody::SendTokens(SendTokens::decode_body(r)?)
            }
            T::CreateDataAccount => TransactionBody::CreateDataAccount(
                CreateDataAccount::decode_body(r)?,
            ),
            T::WriteData => {
                TransactionBody::WriteData(WriteData::decode_body(r)?)
            }
            T::WriteDataTo => {
                TransactionBody::WriteDataTo(WriteDataTo::decode_body(r)?)
            }
            T::AcmeFaucet => {
                TransactionBody::AcmeFaucet(AcmeFaucet::decode_body(r)?)
            }
            T::CreateToken => {
                TransactionBody::CreateToken(CreateToken::decode_body(r)?)
            }
            T::IssueTokens => {
                TransactionBody::IssueTokens(IssueTokens::decode_body(r)?)
            }
            T::BurnTokens => {
                TransactionBody::BurnTokens(BurnTokens::decode_body(r)?)
            }
            T::CreateKeyPage => {
                TransactionBody::CreateKeyPage(CreateKeyPage::decode_body(r)?)
            }
            T::CreateKeyBook => {
                TransactionBody::CreateKeyBook(CreateKeyBook::decode_body(r)?)
            }
            T::AddCredits => {
                TransactionBody::AddCredits(AddCredits::decode_body(r)?)
            }
            T::UpdateKeyPage => {
                TransactionBody::UpdateKeyPage(UpdateKeyPage::decode_body(r)?)
            }
            T::UpdateKey => {
                TransactionBody::UpdateKey(UpdateKey::decode_body(r)?)
            }
            T::UpdateAccountAuth => TransactionBody::UpdateAccountAuth(
                UpdateAccountAuth::decode_body(r)?,
            ),
            T::Remote => {
                TransactionBody::Remote(RemoteTransaction::decode_body(r)?)
            }
            T::SyntheticCreateIdentity => {
                TransactionBody::SyntheticCreateIdentity(
                    SyntheticCreateIdentity::decode_body(r)?,
                )
            }
            T::SyntheticWriteData => TransactionBody::SyntheticWriteData(
                SyntheticWriteData::decode_body(r)?,
            ),
            T::SyntheticDepositTokens => {
                TransactionBody::SyntheticDepositTokens(
                    SyntheticDepositTokens::decode_body(r)?,
                )
            }
            T::SyntheticDepositCredits => {
                TransactionBody::SyntheticDepositCredits(
                    SyntheticDepositCredits::decode_body(r)?,
                )
            }
            T::SyntheticBurnTokens => TransactionBody::SyntheticBurnTokens(
                SyntheticBurnTokens::decode_body(r)?,
            ),
            T::SyntheticForwardTransaction => {
                TransactionBody::SyntheticForwardTransaction(
                    SyntheticForwardTransaction::decode_body(r)?,
                )
            }
            T::SystemGenesis => {
                TransactionBody::SystemGenesis(SystemGenesis::decode_body(r)?)
            }
            T::DirectoryAnchor => TransactionBody::DirectoryAnchor(
                DirectoryAnchor::decode_body(r)?,
            ),
            T::PartitionAnchor => TransactionBody::PartitionAnchor(
                PartitionAnchor::decode_body(r)?,
            ),
            T::SystemWriteData => TransactionBody::SystemWriteData(
                SystemWriteData::decode_body(r)?,
            ),
        })
    }
}

/// The transaction header: the account acted upon and the hash binding
/// the initiating signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionHeader {
    pub principal: Url,
    pub initiator: Hash,
    pub memo: String,
    pub metadata: Vec<u8>,
}

impl Encodable for TransactionHeader {
    fn append(&self, w: &mut Writer) {
        w.write_url(1, &self.principal);
        w.write_hash(2, &self.initiator);
        w.write_string(3, &self.memo);
        w.write_bytes(4, &self.metadata);
    }
}

impl Decodable for TransactionHeader {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(TransactionHeader {
            principal: r.read_required_url(1)?,
            initiator: r.read_hash(2)?,
            memo: r.read_string(3)?,
            metadata: r.read_bytes(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub header: TransactionHeader,
    pub body: TransactionBody,
}

impl Transaction {
    pub fn new(principal: Url, body: TransactionBody) -> Transaction {
        Transaction {
            header: TransactionHeader { principal, ..Default::default() },
            body,
        }
    }

    /// The transaction hash: `SHA-256(SHA-256(header) || SHA-256(body))`.
    pub fn hash(&self) -> Hash {
        let header = sha256(&acd_encoding::encode(&self.header));
        let body = sha256(&acd_encoding::encode(&self.body));
        sha256_concat(header.as_bytes(), body.as_bytes())
    }

    pub fn id(&self) -> TxId {
        TxId::new(self.header.principal.clone(), self.hash())
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.body.transaction_type()
    }
}

impl Encodable for Transaction {
    fn append(&self, w: &mut Writer) {
        w.write_value(1, &self.header);
        w.write_value(2, &self.body);
    }
}

impl Decodable for Transaction {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(Transaction {
            header: r.read_value(1)?.ok_or(DecoderError::MissingField(1))?,
            body: r.read_value(2)?.ok_or(DecoderError::MissingField(2))?,
        })
    }
}

/// The submission envelope: signatures plus, unless every signature is
/// for a transaction already held by the destination, the transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub signatures: Vec<Signature>,
    pub transaction: Option<Transaction>,
}

impl Encodable for Envelope {
    fn append(&self, w: &mut Writer) {
        w.write_values(1, &self.signatures);
        if let Some(txn) = &self.transaction {
            w.write_value(2, txn);
        }
    }
}

impl Decodable for Envelope {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(Envelope {
            signatures: r.read_values(1)?,
            transaction: r.read_value(2)?,
        })
    }
}

impl Default for TransactionBody {
    fn default() -> TransactionBody {
        TransactionBody::SystemGenesis(SystemGenesis {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acd_encoding::{decode, encode};

    fn url(s: &str) -> Url { Url::parse(s).unwrap() }

    #[test]
    fn type_classes_partition_cleanly() {
        use TransactionType::*;
        for t in [CreateIdentity, SendTokens, WriteData, UpdateKey, Remote] {
            assert!(t.is_user() && !t.is_synthetic() && !t.is_system());
        }
        for t in [SyntheticDepositTokens, SyntheticForwardTransaction] {
            assert!(t.is_synthetic() && !t.is_user() && !t.is_system());
        }
        for t in [SystemGenesis, DirectoryAnchor, PartitionAnchor] {
            assert!(t.is_system() && !t.is_user() && !t.is_synthetic());
        }
        assert!(DirectoryAnchor.is_anchor() && !SystemGenesis.is_anchor());
    }

    #[test]
    fn codes_round_trip() {
        use TransactionType::*;
        for t in [
            CreateIdentity,
            CreateTokenAccount,
            SendTokens,
            CreateDataAccount,
            WriteData,
            WriteDataTo,
            AcmeFaucet,
            CreateToken,
            IssueTokens,
            BurnTokens,
            CreateKeyPage,
            CreateKeyBook,
            AddCredits,
            UpdateKeyPage,
            UpdateKey,
            UpdateAccountAuth,
            Remote,
            SyntheticCreateIdentity,
            SyntheticWriteData,
            SyntheticDepositTokens,
            SyntheticDepositCredits,
            SyntheticBurnTokens,
            SyntheticForwardTransaction,
            SystemGenesis,
            DirectoryAnchor,
            PartitionAnchor,
            SystemWriteData,
        ] {
            assert_eq!(TransactionType::from_code(t.code()), Some(t));
        }
        assert_eq!(TransactionType::from_code(0x0b), None);
    }

    #[test]
    fn transaction_hash_is_header_body_hash() {
        let txn = Transaction::new(
            url("acc://alice/tokens"),
            TransactionBody::SendTokens(SendTokens {
                to: vec![TokenRecipient {
                    url: url("acc://bob/tokens"),
                    amount: 30,
                }],
            }),
        );
        let header = sha256(&encode(&txn.header));
        let body = sha256(&encode(&txn.body));
        assert_eq!(
            txn.hash(),
            sha256_concat(header.as_bytes(), body.as_bytes())
        );

        // The hash binds the body.
        let mut other = txn.clone();
        other.body = TransactionBody::BurnTokens(BurnTokens { amount: 1 });
        assert_ne!(other.hash(), txn.hash());
    }

    #[test]
    fn bodies_round_trip() {
        let bodies = vec![
            TransactionBody::CreateIdentity(CreateIdentity {
                url: url("acc://alice"),
                key_hash: vec![1; 32],
                key_book_url: Some(url("acc://alice/book")),
                authorities: vec![],
            }),
            TransactionBody::SendTokens(SendTokens {
                to: vec![
                    TokenRecipient { url: url("acc://bob/tokens"), amount: 30 },
                    TokenRecipient {
                        url: url("acc://carol/tokens"),
                        amount: 7,
                    },
                ],
            }),
            TransactionBody::UpdateKeyPage(UpdateKeyPage {
                operations: vec![
                    KeyPageOperation::Add {
                        entry: KeySpecParams {
                            key_hash: vec![2; 32],
                            delegate: None,
                        },
                    },
                    KeyPageOperation::SetThreshold { threshold: 2 },
                ],
            }),
            TransactionBody::SyntheticDepositTokens(SyntheticDepositTokens {
                origin: SyntheticOrigin {
                    cause: sha256(b"cause"),
                    source: url("acc://bvn-a.acme"),
                    initiator: None,
                    fee_refund: 0,
                },
                token: url("acc://acme"),
                amount: 30,
            }),
            TransactionBody::DirectoryAnchor(DirectoryAnchor {
                anchor: AnchorMetadata {
                    source: url("acc://dn.acme"),
                    minor_block_index: 4,
                    root_chain_index: 12,
                    root_chain_anchor: sha256(b"root"),
                    state_tree_anchor: sha256(b"bpt"),
                },
                updates: vec![],
                receipts: vec![],
            }),
        ];
        for body in bodies {
            let bytes = encode(&body);
            let decoded: TransactionBody = decode(&bytes).unwrap();
            assert_eq!(decoded, body);
            assert_eq!(encode(&decoded), bytes);
        }
    }

    #[test]
    fn unknown_body_code_is_rejected() {
        let mut w = Writer::new();
        w.write_uint(1, 0x7e);
        let err = decode::<TransactionBody>(&w.into_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DecoderError::UnknownType("transaction body", _)
        ));
    }
}
