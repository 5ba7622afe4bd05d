// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::DecoderError;
use acd_merkle::MerkleError;
use acd_types::UrlError;
use thiserror::Error;

/// The status of a transaction and, past `NotFound`, the failure taxonomy.
/// Codes are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Unknown,
    Pending,
    Delivered,
    NotFound,
    InvalidUrl,
    InvalidSignature,
    InvalidTransaction,
    InvalidPrincipal,
    UnsupportedType,
    BadRequest,
    Unauthorized,
    InsufficientCredits,
    InsufficientBalance,
    Internal,
    /// Out-of-order execution detected; the block must halt.
    Fatal,
}

impl Status {
    pub fn code(self) -> u64 {
        match self {
            Status::Unknown => 0,
            Status::Pending => 1,
            Status::Delivered => 2,
            Status::NotFound => 10,
            Status::InvalidUrl => 11,
            Status::InvalidSignature => 12,
            Status::InvalidTransaction => 13,
            Status::InvalidPrincipal => 14,
            Status::UnsupportedType => 15,
            Status::BadRequest => 16,
            Status::Unauthorized => 17,
            Status::InsufficientCredits => 18,
            Status::InsufficientBalance => 19,
            Status::Internal => 30,
            Status::Fatal => 31,
        }
    }

    pub fn from_code(code: u64) -> Status {
        match code {
            1 => Status::Pending,
            2 => Status::Delivered,
            10 => Status::NotFound,
            11 => Status::InvalidUrl,
            12 => Status::InvalidSignature,
            13 => Status::InvalidTransaction,
            14 => Status::InvalidPrincipal,
            15 => Status::UnsupportedType,
            16 => Status::BadRequest,
            17 => Status::Unauthorized,
            18 => Status::InsufficientCredits,
            19 => Status::InsufficientBalance,
            30 => Status::Internal,
            31 => Status::Fatal,
            _ => Status::Unknown,
        }
    }

    pub fn is_failure(self) -> bool { self.code() >= 10 }
}

impl Default for Status {
    fn default() -> Status { Status::Unknown }
}

/// A protocol error: a taxonomy code plus context. Executor failures carry
/// one of these into the transaction status; they never abort a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct Error {
    pub code: Status,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(code: Status, message: impl Into<String>) -> Error {
        Error { code, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Error {
        Error::new(Status::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Error {
        Error::new(Status::BadRequest, message)
    }

    pub fn invalid_transaction(message: impl Into<String>) -> Error {
        Error::new(Status::InvalidTransaction, message)
    }

    pub fn invalid_signature(message: impl Into<String>) -> Error {
        Error::new(Status::InvalidSignature, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Error {
        Error::new(Status::Unauthorized, message)
    }

    pub fn internal(message: impl Into<String>) -> Error {
        Error::new(Status::Internal, message)
    }

    pub fn fatal(message: impl Into<String>) -> Error {
        Error::new(Status::Fatal, message)
    }

    pub fn is_not_found(&self) -> bool { self.code == Status::NotFound }

    pub fn is_fatal(&self) -> bool { self.code == Status::Fatal }
}

impl From<DecoderError> for Error {
    fn from(e: DecoderError) -> Error {
        Error::internal(format!("codec: {}", e))
    }
}

impl From<UrlError> for Error {
    fn from(e: UrlError) -> Error {
        Error::new(Status::InvalidUrl, e.to_string())
    }
}

impl From<MerkleError> for Error {
    fn from(e: MerkleError) -> Error {
        match e {
            MerkleError::EntryNotFound(_) | MerkleError::EntryOutOfRange(..) => {
                Error::not_found(e.to_string())
            }
            _ => Error::internal(e.to_string()),
        }
    }
}
