// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::DecoderError;
use acd_kv::KvError;
use acd_merkle::MerkleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("batch is read-only")]
    ReadOnly,
    #[error("batch already committed")]
    Done,
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("stored record is corrupt: {0}")]
    Codec(#[from] DecoderError),
    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<DbError> for primitives::Error {
    fn from(e: DbError) -> primitives::Error {
        match e {
            DbError::Merkle(m) => m.into(),
            other => primitives::Error::internal(other.to_string()),
        }
    }
}
