// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("missing or unsupported scheme in {0:?}")]
    BadScheme(String),
    #[error("URL has an empty authority: {0:?}")]
    EmptyAuthority(String),
    #[error("invalid character {1:?} in URL {0:?}")]
    InvalidCharacter(String, char),
    #[error("{0:?} is not a valid transaction ID")]
    BadTxId(String),
    #[error("{0:?} is not a lite address")]
    NotLite(String),
    #[error("invalid lite address checksum in {0:?}")]
    BadChecksum(String),
    #[error("invalid query value for {0}: {1:?}")]
    BadQueryValue(&'static str, String),
}
