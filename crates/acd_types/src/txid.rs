// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{errors::UrlError, hash::Hash, url::Url};
use std::{fmt, str::FromStr};

/// A transaction ID: the transaction hash qualified by the account it was
/// addressed to. Rendered as `acc://<hash>@<authority/path>`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId {
    account: Url,
    hash: Hash,
}

impl TxId {
    pub fn new(account: Url, hash: Hash) -> TxId {
        TxId { account: account.strip_extras(), hash }
    }

    pub fn account(&self) -> &Url { &self.account }

    pub fn hash(&self) -> Hash { self.hash }

    pub fn parse(s: &str) -> Result<TxId, UrlError> {
        let rest = s.strip_prefix("acc://").unwrap_or(s);
        let (hash_str, account_str) =
            rest.split_once('@').ok_or_else(|| UrlError::BadTxId(s.into()))?;
        let hash = Hash::from_hex(hash_str)
            .ok_or_else(|| UrlError::BadTxId(s.into()))?;
        let account = Url::parse(account_str)?;
        Ok(TxId::new(account, hash))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "acc://{}@{}{}",
            self.hash,
            self.account.authority(),
            self.account.path()
        )
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for TxId {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<TxId, UrlError> { TxId::parse(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn txid_round_trip() {
        let id = TxId::new(
            Url::parse("acc://alice/tokens").unwrap(),
            sha256(b"payload"),
        );
        let rendered = id.to_string();
        assert_eq!(TxId::parse(&rendered).unwrap(), id);
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(TxId::parse("acc://alice/tokens").is_err());
    }
}
