// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Well-known URLs and the reserved sub-account names of a partition's
//! node identity.

use crate::url::Url;

/// The canonical name of the Directory partition.
pub const DIRECTORY: &str = "directory";

/// Reserved path segments under a partition's node URL.
pub const LEDGER: &str = "ledger";
pub const SYNTHETIC: &str = "synthetic";
pub const ANCHOR_POOL: &str = "anchors";
pub const OPERATOR_BOOK: &str = "operators";
pub const ORACLE: &str = "oracle";
pub const GLOBALS: &str = "globals";
pub const NETWORK: &str = "network";
pub const ROUTING: &str = "routing";
pub const VOTES: &str = "votes";
pub const EVIDENCE: &str = "evidence";

lazy_static! {
    static ref ACME_URL: Url = Url::parse("acc://acme").unwrap();
    static ref DN_URL: Url = Url::parse("acc://dn.acme").unwrap();
}

/// The URL of the ACME token issuer.
pub fn acme_url() -> Url { ACME_URL.clone() }

/// The Directory partition's node URL.
pub fn dn_url() -> Url { DN_URL.clone() }

/// A block validator partition's node URL.
pub fn bvn_url(name: &str) -> Url {
    Url::parse(&format!("acc://bvn-{}.acme", name.to_ascii_lowercase()))
        .expect("partition names are restricted to URL-safe characters")
}

/// The node URL for a partition by name; `directory` maps to the DN.
pub fn partition_url(name: &str) -> Url {
    if name.eq_ignore_ascii_case(DIRECTORY) {
        dn_url()
    } else {
        bvn_url(name)
    }
}

/// Recovers a partition name from a node URL, or None if the URL is not a
/// partition node URL.
pub fn parse_partition_url(url: &Url) -> Option<String> {
    if !url.is_root_identity() {
        return None;
    }
    let authority = url.authority();
    if authority == DN_URL.authority() {
        return Some(DIRECTORY.to_string());
    }
    authority
        .strip_suffix(".acme")?
        .strip_prefix("bvn-")
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_urls_round_trip() {
        assert_eq!(parse_partition_url(&dn_url()).as_deref(), Some(DIRECTORY));
        assert_eq!(
            parse_partition_url(&bvn_url("Apollo")).as_deref(),
            Some("apollo")
        );
        assert_eq!(parse_partition_url(&acme_url()), None);
        assert_eq!(
            parse_partition_url(&dn_url().join(LEDGER)),
            None,
            "sub-accounts of a node URL are not partition URLs"
        );
    }
}
