// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_types::{consts, Url};
use primitives::network::{GlobalValues, PartitionType};

/// Which partition this engine instance executes for, and the well-known
/// accounts that hang off its node URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub id: String,
    pub partition_type: PartitionType,
}

impl PartitionInfo {
    pub fn directory() -> PartitionInfo {
        PartitionInfo {
            id: consts::DIRECTORY.to_string(),
            partition_type: PartitionType::Directory,
        }
    }

    pub fn block_validator(id: &str) -> PartitionInfo {
        PartitionInfo {
            id: id.to_lowercase(),
            partition_type: PartitionType::BlockValidator,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.partition_type == PartitionType::Directory
    }

    pub fn node_url(&self) -> Url { consts::partition_url(&self.id) }

    /// The system ledger account.
    pub fn ledger_url(&self) -> Url { self.node_url().join(consts::LEDGER) }

    /// The synthetic ledger account, owner of the sequence chains.
    pub fn synthetic_url(&self) -> Url {
        self.node_url().join(consts::SYNTHETIC)
    }

    /// The anchor pool account, owner of the intermediate anchor chains.
    pub fn anchor_pool_url(&self) -> Url {
        self.node_url().join(consts::ANCHOR_POOL)
    }

    pub fn operator_book_url(&self) -> Url {
        self.node_url().join(consts::OPERATOR_BOOK)
    }

    pub fn operator_page_url(&self) -> Url {
        self.operator_book_url().join("1")
    }

    /// True when a URL routes to this partition's reserved account set.
    pub fn owns(&self, url: &Url) -> bool {
        self.node_url().prefix_of(url)
    }
}

/// The per-partition snapshot of the network variables. `active` is what
/// executors read during a block; `pending` accumulates updates parsed
/// from network-account writes and replaces `active` at block commit.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub active: GlobalValues,
    pub pending: GlobalValues,
}

impl Globals {
    pub fn new(values: GlobalValues) -> Globals {
        Globals { active: values.clone(), pending: values }
    }

    /// Promotes the pending values at block commit.
    pub fn promote(&mut self) {
        self.active = self.pending.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_account_urls() {
        let dn = PartitionInfo::directory();
        assert_eq!(dn.node_url().to_string(), "acc://dn.acme");
        assert_eq!(dn.ledger_url().to_string(), "acc://dn.acme/ledger");

        let bvn = PartitionInfo::block_validator("Apollo");
        assert_eq!(bvn.id, "apollo");
        assert_eq!(
            bvn.anchor_pool_url().to_string(),
            "acc://bvn-apollo.acme/anchors"
        );
        assert!(bvn.owns(&bvn.operator_page_url()));
        assert!(!bvn.owns(&dn.node_url()));
    }
}
