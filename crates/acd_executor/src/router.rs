// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_types::{consts, Url};
use primitives::{
    network::{NetworkDefinition, RoutingTable},
    Error, Result,
};

/// Routes account URLs to partitions: explicit overrides first, then the
/// stable authority hash modulo the partition count. Partition node URLs
/// themselves route to their own partition.
#[derive(Debug, Clone, Default)]
pub struct Router {
    network: NetworkDefinition,
    routing: RoutingTable,
}

impl Router {
    pub fn new(network: NetworkDefinition, routing: RoutingTable) -> Router {
        Router { network, routing }
    }

    pub fn network(&self) -> &NetworkDefinition { &self.network }

    /// The partition ID an account URL routes to.
    pub fn route(&self, url: &Url) -> Result<String> {
        if self.network.partitions.is_empty() {
            return Err(Error::internal("routing table has no partitions"));
        }

        // Partition system accounts live on their own partition.
        if let Some(id) = consts::parse_partition_url(&url.root_identity()) {
            return Ok(id);
        }

        for entry in &self.routing.overrides {
            if entry.account.eq_ignore_ascii_case(url.authority()) {
                return Ok(entry.partition.to_lowercase());
            }
        }

        let index = url.routing() % self.network.partitions.len() as u64;
        Ok(self.network.partitions[index as usize].id.clone())
    }

    /// True when the URL routes to `partition`.
    pub fn routes_to(&self, url: &Url, partition: &str) -> Result<bool> {
        Ok(self.route(url)?.eq_ignore_ascii_case(partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::network::RouteOverride;

    fn router() -> Router {
        Router::new(
            NetworkDefinition::for_bvns(&["apollo", "yutu"]),
            RoutingTable {
                overrides: vec![RouteOverride {
                    account: "pinned".into(),
                    partition: "yutu".into(),
                }],
            },
        )
    }

    #[test]
    fn routing_is_stable_and_total() {
        let router = router();
        for name in ["acc://alice", "acc://bob/tokens", "acc://carol"] {
            let url = Url::parse(name).unwrap();
            let a = router.route(&url).unwrap();
            let b = router.route(&url).unwrap();
            assert_eq!(a, b);
            assert!(["directory", "apollo", "yutu"].contains(&a.as_str()));
        }
    }

    #[test]
    fn overrides_win() {
        let router = router();
        let url = Url::parse("acc://pinned/anything").unwrap();
        assert_eq!(router.route(&url).unwrap(), "yutu");
    }

    #[test]
    fn node_urls_route_home() {
        let router = router();
        let url = Url::parse("acc://bvn-apollo.acme/ledger").unwrap();
        assert_eq!(router.route(&url).unwrap(), "apollo");
        let dn = Url::parse("acc://dn.acme/anchors").unwrap();
        assert_eq!(router.route(&dn).unwrap(), "directory");
    }
}
