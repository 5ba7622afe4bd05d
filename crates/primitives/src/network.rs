// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Network variable accounts. These are JSON documents written into data
//! accounts under the partition node URLs and mirrored from the Directory;
//! the executor parses them into an in-memory snapshot at block commit.

use crate::{
    data::DataEntry,
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};

/// The ACME price oracle, in hundredths of a cent per ACME.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub price: u64,
}

impl Default for Oracle {
    fn default() -> Oracle { Oracle { price: crate::fees::ORACLE_PRECISION } }
}

/// A ratio, e.g. the fraction of operators required to accept a
/// validator-set update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    /// The smallest count satisfying this ratio of `total`, at least 1.
    pub fn threshold(&self, total: usize) -> u64 {
        if self.denominator == 0 {
            return 1;
        }
        let t = (total as u64 * self.numerator + self.denominator - 1)
            / self.denominator;
        t.max(1)
    }
}

impl Default for Ratio {
    fn default() -> Ratio { Ratio { numerator: 2, denominator: 3 } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkGlobals {
    #[serde(default)]
    pub validator_threshold: Ratio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartitionType {
    Directory,
    BlockValidator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub partition_type: PartitionType,
}

/// The partition roster. The Directory is entry 0; BVNs follow in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDefinition {
    pub partitions: Vec<PartitionDefinition>,
}

impl NetworkDefinition {
    pub fn for_bvns(names: &[&str]) -> NetworkDefinition {
        let mut partitions = vec![PartitionDefinition {
            id: acd_types::consts::DIRECTORY.to_string(),
            partition_type: PartitionType::Directory,
        }];
        for name in names {
            partitions.push(PartitionDefinition {
                id: name.to_lowercase(),
                partition_type: PartitionType::BlockValidator,
            });
        }
        NetworkDefinition { partitions }
    }

    pub fn bvn_ids(&self) -> Vec<&str> {
        self.partitions
            .iter()
            .filter(|p| p.partition_type == PartitionType::BlockValidator)
            .map(|p| p.id.as_str())
            .collect()
    }
}

/// An explicit routing override for one account authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOverride {
    pub account: String,
    pub partition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default)]
    pub overrides: Vec<RouteOverride>,
}

fn parse_entry<T: for<'de> Deserialize<'de>>(
    name: &str, entry: &DataEntry,
) -> Result<T> {
    serde_json::from_slice(&entry.data).map_err(|e| {
        Error::bad_request(format!("invalid {} update: {}", name, e))
    })
}

/// The in-memory snapshot of every network variable. Readers during a
/// block see the previous block's values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalValues {
    pub oracle: Oracle,
    pub globals: NetworkGlobals,
    pub network: NetworkDefinition,
    pub routing: RoutingTable,
}

impl GlobalValues {
    pub fn parse_oracle(&mut self, entry: &DataEntry) -> Result<()> {
        self.oracle = parse_entry("oracle", entry)?;
        Ok(())
    }

    pub fn parse_globals(&mut self, entry: &DataEntry) -> Result<()> {
        self.globals = parse_entry("globals", entry)?;
        Ok(())
    }

    pub fn parse_network(&mut self, entry: &DataEntry) -> Result<()> {
        self.network = parse_entry("network", entry)?;
        Ok(())
    }

    pub fn parse_routing(&mut self, entry: &DataEntry) -> Result<()> {
        self.routing = parse_entry("routing", entry)?;
        Ok(())
    }

    pub fn oracle_entry(&self) -> DataEntry {
        DataEntry::from_data(
            serde_json::to_vec(&self.oracle).expect("oracle serializes"),
        )
    }

    pub fn network_entry(&self) -> DataEntry {
        DataEntry::from_data(
            serde_json::to_vec(&self.network).expect("network serializes"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_round_up() {
        let ratio = Ratio { numerator: 2, denominator: 3 };
        assert_eq!(ratio.threshold(3), 2);
        assert_eq!(ratio.threshold(4), 3);
        assert_eq!(ratio.threshold(1), 1);
        assert_eq!(ratio.threshold(0), 1);
    }

    #[test]
    fn oracle_entry_parses() {
        let mut values = GlobalValues::default();
        let entry = DataEntry::from_data(br#"{"price":5000}"#.to_vec());
        values.parse_oracle(&entry).unwrap();
        assert_eq!(values.oracle.price, 5000);

        let junk = DataEntry::from_data(b"not json".to_vec());
        assert!(values.parse_oracle(&junk).is_err());
    }

    #[test]
    fn network_definition_orders_partitions() {
        let network = NetworkDefinition::for_bvns(&["Apollo", "Yutu"]);
        assert_eq!(network.partitions.len(), 3);
        assert_eq!(network.bvn_ids(), vec!["apollo", "yutu"]);
    }
}
