// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use parking_lot::Mutex;
use primitives::Envelope;
use std::collections::{HashMap, HashSet};

use acd_types::{Hash, Url};

/// Cross-partition delivery. The engine hands finished envelopes to the
/// dispatcher at the end of a block; the dispatcher eventually delivers
/// them to the destination partition's ingress. Submissions are
/// idempotent: the receiving side deduplicates on sequence number, so a
/// dispatcher may retry freely.
pub trait Dispatcher: Send + Sync {
    fn send(&self, destination: &str, envelope: Envelope);
}

/// An in-process dispatcher: queues envelopes per destination partition.
/// The test driver drains a partition's queue into its next block.
/// Duplicate `(source, destination, sequence)` submissions are dropped
/// here as well, mirroring a real transport's retry discipline.
#[derive(Default)]
pub struct LoopbackDispatcher {
    inner: Mutex<LoopbackInner>,
}

#[derive(Default)]
struct LoopbackInner {
    queues: HashMap<String, Vec<Envelope>>,
    seen: HashSet<(Url, String, u64)>,
    seen_unsequenced: HashSet<(String, Hash)>,
}

impl LoopbackDispatcher {
    pub fn new() -> LoopbackDispatcher { LoopbackDispatcher::default() }

    /// Removes and returns everything queued for a partition.
    pub fn drain(&self, destination: &str) -> Vec<Envelope> {
        self.inner
            .lock()
            .queues
            .remove(&destination.to_lowercase())
            .unwrap_or_default()
    }

    pub fn queued(&self, destination: &str) -> usize {
        self.inner
            .lock()
            .queues
            .get(&destination.to_lowercase())
            .map_or(0, Vec::len)
    }
}

impl Dispatcher for LoopbackDispatcher {
    fn send(&self, destination: &str, envelope: Envelope) {
        let destination = destination.to_lowercase();
        let mut inner = self.inner.lock();

        // Dedup sequenced envelopes on (source, destination, sequence).
        let sequencing = envelope.signatures.iter().find_map(|s| match s {
            primitives::Signature::Partition(p) => {
                Some((p.source_network.clone(), p.sequence_number))
            }
            _ => None,
        });
        match sequencing {
            Some((source, sequence)) => {
                if !inner.seen.insert((source, destination.clone(), sequence)) {
                    log::debug!(
                        "dropping duplicate envelope for {} seq {}",
                        destination,
                        sequence
                    );
                    return;
                }
            }
            None => {
                let hash = envelope
                    .transaction
                    .as_ref()
                    .map(|t| t.hash())
                    .unwrap_or_default();
                if !inner
                    .seen_unsequenced
                    .insert((destination.clone(), hash))
                {
                    return;
                }
            }
        }

        inner.queues.entry(destination).or_default().push(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::{PartitionSignature, Signature};

    fn envelope(seq: u64) -> Envelope {
        Envelope {
            signatures: vec![Signature::Partition(PartitionSignature {
                source_network: Url::parse("acc://bvn-a.acme").unwrap(),
                destination_network: Url::parse("acc://bvn-b.acme").unwrap(),
                sequence_number: seq,
                transaction_hash: Default::default(),
            })],
            transaction: None,
        }
    }

    #[test]
    fn duplicate_sequence_numbers_are_dropped() {
        let dispatcher = LoopbackDispatcher::new();
        dispatcher.send("b", envelope(1));
        dispatcher.send("b", envelope(1));
        dispatcher.send("b", envelope(2));
        assert_eq!(dispatcher.queued("b"), 2);
        assert_eq!(dispatcher.drain("b").len(), 2);
        assert_eq!(dispatcher.queued("b"), 0);
    }
}
