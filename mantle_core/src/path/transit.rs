/*! Relay-side record of a single hop this node forwards for a circuit it
does not own.
*/

use std::time::{Duration, Instant};

use mantle_crypto::*;
use mantle_packet::commit::CommitRecord;
use mantle_packet::path_id::PathId;

use crate::time::clock_now;

/// Identity of a transit hop: who it connects and under which ids. Fixed at
/// creation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransitHopInfo {
    /// Neighbor on the side away from the path owner.
    pub upstream: PublicKey,
    /// Neighbor on the side toward the path owner.
    pub downstream: PublicKey,
    /// Id this hop re-tags upstream frames with.
    pub tx_id: PathId,
    /// Id this hop re-tags downstream frames with.
    pub rx_id: PathId,
}

/// A hop accepted from a relay-commit record.
pub struct TransitHop {
    /// Neighbors and ids of the hop.
    pub info: TransitHopInfo,
    /// Shared secret for this hop's onion layer.
    pub shared: SharedSecret,
    created: Instant,
    lifetime: Duration,
}

impl TransitHop {
    /// Accept a hop for `lifetime` starting now.
    pub fn new(info: TransitHopInfo, shared: SharedSecret, lifetime: Duration) -> TransitHop {
        TransitHop {
            info,
            shared,
            created: clock_now(),
            lifetime,
        }
    }

    /// Accept a hop from a decrypted commit record. The downstream neighbor
    /// is whoever delivered the record's batch.
    pub fn from_record(
        record: &CommitRecord,
        downstream: PublicKey,
        shared: SharedSecret,
    ) -> TransitHop {
        let info = TransitHopInfo {
            upstream: record.upstream,
            downstream,
            tx_id: record.tx_id,
            rx_id: record.rx_id,
        };
        TransitHop::new(info, shared, Duration::from_secs(record.lifetime_secs))
    }

    /// Whether the sweep should reap this hop. Still alive at exactly the
    /// lifetime, expired any later.
    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) > self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn test_hop_info() -> TransitHopInfo {
        let mut rng = thread_rng();
        TransitHopInfo {
            upstream: gen_keypair(&mut rng).1,
            downstream: gen_keypair(&mut rng).1,
            tx_id: PathId::random(&mut rng),
            rx_id: PathId::random(&mut rng),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hop_from_record_carries_the_record_over() {
        let mut rng = thread_rng();
        let record = CommitRecord {
            upstream: gen_keypair(&mut rng).1,
            tx_id: PathId::random(&mut rng),
            rx_id: PathId::random(&mut rng),
            lifetime_secs: 60,
        };
        let downstream = gen_keypair(&mut rng).1;

        let hop = TransitHop::from_record(&record, downstream, [7; 32]);
        assert_eq!(hop.info.upstream, record.upstream);
        assert_eq!(hop.info.downstream, downstream);
        assert_eq!(hop.info.tx_id, record.tx_id);
        assert_eq!(hop.info.rx_id, record.rx_id);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(hop.expired(clock_now()));
    }

    #[tokio::test(start_paused = true)]
    async fn transit_hop_expires_strictly_after_lifetime() {
        let lifetime = Duration::from_secs(600);
        let hop = TransitHop::new(test_hop_info(), [42; 32], lifetime);

        tokio::time::advance(lifetime).await;
        assert!(!hop.expired(clock_now()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(hop.expired(clock_now()));
    }
}
