use std::sync::Arc;
use std::time::Duration;

use gavel_telemetry::ServiceMetrics;

use crate::registry::ConnectionRegistry;
use crate::topics::TopicTable;

/// Outcome of one liveness sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub probed: usize,
    pub evicted: usize,
}

/// One pass over the registry: evict connections whose channel is no
/// longer open, probe the rest.
///
/// Eviction removes the registry entry and every topic subscription. The
/// policy is best effort: a connection that cannot even queue the probe
/// is only marked closed here and gets evicted by the next sweep.
pub fn sweep(registry: &ConnectionRegistry, topics: &TopicTable) -> SweepStats {
    let mut stats = SweepStats::default();
    for (identity, conn) in registry.snapshot() {
        if conn.is_open() {
            conn.send_ping();
            stats.probed += 1;
        } else if registry.release(&identity, conn.id()) {
            topics.purge(&identity);
            stats.evicted += 1;
            tracing::info!(
                identity = %identity,
                connection_id = %conn.id(),
                last_pong_secs = conn.last_pong_elapsed().as_secs(),
                "Evicted dead connection"
            );
        }
    }
    stats
}

/// Spawn the periodic sweep. The returned handle is aborted on shutdown.
pub fn start_liveness_sweep(
    registry: Arc<ConnectionRegistry>,
    topics: Arc<TopicTable>,
    metrics: Arc<ServiceMetrics>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            let stats = sweep(&registry, &topics);
            metrics.record_connections_evicted(stats.evicted as u64);
            if stats.evicted > 0 {
                tracing::info!(
                    probed = stats.probed,
                    evicted = stats.evicted,
                    remaining = registry.count(),
                    "Liveness sweep finished"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{BidderConnection, Outbound};
    use gavel_core::ids::{Identity, Topic};
    use std::sync::Arc;

    #[tokio::test]
    async fn sweep_probes_open_connections() {
        let registry = ConnectionRegistry::new();
        let topics = TopicTable::new();
        let (conn, mut rx) = BidderConnection::new(8);
        registry.register(Identity::new("a"), Arc::clone(&conn));

        let stats = sweep(&registry, &topics);

        assert_eq!(stats, SweepStats { probed: 1, evicted: 0 });
        assert!(matches!(rx.try_recv(), Ok(Outbound::Ping)));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn sweep_evicts_closed_connections_and_their_subscriptions() {
        let registry = ConnectionRegistry::new();
        let topics = TopicTable::new();
        let (conn, _rx) = BidderConnection::new(8);
        let identity = Identity::new("a");
        registry.register(identity.clone(), Arc::clone(&conn));
        topics.subscribe(Topic::new("auction-42"), identity.clone());
        conn.mark_closed();

        let stats = sweep(&registry, &topics);

        assert_eq!(stats, SweepStats { probed: 0, evicted: 1 });
        assert_eq!(registry.count(), 0);
        assert!(topics.subscribers_of(&Topic::new("auction-42")).is_empty());
    }

    #[tokio::test]
    async fn failed_probe_leads_to_eviction_on_the_next_sweep() {
        let registry = ConnectionRegistry::new();
        let topics = TopicTable::new();
        let (conn, rx) = BidderConnection::new(8);
        registry.register(Identity::new("a"), Arc::clone(&conn));
        drop(rx);

        let first = sweep(&registry, &topics);
        assert_eq!(first, SweepStats { probed: 1, evicted: 0 });
        assert!(!conn.is_open());

        let second = sweep(&registry, &topics);
        assert_eq!(second, SweepStats { probed: 0, evicted: 1 });
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn sweep_handles_a_mixed_registry() {
        let registry = ConnectionRegistry::new();
        let topics = TopicTable::new();
        let (alive, _alive_rx) = BidderConnection::new(8);
        let (dead, _dead_rx) = BidderConnection::new(8);
        registry.register(Identity::new("alive"), Arc::clone(&alive));
        registry.register(Identity::new("dead"), Arc::clone(&dead));
        dead.mark_closed();

        let stats = sweep(&registry, &topics);

        assert_eq!(stats, SweepStats { probed: 1, evicted: 1 });
        assert!(registry.lookup(&Identity::new("alive")).is_some());
        assert!(registry.lookup(&Identity::new("dead")).is_none());
    }
}
