use std::sync::Arc;

use serde::Serialize;

use gavel_core::events::AuctionEvent;
use gavel_core::ids::{Identity, Topic};
use gavel_telemetry::ServiceMetrics;

use crate::registry::ConnectionRegistry;
use crate::topics::TopicTable;

/// Per-call delivery counts returned to the trigger surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Fans auction events out through the registry and topic table.
///
/// Dispatch never evicts: a connection that refuses the payload is
/// counted as failed and left for the liveness sweep. Target lists are
/// copied out of the shared maps before any send happens.
pub struct EventDispatcher {
    registry: Arc<ConnectionRegistry>,
    topics: Arc<TopicTable>,
    metrics: Arc<ServiceMetrics>,
}

impl EventDispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        topics: Arc<TopicTable>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            registry,
            topics,
            metrics,
        }
    }

    /// Deliver one event to one identity. False when the identity has no
    /// registered connection or the connection refused the payload.
    pub fn dispatch_direct(&self, identity: &Identity, event: &AuctionEvent) -> bool {
        let Some(payload) = serialize_event(event) else {
            return false;
        };
        let delivered = match self.registry.lookup(identity) {
            Some(conn) => conn.send_event(payload),
            None => {
                tracing::debug!(identity = %identity, kind = event.kind(), "Direct event for unregistered identity");
                false
            }
        };
        self.metrics
            .record_dispatch(delivered as u64, (!delivered) as u64);
        delivered
    }

    /// Deliver one event to every registered connection.
    pub fn dispatch_broadcast(&self, event: &AuctionEvent) -> DeliveryReport {
        let Some(payload) = serialize_event(event) else {
            return DeliveryReport::default();
        };
        let targets = self.registry.snapshot();
        let mut report = DeliveryReport::default();
        for (_, conn) in targets {
            if conn.send_event(Arc::clone(&payload)) {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }
        self.metrics
            .record_dispatch(report.sent as u64, report.failed as u64);
        tracing::debug!(
            kind = event.kind(),
            sent = report.sent,
            failed = report.failed,
            "Broadcast dispatched"
        );
        report
    }

    /// Deliver one event to the topic's registered subscribers.
    /// Subscribers without a registry entry are skipped without counting:
    /// a subscription is allowed to outlive its connection.
    pub fn dispatch_to_topic(&self, topic: &Topic, event: &AuctionEvent) -> DeliveryReport {
        let Some(payload) = serialize_event(event) else {
            return DeliveryReport::default();
        };
        let subscribers = self.topics.subscribers_of(topic);
        let mut report = DeliveryReport::default();
        for identity in subscribers {
            let Some(conn) = self.registry.lookup(&identity) else {
                continue;
            };
            if conn.send_event(Arc::clone(&payload)) {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }
        self.metrics
            .record_dispatch(report.sent as u64, report.failed as u64);
        tracing::debug!(
            topic = %topic,
            kind = event.kind(),
            sent = report.sent,
            failed = report.failed,
            "Topic event dispatched"
        );
        report
    }
}

/// Serialize once per dispatch; the resulting payload is shared by every
/// recipient. Serialization failure is logged and swallows the event.
fn serialize_event(event: &AuctionEvent) -> Option<Arc<String>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            tracing::error!(kind = event.kind(), error = %e, "Failed to serialize event");
            None
        }
    }
}
