use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use gavel_core::ids::{ConnectionId, Identity};

/// Items queued for a connection's writer task. Event payloads are
/// serialized once and shared across every recipient of a fan-out.
#[derive(Clone, Debug)]
pub enum Outbound {
    Event(Arc<String>),
    Ping,
    Close(u16, &'static str),
}

/// One live WebSocket to a bidder.
///
/// The session that accepted the socket owns the lifecycle; the registry
/// and dispatcher hold `Arc` references while the identity is registered.
/// Only the writer task touches the socket sink, everyone else goes
/// through the bounded send queue.
pub struct BidderConnection {
    id: ConnectionId,
    identity: Mutex<Option<Identity>>,
    tx: mpsc::Sender<Outbound>,
    opened_at: Instant,
    open: AtomicBool,
    last_pong: Mutex<Instant>,
}

impl BidderConnection {
    pub fn new(max_send_queue: usize) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(max_send_queue);
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            identity: Mutex::new(None),
            tx,
            opened_at: Instant::now(),
            open: AtomicBool::new(true),
            last_pong: Mutex::new(Instant::now()),
        });
        (conn, rx)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Bind the bidder identity claimed in a register message. Rebinding
    /// replaces the previous identity.
    pub fn bind_identity(&self, identity: Identity) {
        *self.identity.lock() = Some(identity);
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    /// Queue a serialized event for delivery. Returns false when the queue
    /// is full or the writer is gone; the failure stays local to this
    /// connection and never surfaces to the caller as an error.
    pub fn send_event(&self, payload: Arc<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.tx.try_send(Outbound::Event(payload)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %self.id, "Send queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_closed();
                false
            }
        }
    }

    /// Queue a liveness probe. A connection whose writer is gone is marked
    /// closed here and picked up by the next sweep.
    pub fn send_ping(&self) -> bool {
        match self.tx.try_send(Outbound::Ping) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_closed();
                false
            }
        }
    }

    /// Ask the writer to send a close frame and stop. Marks the connection
    /// closed immediately so no further events are queued behind the frame.
    pub fn close(&self, code: u16, reason: &'static str) {
        self.mark_closed();
        let _ = self.tx.try_send(Outbound::Close(code, reason));
    }

    pub fn record_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_event_reaches_the_writer_queue() {
        let (conn, mut rx) = BidderConnection::new(8);
        let payload = Arc::new(String::from("{\"kind\":\"heartbeat_ack\"}"));

        assert!(conn.send_event(Arc::clone(&payload)));
        match rx.recv().await {
            Some(Outbound::Event(received)) => assert_eq!(received.as_str(), payload.as_str()),
            other => panic!("expected queued event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_queue_drops_the_event_but_keeps_the_connection_open() {
        let (conn, _rx) = BidderConnection::new(1);

        assert!(conn.send_event(Arc::new(String::from("first"))));
        assert!(!conn.send_event(Arc::new(String::from("second"))));
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn dropped_writer_marks_the_connection_closed() {
        let (conn, rx) = BidderConnection::new(8);
        drop(rx);

        assert!(!conn.send_event(Arc::new(String::from("late"))));
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn send_ping_on_dropped_writer_marks_closed() {
        let (conn, rx) = BidderConnection::new(8);
        drop(rx);

        assert!(!conn.send_ping());
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn close_queues_a_close_frame_and_blocks_further_events() {
        let (conn, mut rx) = BidderConnection::new(8);

        conn.close(4002, "superseded");
        assert!(!conn.is_open());
        assert!(!conn.send_event(Arc::new(String::from("after close"))));

        match rx.recv().await {
            Some(Outbound::Close(code, reason)) => {
                assert_eq!(code, 4002);
                assert_eq!(reason, "superseded");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn identity_binding_is_replaceable() {
        let (conn, _rx) = BidderConnection::new(8);
        assert!(conn.identity().is_none());

        conn.bind_identity(Identity::new("bidder-7"));
        assert_eq!(conn.identity().unwrap().as_str(), "bidder-7");

        conn.bind_identity(Identity::new("bidder-8"));
        assert_eq!(conn.identity().unwrap().as_str(), "bidder-8");
    }

    #[tokio::test]
    async fn record_pong_resets_the_elapsed_clock() {
        let (conn, _rx) = BidderConnection::new(8);
        conn.record_pong();
        assert!(conn.last_pong_elapsed() < Duration::from_secs(1));
    }
}
