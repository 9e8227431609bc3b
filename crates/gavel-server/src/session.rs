use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};

use gavel_core::events::AuctionEvent;
use gavel_core::messages::{ClientMessage, CLOSE_CODE_SUPERSEDED};

use crate::connection::{BidderConnection, Outbound};
use crate::server::AppState;

/// Drive one WebSocket session from accept to teardown.
///
/// The socket is split into a writer task that drains the connection's
/// send queue and a reader task that decodes inbound frames. When either
/// side finishes the other is aborted and the identity is released.
pub async fn run_ws_session(socket: WebSocket, state: AppState) {
    let (conn, mut rx) = BidderConnection::new(state.max_send_queue);
    state.metrics.record_connection_opened();
    tracing::info!(connection_id = %conn.id(), "WebSocket connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_conn = Arc::clone(&conn);
    let mut send_task = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Event(payload) => {
                    if ws_tx
                        .send(Message::Text(payload.as_str().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Outbound::Ping => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(code, reason) => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
        writer_conn.mark_closed();
    });

    let reader_conn = Arc::clone(&conn);
    let reader_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => handle_frame(&reader_conn, &reader_state, text.as_str()),
                Message::Pong(_) => reader_conn.record_pong(),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    conn.mark_closed();
    match conn.identity() {
        Some(identity) => {
            if state.registry.release(&identity, conn.id()) {
                state.topics.purge(&identity);
                tracing::info!(
                    identity = %identity,
                    connection_id = %conn.id(),
                    age_secs = conn.age().as_secs(),
                    "Connection closed, identity released"
                );
            } else {
                tracing::debug!(
                    identity = %identity,
                    connection_id = %conn.id(),
                    "Superseded connection closed"
                );
            }
        }
        None => {
            tracing::debug!(connection_id = %conn.id(), "Anonymous connection closed");
        }
    }
}

/// Decode a text frame once and route it. A frame that is not valid JSON
/// or does not carry a known shape is logged and dropped; the connection
/// stays open.
fn handle_frame(conn: &Arc<BidderConnection>, state: &AppState, raw: &str) {
    match serde_json::from_str::<ClientMessage>(raw) {
        Ok(msg) => handle_client_message(conn, state, msg),
        Err(e) => {
            tracing::warn!(connection_id = %conn.id(), error = %e, "Dropping malformed frame");
        }
    }
}

fn handle_client_message(conn: &Arc<BidderConnection>, state: &AppState, msg: ClientMessage) {
    match msg {
        ClientMessage::Register { identity } => {
            if identity.is_empty() {
                tracing::debug!(connection_id = %conn.id(), "Register without identity ignored");
                return;
            }
            // A socket that re-registers under a new identity gives up its
            // old registry entry and subscriptions.
            if let Some(previous) = conn.identity() {
                if previous != identity && state.registry.release(&previous, conn.id()) {
                    state.topics.purge(&previous);
                }
            }
            conn.bind_identity(identity.clone());
            // The confirmation is queued before the registry install so it
            // is the first event the bidder ever receives.
            queue_event(
                conn,
                &AuctionEvent::ConnectionConfirmed {
                    message: format!("Connected as {identity}"),
                },
            );
            if let Some(old) = state.registry.register(identity.clone(), Arc::clone(conn)) {
                if old.id() != conn.id() {
                    old.close(CLOSE_CODE_SUPERSEDED, "superseded by a newer registration");
                    tracing::info!(
                        identity = %identity,
                        old_connection = %old.id(),
                        new_connection = %conn.id(),
                        "Registration superseded"
                    );
                }
            }
            tracing::info!(identity = %identity, connection_id = %conn.id(), "Bidder registered");
        }
        ClientMessage::SubscribeTopic { topic, identity } => {
            if topic.is_empty() || identity.is_empty() {
                tracing::warn!(connection_id = %conn.id(), "Dropping subscribe with empty topic or identity");
                return;
            }
            state.topics.subscribe(topic.clone(), identity.clone());
            tracing::debug!(identity = %identity, topic = %topic, "Topic subscribed");
            queue_event(
                conn,
                &AuctionEvent::TopicSubscribed {
                    topic: topic.clone(),
                    message: format!("Subscribed to {topic}"),
                },
            );
        }
        ClientMessage::UnsubscribeTopic { topic, identity } => {
            // No acknowledgement for unsubscribe.
            state.topics.unsubscribe(&topic, &identity);
            tracing::debug!(identity = %identity, topic = %topic, "Topic unsubscribed");
        }
        ClientMessage::Heartbeat => {
            queue_event(conn, &AuctionEvent::HeartbeatAck);
        }
        ClientMessage::Unrecognized => {
            tracing::warn!(connection_id = %conn.id(), "Dropping frame with unrecognized kind");
        }
    }
}

fn queue_event(conn: &BidderConnection, event: &AuctionEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            conn.send_event(Arc::new(json));
        }
        Err(e) => {
            tracing::error!(kind = event.kind(), error = %e, "Failed to serialize reply");
        }
    }
}
