use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{sink::SinkExt, stream::StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use gavel_core::events::AuctionEvent;
use gavel_core::ids::{Identity, Topic};
use gavel_core::messages::{ClientMessage, CLOSE_CODE_MANUAL, CLOSE_CODE_SUPERSEDED};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;

/// Session configuration. `base_delay` is multiplied by the attempt
/// number, so retries back off linearly.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub url: String,
    pub identity: Identity,
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub heartbeat_interval: Duration,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>, identity: Identity) -> Self {
        Self {
            url: url.into(),
            identity,
            base_delay: Duration::from_secs(3),
            max_attempts: 5,
            heartbeat_interval: Duration::from_secs(25),
        }
    }
}

/// What the session reports back to its consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionNotice {
    /// An event arrived from the service.
    Event(AuctionEvent),
    /// The connection dropped; the session retries after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Every reconnect attempt failed. The session is over.
    Exhausted { attempts: u32 },
    /// The service closed this session because the identity registered
    /// somewhere else. The session does not reconnect.
    Superseded,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session task is no longer running")]
    ControllerGone,
}

#[derive(Clone, Debug)]
enum Command {
    Subscribe(Topic),
    Unsubscribe(Topic),
    Disconnect,
}

enum SessionEnd {
    Manual,
    Superseded,
    Dropped,
}

/// Handle to one maintained session. Cloneable; every clone drives the
/// same background task. The session ends when `disconnect` is called,
/// when reconnect attempts run out, or when the registration is
/// superseded; the notice channel closes once it is over.
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::Sender<Command>,
    connected: Arc<AtomicBool>,
}

impl SessionController {
    /// Spawn the session task. The returned receiver yields events and
    /// lifecycle notices until the session ends.
    pub fn spawn(config: SessionConfig) -> (Self, mpsc::Receiver<SessionNotice>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (notice_tx, notice_rx) = mpsc::channel(256);
        let connected = Arc::new(AtomicBool::new(false));
        tokio::spawn(run_session(config, cmd_rx, notice_tx, Arc::clone(&connected)));
        (
            Self {
                commands: cmd_tx,
                connected,
            },
            notice_rx,
        )
    }

    /// Whether the session currently holds a confirmed registration.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Subscribe to a topic. The subscription is replayed after every
    /// reconnect.
    pub async fn subscribe(&self, topic: Topic) -> Result<(), SessionError> {
        self.send(Command::Subscribe(topic)).await
    }

    pub async fn unsubscribe(&self, topic: Topic) -> Result<(), SessionError> {
        self.send(Command::Unsubscribe(topic)).await
    }

    /// Close the session for good. No reconnect follows.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(Command::Disconnect).await
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ControllerGone)
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt
}

async fn run_session(
    config: SessionConfig,
    mut commands: mpsc::Receiver<Command>,
    notices: mpsc::Sender<SessionNotice>,
    connected: Arc<AtomicBool>,
) {
    let mut subscriptions: HashSet<Topic> = HashSet::new();
    let mut attempt: u32 = 0;
    loop {
        let end = drive_connection(
            &config,
            &mut commands,
            &notices,
            &mut subscriptions,
            &mut attempt,
            &connected,
        )
        .await;
        connected.store(false, Ordering::Relaxed);
        match end {
            SessionEnd::Manual => break,
            SessionEnd::Superseded => {
                let _ = notices.send(SessionNotice::Superseded).await;
                break;
            }
            SessionEnd::Dropped => {
                attempt += 1;
                if attempt > config.max_attempts {
                    tracing::warn!(
                        attempts = config.max_attempts,
                        "Giving up, reconnect attempts exhausted"
                    );
                    let _ = notices
                        .send(SessionNotice::Exhausted {
                            attempts: config.max_attempts,
                        })
                        .await;
                    break;
                }
                let delay = backoff_delay(config.base_delay, attempt);
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
                if notices
                    .send(SessionNotice::Reconnecting { attempt, delay })
                    .await
                    .is_err()
                {
                    break;
                }
                if !wait_out_backoff(delay, &mut commands, &mut subscriptions).await {
                    break;
                }
            }
        }
    }
}

/// Sleep out the backoff while still taking commands. Subscription
/// changes are recorded for the next connection; returns false when a
/// disconnect arrives or the controller is gone.
async fn wait_out_backoff(
    delay: Duration,
    commands: &mut mpsc::Receiver<Command>,
    subscriptions: &mut HashSet<Topic>,
) -> bool {
    let deadline = tokio::time::Instant::now() + delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return true,
            cmd = commands.recv() => match cmd {
                Some(Command::Subscribe(topic)) => {
                    subscriptions.insert(topic);
                }
                Some(Command::Unsubscribe(topic)) => {
                    subscriptions.remove(&topic);
                }
                Some(Command::Disconnect) | None => return false,
            },
        }
    }
}

/// One connection from dial to close. Registers the identity right after
/// the handshake and resubscribes once the registration is confirmed.
async fn drive_connection(
    config: &SessionConfig,
    commands: &mut mpsc::Receiver<Command>,
    notices: &mpsc::Sender<SessionNotice>,
    subscriptions: &mut HashSet<Topic>,
    attempt: &mut u32,
    connected: &AtomicBool,
) -> SessionEnd {
    let (ws, _) = match connect_async(config.url.as_str()).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(url = %config.url, error = %e, "Connection failed");
            return SessionEnd::Dropped;
        }
    };
    let (mut tx, mut rx) = ws.split();

    let register = ClientMessage::Register {
        identity: config.identity.clone(),
    };
    if !send_frame(&mut tx, &register).await {
        return SessionEnd::Dropped;
    }

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            frame = rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = match serde_json::from_str::<AuctionEvent>(text.as_str()) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping undecodable frame");
                            continue;
                        }
                    };
                    if matches!(event, AuctionEvent::ConnectionConfirmed { .. }) {
                        *attempt = 0;
                        connected.store(true, Ordering::Relaxed);
                        if !resubscribe_all(&mut tx, config, subscriptions).await {
                            return SessionEnd::Dropped;
                        }
                    }
                    match event {
                        AuctionEvent::HeartbeatAck => {}
                        AuctionEvent::Unrecognized => {
                            tracing::debug!("Ignoring event with unknown kind");
                        }
                        event => {
                            if notices.send(SessionNotice::Event(event)).await.is_err() {
                                // Consumer dropped the receiver; treat it
                                // as a disconnect.
                                return close_and_stop(&mut tx).await;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.as_ref().map(|f| u16::from(f.code));
                    if code == Some(CLOSE_CODE_SUPERSEDED) {
                        tracing::warn!("Session closed: identity registered elsewhere");
                        return SessionEnd::Superseded;
                    }
                    tracing::info!(code = ?code, "Server closed the connection");
                    return SessionEnd::Dropped;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Connection error");
                    return SessionEnd::Dropped;
                }
                None => {
                    tracing::info!("Connection lost");
                    return SessionEnd::Dropped;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(Command::Subscribe(topic)) => {
                    subscriptions.insert(topic.clone());
                    let msg = ClientMessage::SubscribeTopic {
                        topic,
                        identity: config.identity.clone(),
                    };
                    if !send_frame(&mut tx, &msg).await {
                        return SessionEnd::Dropped;
                    }
                }
                Some(Command::Unsubscribe(topic)) => {
                    subscriptions.remove(&topic);
                    let msg = ClientMessage::UnsubscribeTopic {
                        topic,
                        identity: config.identity.clone(),
                    };
                    if !send_frame(&mut tx, &msg).await {
                        return SessionEnd::Dropped;
                    }
                }
                Some(Command::Disconnect) | None => {
                    return close_and_stop(&mut tx).await;
                }
            },
            _ = heartbeat.tick() => {
                if !send_frame(&mut tx, &ClientMessage::Heartbeat).await {
                    return SessionEnd::Dropped;
                }
            }
        }
    }
}

async fn resubscribe_all(
    tx: &mut WsSink,
    config: &SessionConfig,
    subscriptions: &HashSet<Topic>,
) -> bool {
    for topic in subscriptions {
        let msg = ClientMessage::SubscribeTopic {
            topic: topic.clone(),
            identity: config.identity.clone(),
        };
        if !send_frame(tx, &msg).await {
            return false;
        }
    }
    true
}

async fn close_and_stop(tx: &mut WsSink) -> SessionEnd {
    let frame = CloseFrame {
        code: CloseCode::from(CLOSE_CODE_MANUAL),
        reason: "client disconnect".into(),
    };
    let _ = tx.send(Message::Close(Some(frame))).await;
    SessionEnd::Manual
}

async fn send_frame(tx: &mut WsSink, msg: &ClientMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode frame");
            return false;
        }
    };
    tx.send(Message::text(json)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly_with_the_attempt() {
        let base = Duration::from_secs(3);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(3));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(6));
        assert_eq!(backoff_delay(base, 5), Duration::from_secs(15));
    }

    #[test]
    fn config_defaults_match_the_service_expectations() {
        let config = SessionConfig::new("ws://localhost:8090/ws", Identity::new("bidder"));
        assert_eq!(config.base_delay, Duration::from_secs(3));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(25));
    }
}
