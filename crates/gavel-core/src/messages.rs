use serde::{Deserialize, Serialize};

use crate::ids::{Identity, Topic};

/// Close code a client uses for intentional teardown. The session
/// controller never schedules a reconnect after sending it.
pub const CLOSE_CODE_MANUAL: u16 = 4000;

/// Close code the service uses when a newer registration under the same
/// identity replaces a connection. The replaced client must not reconnect,
/// or it would oust its own successor.
pub const CLOSE_CODE_SUPERSEDED: u16 = 4002;

/// Messages a bidder client sends over the socket.
///
/// Decoded exactly once at the boundary; anything with an unknown `kind`
/// lands on [`ClientMessage::Unrecognized`] and is dropped by the session
/// without closing the connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this connection to an identity. A missing identity decodes as
    /// empty and is ignored, leaving the connection unregistered.
    Register {
        #[serde(default)]
        identity: Identity,
    },
    SubscribeTopic { topic: Topic, identity: Identity },
    UnsubscribeTopic { topic: Topic, identity: Identity },
    Heartbeat,
    #[serde(other)]
    Unrecognized,
}
