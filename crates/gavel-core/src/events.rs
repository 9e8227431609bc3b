use serde::{Deserialize, Serialize};

use crate::ids::Topic;

/// Auction timer phase carried by `timer_update` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Active,
    Extended,
    Closing,
    Closed,
}

/// Auction lifecycle state carried by `auction_update` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Started,
    Paused,
    Ended,
}

/// Events the service pushes to bidder clients.
///
/// Constructed by the trigger caller (or the session, for acks) and never
/// mutated after dispatch. Payload fields use the camelCase names the
/// bidder UI reads off the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuctionEvent {
    /// Positive acknowledgment of a registration. Always the first message
    /// a freshly registered connection receives.
    ConnectionConfirmed { message: String },

    TopicSubscribed { topic: Topic, message: String },

    #[serde(rename_all = "camelCase")]
    BidUpdate {
        topic: Topic,
        lot_id: String,
        current_bid: f64,
        bidder_identity: String,
        bid_amount: f64,
        lot_title: String,
        timestamp: String,
        bid_increment: f64,
        next_min_bid: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_auto_bid: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        auto_bidder: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    TimerUpdate {
        topic: Topic,
        time_remaining: u64,
        status: TimerStatus,
    },

    AuctionUpdate {
        topic: Topic,
        status: AuctionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    OutbidNotification {
        topic: Topic,
        message: String,
        lot_id: String,
        new_bid: f64,
        lot_title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_auto_bid: Option<bool>,
    },

    HeartbeatAck,

    /// Decode fallback for kinds this build does not know. Receivers log
    /// and drop it; the service never constructs one.
    #[serde(other)]
    Unrecognized,
}

impl AuctionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionConfirmed { .. } => "connection_confirmed",
            Self::TopicSubscribed { .. } => "topic_subscribed",
            Self::BidUpdate { .. } => "bid_update",
            Self::TimerUpdate { .. } => "timer_update",
            Self::AuctionUpdate { .. } => "auction_update",
            Self::OutbidNotification { .. } => "outbid_notification",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Topic the event targets, if it is auction-scoped.
    pub fn topic(&self) -> Option<&Topic> {
        match self {
            Self::TopicSubscribed { topic, .. }
            | Self::BidUpdate { topic, .. }
            | Self::TimerUpdate { topic, .. }
            | Self::AuctionUpdate { topic, .. }
            | Self::OutbidNotification { topic, .. } => Some(topic),
            Self::ConnectionConfirmed { .. } | Self::HeartbeatAck | Self::Unrecognized => None,
        }
    }
}
