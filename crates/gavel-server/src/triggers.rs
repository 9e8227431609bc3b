use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use gavel_core::events::{AuctionEvent, AuctionStatus, TimerStatus};
use gavel_core::ids::{Identity, Topic};
use gavel_telemetry::MetricsSnapshot;

use crate::dispatch::DeliveryReport;
use crate::server::AppState;

/// Body for `POST /trigger/notify`. With an identity the event goes to
/// that bidder only; without one it goes to every connection.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    #[serde(default)]
    pub identity: Option<Identity>,
    pub event: AuctionEvent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum NotifyResponse {
    Direct { delivered: bool },
    Broadcast(DeliveryReport),
}

pub async fn notify(
    State(state): State<AppState>,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>, (StatusCode, Json<serde_json::Value>)> {
    if matches!(req.event, AuctionEvent::Unrecognized) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "unrecognized event kind"})),
        ));
    }
    // An empty identity means broadcast, same as leaving it out.
    let response = match req.identity.filter(|identity| !identity.is_empty()) {
        Some(identity) => NotifyResponse::Direct {
            delivered: state.dispatcher.dispatch_direct(&identity, &req.event),
        },
        None => NotifyResponse::Broadcast(state.dispatcher.dispatch_broadcast(&req.event)),
    };
    Ok(Json(response))
}

/// Body for `POST /trigger/bid_update`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidUpdateRequest {
    pub topic: Topic,
    pub lot_id: String,
    pub current_bid: f64,
    pub bidder_identity: String,
    pub bid_amount: f64,
    pub lot_title: String,
    pub bid_increment: f64,
    pub next_min_bid: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub is_auto_bid: Option<bool>,
    #[serde(default)]
    pub auto_bidder: Option<String>,
}

impl BidUpdateRequest {
    fn into_event(self) -> AuctionEvent {
        AuctionEvent::BidUpdate {
            topic: self.topic,
            lot_id: self.lot_id,
            current_bid: self.current_bid,
            bidder_identity: self.bidder_identity,
            bid_amount: self.bid_amount,
            lot_title: self.lot_title,
            timestamp: self
                .timestamp
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            bid_increment: self.bid_increment,
            next_min_bid: self.next_min_bid,
            is_auto_bid: self.is_auto_bid,
            auto_bidder: self.auto_bidder,
        }
    }
}

pub async fn bid_update(
    State(state): State<AppState>,
    Json(req): Json<BidUpdateRequest>,
) -> Json<DeliveryReport> {
    let topic = req.topic.clone();
    let event = req.into_event();
    Json(state.dispatcher.dispatch_to_topic(&topic, &event))
}

/// Body for `POST /trigger/timer_update`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdateRequest {
    pub topic: Topic,
    pub time_remaining: u64,
    pub status: TimerStatus,
}

pub async fn timer_update(
    State(state): State<AppState>,
    Json(req): Json<TimerUpdateRequest>,
) -> Json<DeliveryReport> {
    let event = AuctionEvent::TimerUpdate {
        topic: req.topic.clone(),
        time_remaining: req.time_remaining,
        status: req.status,
    };
    Json(state.dispatcher.dispatch_to_topic(&req.topic, &event))
}

/// Body for `POST /trigger/auction_update`.
#[derive(Debug, Deserialize)]
pub struct AuctionUpdateRequest {
    pub topic: Topic,
    pub status: AuctionStatus,
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn auction_update(
    State(state): State<AppState>,
    Json(req): Json<AuctionUpdateRequest>,
) -> Json<DeliveryReport> {
    let event = AuctionEvent::AuctionUpdate {
        topic: req.topic.clone(),
        status: req.status,
        message: req.message,
    };
    Json(state.dispatcher.dispatch_to_topic(&req.topic, &event))
}

/// Body returned by `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: usize,
    pub topics: BTreeMap<String, usize>,
    pub events: MetricsSnapshot,
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.registry.count(),
        topics: state.topics.counts(),
        events: state.metrics.snapshot(),
    })
}
