//! WebSocket client for the auction event service.
//!
//! [`SessionController`] maintains one registered session in a background
//! task: it registers the bidder identity, keeps the connection alive
//! with heartbeats, reconnects with a growing delay when the connection
//! drops, and replays topic subscriptions after every reconnect. Events
//! and lifecycle changes surface on a notice channel.

pub mod controller;

pub use controller::{SessionConfig, SessionController, SessionError, SessionNotice};
