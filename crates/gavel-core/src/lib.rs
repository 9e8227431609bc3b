//! Shared protocol types for the auction event distribution service:
//! identifiers, the inbound client message envelope, and the outbound
//! event envelope pushed to bidders.

pub mod events;
pub mod ids;
pub mod messages;

pub use events::{AuctionEvent, AuctionStatus, TimerStatus};
pub use ids::{ConnectionId, Identity, Topic};
pub use messages::{ClientMessage, CLOSE_CODE_MANUAL, CLOSE_CODE_SUPERSEDED};
