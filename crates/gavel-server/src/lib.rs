pub mod connection;
pub mod dispatch;
pub mod liveness;
pub mod registry;
pub mod server;
pub mod session;
pub mod topics;
pub mod triggers;

pub use connection::{BidderConnection, Outbound};
pub use dispatch::{DeliveryReport, EventDispatcher};
pub use registry::ConnectionRegistry;
pub use server::{start, AppState, ServerConfig, ServerHandle};
pub use topics::TopicTable;
