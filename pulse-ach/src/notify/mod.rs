//! Real-time notification delivery

pub mod channel;
pub mod registry;

pub use channel::{NotificationChannel, Subscription};
pub use registry::{ConnectionId, ConnectionRegistry, ConnectionState};
