//! Live channel over ActionCable: one WebSocket, many channel subscriptions.

pub mod connection;
pub mod protocol;
pub mod router;

pub use connection::{CableClient, CableConfig};
