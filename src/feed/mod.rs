//! Live node-status feed: snapshot parsing and the WebSocket client.

#[cfg(feature = "daemon")]
pub mod client;
pub mod snapshot;
