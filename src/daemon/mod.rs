//! Daemon subsystem: the grid-owning orchestrator, the refresh schedule, signal
//! handling, and the main loop that ties them to the feed.

#[cfg(feature = "daemon")]
pub mod loop_main;
pub mod orchestrator;
pub mod schedule;
#[cfg(feature = "daemon")]
pub mod signals;
