//! Activity logging: a JSONL writer owned by one logger thread.

pub mod activity;
pub mod jsonl;
