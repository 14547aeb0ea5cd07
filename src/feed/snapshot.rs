//! Status snapshots from the live node feed.
//!
//! A feed message is a JSON array with one object per node, in the feed's own
//! order, each carrying a string `statusCode`. Anything else is rejected whole:
//! one node with a missing, `null` or non-string `statusCode` discards the
//! entire message, and the board keeps showing the previous snapshot.

use std::fmt;

use serde::Deserialize;

use crate::core::errors::{Result, SfbError};

/// State of one monitored node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Running,
    Stalling,
    Offline,
    /// A code the board has no tile for; kept verbatim for comparison and logs.
    Unknown(String),
}

impl NodeStatus {
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "RUNNING" => Self::Running,
            "STALLING" => Self::Stalling,
            "OFFLINE" => Self::Offline,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire code this status was read from.
    #[must_use]
    pub fn as_code(&self) -> &str {
        match self {
            Self::Running => "RUNNING",
            Self::Stalling => "STALLING",
            Self::Offline => "OFFLINE",
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    #[serde(rename = "statusCode")]
    status_code: String,
}

/// One complete ordered reading of node states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    nodes: Vec<NodeStatus>,
}

impl StatusSnapshot {
    #[must_use]
    pub const fn new(nodes: Vec<NodeStatus>) -> Self {
        Self { nodes }
    }

    /// Parse a feed message body.
    pub fn parse(body: &str) -> Result<Self> {
        let records: Vec<NodeRecord> =
            serde_json::from_str(body).map_err(|err| SfbError::FeedParse {
                details: err.to_string(),
            })?;
        Ok(Self {
            nodes: records
                .iter()
                .map(|record| NodeStatus::from_code(&record.status_code))
                .collect(),
        })
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeStatus] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canonical serialized form used for change detection: the JSON array of
    /// wire codes. Parsed snapshots share a fingerprint exactly when they are equal.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let codes: Vec<&str> = self.nodes.iter().map(NodeStatus::as_code).collect();
        serde_json::Value::from(codes).to_string()
    }
}
