//! SFB-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SfbError>;

/// Top-level error type for the split-flap board relay.
#[derive(Debug, Error)]
pub enum SfbError {
    #[error("[SFB-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SFB-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SFB-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SFB-2001] unsupported character {ch:?} at position {position}")]
    UnsupportedCharacter { ch: char, position: usize },

    #[error("[SFB-2002] value of {len} cells does not fit a {max}-column row")]
    ValueTooLong { len: usize, max: usize },

    #[error("[SFB-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SFB-3001] upstream {source_name} returned an unusable payload: {details}")]
    Upstream {
        source_name: &'static str,
        details: String,
    },

    #[error("[SFB-3002] HTTP failure in {context}: {details}")]
    Http {
        context: &'static str,
        details: String,
    },

    #[error("[SFB-3003] live feed connection failure: {details}")]
    Feed { details: String },

    #[error("[SFB-3004] live feed message rejected: {details}")]
    FeedParse { details: String },

    #[error("[SFB-3005] display write failed: {details}")]
    DisplayWrite { details: String },

    #[error("[SFB-3101] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SFB-3102] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[SFB-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SfbError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SFB-1001",
            Self::MissingConfig { .. } => "SFB-1002",
            Self::ConfigParse { .. } => "SFB-1003",
            Self::UnsupportedCharacter { .. } => "SFB-2001",
            Self::ValueTooLong { .. } => "SFB-2002",
            Self::Serialization { .. } => "SFB-2101",
            Self::Upstream { .. } => "SFB-3001",
            Self::Http { .. } => "SFB-3002",
            Self::Feed { .. } => "SFB-3003",
            Self::FeedParse { .. } => "SFB-3004",
            Self::DisplayWrite { .. } => "SFB-3005",
            Self::Io { .. } => "SFB-3101",
            Self::ChannelClosed { .. } => "SFB-3102",
            Self::Runtime { .. } => "SFB-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. }
                | Self::Http { .. }
                | Self::Feed { .. }
                | Self::DisplayWrite { .. }
                | Self::Io { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SfbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SfbError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for SfbError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http {
            context: "reqwest",
            details: value.to_string(),
        }
    }
}

#[cfg(feature = "daemon")]
impl From<tungstenite::Error> for SfbError {
    fn from(value: tungstenite::Error) -> Self {
        match value {
            // A bad URL fails the same way on every attempt.
            tungstenite::Error::Url(err) => Self::InvalidConfig {
                details: format!("feed.url: {err}"),
            },
            other => Self::Feed {
                details: other.to_string(),
            },
        }
    }
}
