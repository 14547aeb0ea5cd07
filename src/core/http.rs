//! Shared blocking HTTP client setup and response decoding.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use crate::core::config::HttpConfig;
use crate::core::errors::{Result, SfbError};

const MAX_ERROR_BODY: usize = 200;

/// Client with the configured per-request timeout and user agent.
pub fn build_client(cfg: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .user_agent(cfg.user_agent.clone())
        .build()
        .map_err(|err| SfbError::Http {
            context: "client",
            details: format!("failed to initialize HTTP client: {err}"),
        })
}

/// Read a response body, failing on non-success status, then decode it as JSON.
pub fn read_json<T: DeserializeOwned>(response: Response, context: &'static str) -> Result<T> {
    let status = response.status();
    let body = response.text().map_err(|err| SfbError::Http {
        context,
        details: format!("failed to read response body: {err}"),
    })?;
    if !status.is_success() {
        return Err(SfbError::Http {
            context,
            details: format!("HTTP {status}: {}", truncate_for_error(&body)),
        });
    }
    serde_json::from_str(&body).map_err(|err| SfbError::Upstream {
        source_name: context,
        details: format!("unexpected response shape: {err}"),
    })
}

pub(crate) fn truncate_for_error(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_ERROR_BODY).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_bodies_are_kept_whole() {
        assert_eq!(truncate_for_error("bad gateway"), "bad gateway");
    }

    #[test]
    fn long_bodies_are_cut_on_char_boundaries() {
        let body = "°".repeat(300);
        let cut = truncate_for_error(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY + 3);
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }
}
