//! Subscription message API client.

use std::fmt;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::board::grid::Grid;
use crate::core::config::{DisplayConfig, HttpConfig};
use crate::core::errors::{Result, SfbError};
use crate::core::http::{build_client, read_json};
use crate::display::{DisplaySink, WriteReceipt};

#[derive(Serialize)]
struct MessageRequest<'a> {
    characters: &'a Grid,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<MessageInfo>,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    id: Option<String>,
}

/// Posts grids to `<base_url>/subscriptions/<id>/message`.
#[derive(Clone)]
pub struct VestaboardSink {
    endpoint: String,
    api_key: String,
    api_secret: String,
    client: Client,
}

impl fmt::Debug for VestaboardSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VestaboardSink")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl VestaboardSink {
    pub fn new(display: &DisplayConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            endpoint: message_endpoint(&display.base_url, &display.subscription_id),
            api_key: display.api_key.clone(),
            api_secret: display.api_secret.clone(),
            client: build_client(http)?,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn message_endpoint(base_url: &str, subscription_id: &str) -> String {
    format!(
        "{}/subscriptions/{}/message",
        base_url.trim_end_matches('/'),
        subscription_id
    )
}

/// Request body for one write.
pub fn message_body(grid: &Grid) -> Result<String> {
    Ok(serde_json::to_string(&MessageRequest { characters: grid })?)
}

impl DisplaySink for VestaboardSink {
    fn name(&self) -> &'static str {
        "vestaboard"
    }

    fn push(&self, grid: &Grid) -> Result<WriteReceipt> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Vestaboard-Api-Key", &self.api_key)
            .header("X-Vestaboard-Api-Secret", &self.api_secret)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message_body(grid)?)
            .send()
            .map_err(|err| SfbError::DisplayWrite {
                details: format!("POST {}: {err}", self.endpoint),
            })?;
        let parsed: MessageResponse =
            read_json(response, "display").map_err(|err| SfbError::DisplayWrite {
                details: err.to_string(),
            })?;
        Ok(WriteReceipt {
            message_id: parsed.message.and_then(|message| message.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_subscription() {
        assert_eq!(
            message_endpoint("https://platform.vestaboard.com/", "sub-123"),
            "https://platform.vestaboard.com/subscriptions/sub-123/message"
        );
    }

    #[test]
    fn body_wraps_grid_under_characters() {
        let body = message_body(&Grid::with_labels()).expect("serializes");
        let value: serde_json::Value = serde_json::from_str(&body).expect("valid json");
        let rows = value["characters"].as_array().expect("characters array");
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0][0], 8);
        assert_eq!(rows[0].as_array().map(Vec::len), Some(22));
    }

    #[test]
    fn response_message_id_is_optional() {
        let with_id: MessageResponse =
            serde_json::from_str(r#"{"message":{"id":"m-1","text":null}}"#).expect("parses");
        assert_eq!(with_id.message.and_then(|m| m.id).as_deref(), Some("m-1"));

        let bare: MessageResponse = serde_json::from_str("{}").expect("parses");
        assert!(bare.message.is_none());
    }

    #[test]
    fn debug_redacts_credentials() {
        let display = DisplayConfig {
            subscription_id: "sub".to_string(),
            api_key: "key-live".to_string(),
            api_secret: "secret-live".to_string(),
            ..DisplayConfig::default()
        };
        let sink = VestaboardSink::new(&display, &HttpConfig::default()).expect("client");
        let rendered = format!("{sink:?}");
        assert!(!rendered.contains("key-live"));
        assert!(!rendered.contains("secret-live"));
        assert!(rendered.contains("/subscriptions/sub/message"));
    }
}
