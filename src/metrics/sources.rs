//! Upstream metric fetchers.
//!
//! [`MetricSource`] is the seam the refresh coordinator talks to; the HTTP
//! implementation talks to the chain RPC, the registry pools endpoint, the
//! social API and the quotes API with one shared blocking client.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::core::config::{HttpConfig, SourcesConfig};
use crate::core::errors::{Result, SfbError};
use crate::core::http::{build_client, read_json};

/// Both prices from one batch quote call. `None` means the asset was absent
/// from the response or had no price in the configured currency.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceQuotes {
    pub primary: Option<f64>,
    pub secondary: Option<f64>,
}

/// Raw metric reads. Implementations do no formatting.
pub trait MetricSource: Send {
    fn block_height(&self) -> Result<u64>;
    fn follower_count(&self) -> Result<u64>;
    /// Per-pool archived byte counts as decimal integer strings.
    fn pool_archived_bytes(&self) -> Result<Vec<String>>;
    fn prices(&self) -> Result<PriceQuotes>;
}

// ──────────────────── response shapes ────────────────────

/// An integer that some APIs send as a JSON string and others as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntegerField {
    Text(String),
    Number(serde_json::Number),
}

impl IntegerField {
    fn into_decimal(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChainStatusResponse {
    result: ChainStatusResult,
}

#[derive(Debug, Deserialize)]
struct ChainStatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: IntegerField,
}

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    pools: Vec<PoolEntry>,
}

#[derive(Debug, Deserialize)]
struct PoolEntry {
    bytes_archived: IntegerField,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Debug, Deserialize)]
struct UserData {
    public_metrics: PublicMetrics,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, QuoteEntry>,
}

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    #[serde(default)]
    quote: HashMap<String, CurrencyQuote>,
}

#[derive(Debug, Deserialize)]
struct CurrencyQuote {
    price: Option<f64>,
}

fn block_height_from(response: ChainStatusResponse) -> Result<u64> {
    let raw = response.result.sync_info.latest_block_height.into_decimal();
    raw.trim().parse().map_err(|err| SfbError::Upstream {
        source_name: "chain_status",
        details: format!("latest_block_height {raw:?}: {err}"),
    })
}

fn archived_bytes_from(response: PoolsResponse) -> Vec<String> {
    response
        .pools
        .into_iter()
        .map(|pool| pool.bytes_archived.into_decimal())
        .collect()
}

fn quote_price(response: &QuotesResponse, id: &str, currency: &str) -> Option<f64> {
    response.data.get(id)?.quote.get(currency)?.price
}

fn prices_from(
    response: &QuotesResponse,
    primary_id: &str,
    secondary_id: &str,
    currency: &str,
) -> PriceQuotes {
    PriceQuotes {
        primary: quote_price(response, primary_id, currency),
        secondary: quote_price(response, secondary_id, currency),
    }
}

// ──────────────────── HTTP implementation ────────────────────

#[derive(Clone)]
pub struct HttpMetricSource {
    client: Client,
    chain_status_url: String,
    pools_url: String,
    followers_url: String,
    twitter_bearer_token: String,
    quotes_url: String,
    quotes_api_key: String,
    quote_slugs: String,
    primary_quote_id: String,
    secondary_quote_id: String,
    quote_currency: String,
}

impl fmt::Debug for HttpMetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMetricSource")
            .field("chain_status_url", &self.chain_status_url)
            .field("pools_url", &self.pools_url)
            .field("followers_url", &self.followers_url)
            .field("twitter_bearer_token", &"<redacted>")
            .field("quotes_url", &self.quotes_url)
            .field("quotes_api_key", &"<redacted>")
            .field("quote_slugs", &self.quote_slugs)
            .finish_non_exhaustive()
    }
}

impl HttpMetricSource {
    pub fn new(sources: &SourcesConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            chain_status_url: sources.chain_status_url.clone(),
            pools_url: sources.pools_url.clone(),
            followers_url: format!(
                "{}/2/users/by/username/{}",
                sources.twitter_url, sources.twitter_username
            ),
            twitter_bearer_token: sources.twitter_bearer_token.clone(),
            quotes_url: format!("{}/v2/cryptocurrency/quotes/latest", sources.quotes_url),
            quotes_api_key: sources.quotes_api_key.clone(),
            quote_slugs: sources.quote_slugs.clone(),
            primary_quote_id: sources.primary_quote_id.clone(),
            secondary_quote_id: sources.secondary_quote_id.clone(),
            quote_currency: sources.quote_currency.clone(),
        })
    }

    fn require_secret(secret: &str, name: &'static str) -> Result<()> {
        if secret.trim().is_empty() {
            return Err(SfbError::Upstream {
                source_name: name,
                details: "credential not configured".to_string(),
            });
        }
        Ok(())
    }
}

impl MetricSource for HttpMetricSource {
    fn block_height(&self) -> Result<u64> {
        let response = self.client.get(&self.chain_status_url).send()?;
        block_height_from(read_json(response, "chain_status")?)
    }

    fn follower_count(&self) -> Result<u64> {
        Self::require_secret(&self.twitter_bearer_token, "followers")?;
        let response = self
            .client
            .get(&self.followers_url)
            .query(&[("user.fields", "public_metrics")])
            .bearer_auth(&self.twitter_bearer_token)
            .send()?;
        let user: UserResponse = read_json(response, "followers")?;
        Ok(user.data.public_metrics.followers_count)
    }

    fn pool_archived_bytes(&self) -> Result<Vec<String>> {
        let response = self.client.get(&self.pools_url).send()?;
        Ok(archived_bytes_from(read_json(response, "pools")?))
    }

    fn prices(&self) -> Result<PriceQuotes> {
        Self::require_secret(&self.quotes_api_key, "quotes")?;
        let response = self
            .client
            .get(&self.quotes_url)
            .query(&[("slug", self.quote_slugs.as_str())])
            .header("X-CMC_PRO_API_KEY", &self.quotes_api_key)
            .send()?;
        let quotes: QuotesResponse = read_json(response, "quotes")?;
        Ok(prices_from(
            &quotes,
            &self.primary_quote_id,
            &self.secondary_quote_id,
            &self.quote_currency,
        ))
    }
}
