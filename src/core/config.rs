//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SfbError};

const REDACTED: &str = "<redacted>";

/// Full SFB configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub feed: FeedConfig,
    pub sources: SourcesConfig,
    pub schedule: ScheduleConfig,
    pub board: BoardConfig,
    pub http: HttpConfig,
    pub paths: PathsConfig,
}

/// Outbound display API (subscription message endpoint).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub base_url: String,
    pub subscription_id: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Live node-status WebSocket feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    pub enabled: bool,
    pub url: String,
    /// Value of the `event` field sent once per connection.
    pub subscribe_event: String,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

/// Upstream metric endpoints and credentials.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourcesConfig {
    pub chain_status_url: String,
    pub pools_url: String,
    pub twitter_url: String,
    pub twitter_username: String,
    pub twitter_bearer_token: String,
    pub quotes_url: String,
    pub quotes_api_key: String,
    /// Comma-separated slugs requested in the single batch quote call.
    pub quote_slugs: String,
    /// Quote id rendered on the primary price row.
    pub primary_quote_id: String,
    /// Quote id rendered on the secondary price row.
    pub secondary_quote_id: String,
    pub quote_currency: String,
}

/// Recurring full-refresh windows: minute 0 of every hour in
/// `first_hour..=last_hour` on the listed ISO weekdays (1 = Monday).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub first_hour: u32,
    pub last_hour: u32,
    pub weekdays: Vec<u32>,
    pub utc_offset_minutes: i32,
}

/// Grid rendering behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BoardConfig {
    /// Clear the value field of a row before writing a new value. Off keeps the
    /// legacy behavior where a shorter value leaves older codes to its left.
    pub clear_stale_cells: bool,
    /// Paint the row labels (`height:`, `status:`, ...) into the initial grid.
    pub labels: bool,
}

/// Shared HTTP client knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Filesystem paths used by sfb.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

fn mask(secret: &str) -> &str {
    if secret.is_empty() {
        ""
    } else {
        REDACTED
    }
}

impl fmt::Debug for DisplayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayConfig")
            .field("base_url", &self.base_url)
            .field("subscription_id", &self.subscription_id)
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &mask(&self.api_secret))
            .finish()
    }
}

impl fmt::Debug for SourcesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourcesConfig")
            .field("chain_status_url", &self.chain_status_url)
            .field("pools_url", &self.pools_url)
            .field("twitter_url", &self.twitter_url)
            .field("twitter_username", &self.twitter_username)
            .field("twitter_bearer_token", &mask(&self.twitter_bearer_token))
            .field("quotes_url", &self.quotes_url)
            .field("quotes_api_key", &mask(&self.quotes_api_key))
            .field("quote_slugs", &self.quote_slugs)
            .field("primary_quote_id", &self.primary_quote_id)
            .field("secondary_quote_id", &self.secondary_quote_id)
            .field("quote_currency", &self.quote_currency)
            .finish()
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://platform.vestaboard.com".to_string(),
            subscription_id: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            subscribe_event: "status".to_string(),
            reconnect_initial_ms: 1_000,
            reconnect_max_ms: 60_000,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            chain_status_url: "https://rpc.korellia.kyve.network/status".to_string(),
            pools_url: "https://api.korellia.kyve.network/kyve/registry/v1beta1/pools"
                .to_string(),
            twitter_url: "https://api.twitter.com".to_string(),
            twitter_username: "KYVENetwork".to_string(),
            twitter_bearer_token: String::new(),
            quotes_url: "https://pro-api.coinmarketcap.com".to_string(),
            quotes_api_key: String::new(),
            quote_slugs: "bitcoin,arweave".to_string(),
            primary_quote_id: "1".to_string(),
            secondary_quote_id: "5632".to_string(),
            quote_currency: "USD".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_hour: 7,
            last_hour: 15,
            weekdays: vec![1, 3, 5],
            utc_offset_minutes: 0,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            clear_stale_cells: false,
            labels: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: format!("sfb/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[SFB-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("sfb").join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("sfb")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SfbError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SfbError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_urls();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Copy of the config with every non-empty secret replaced by a marker.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        for secret in [
            &mut cfg.display.api_key,
            &mut cfg.display.api_secret,
            &mut cfg.sources.twitter_bearer_token,
            &mut cfg.sources.quotes_api_key,
        ] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        cfg
    }

    /// Extra checks that only matter when the daemon will actually write to
    /// the display and listen to the feed.
    pub fn validate_for_daemon(&self) -> Result<()> {
        self.validate_display_credentials()?;
        if self.feed.enabled && self.feed.url.trim().is_empty() {
            return Err(SfbError::InvalidConfig {
                details: "feed.url is required when feed.enabled=true (or set SFB_FEED_ENABLED=false)"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Credentials needed for any display write.
    pub fn validate_display_credentials(&self) -> Result<()> {
        for (name, value) in [
            ("display.base_url", &self.display.base_url),
            ("display.subscription_id", &self.display.subscription_id),
            ("display.api_key", &self.display.api_key),
            ("display.api_secret", &self.display.api_secret),
        ] {
            if value.trim().is_empty() {
                return Err(SfbError::InvalidConfig {
                    details: format!("{name} must be set to write to the display"),
                });
            }
        }
        Ok(())
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // display
        set_string(&mut lookup, "SFB_DISPLAY_BASE_URL", &mut self.display.base_url);
        set_string(
            &mut lookup,
            "SFB_DISPLAY_SUBSCRIPTION_ID",
            &mut self.display.subscription_id,
        );
        set_string(&mut lookup, "SFB_DISPLAY_API_KEY", &mut self.display.api_key);
        set_string(
            &mut lookup,
            "SFB_DISPLAY_API_SECRET",
            &mut self.display.api_secret,
        );

        // feed
        set_bool(&mut lookup, "SFB_FEED_ENABLED", &mut self.feed.enabled)?;
        set_string(&mut lookup, "SFB_FEED_URL", &mut self.feed.url);
        set_u64(
            &mut lookup,
            "SFB_FEED_RECONNECT_INITIAL_MS",
            &mut self.feed.reconnect_initial_ms,
        )?;
        set_u64(
            &mut lookup,
            "SFB_FEED_RECONNECT_MAX_MS",
            &mut self.feed.reconnect_max_ms,
        )?;

        // sources
        set_string(
            &mut lookup,
            "SFB_SOURCES_CHAIN_STATUS_URL",
            &mut self.sources.chain_status_url,
        );
        set_string(&mut lookup, "SFB_SOURCES_POOLS_URL", &mut self.sources.pools_url);
        set_string(
            &mut lookup,
            "SFB_SOURCES_TWITTER_URL",
            &mut self.sources.twitter_url,
        );
        set_string(
            &mut lookup,
            "SFB_SOURCES_TWITTER_USERNAME",
            &mut self.sources.twitter_username,
        );
        set_string(
            &mut lookup,
            "SFB_SOURCES_TWITTER_BEARER_TOKEN",
            &mut self.sources.twitter_bearer_token,
        );
        set_string(&mut lookup, "SFB_SOURCES_QUOTES_URL", &mut self.sources.quotes_url);
        set_string(
            &mut lookup,
            "SFB_SOURCES_QUOTES_API_KEY",
            &mut self.sources.quotes_api_key,
        );

        // schedule
        set_bool(&mut lookup, "SFB_SCHEDULE_ENABLED", &mut self.schedule.enabled)?;
        if let Some(raw) = lookup("SFB_SCHEDULE_HOURS") {
            let (first, last) = parse_hour_range("SFB_SCHEDULE_HOURS", &raw)?;
            self.schedule.first_hour = first;
            self.schedule.last_hour = last;
        }
        if let Some(raw) = lookup("SFB_SCHEDULE_WEEKDAYS") {
            self.schedule.weekdays = parse_weekday_list("SFB_SCHEDULE_WEEKDAYS", &raw)?;
        }
        if let Some(raw) = lookup("SFB_SCHEDULE_UTC_OFFSET_MINUTES") {
            self.schedule.utc_offset_minutes =
                raw.trim().parse::<i32>().map_err(|error| SfbError::ConfigParse {
                    context: "env",
                    details: format!("SFB_SCHEDULE_UTC_OFFSET_MINUTES={raw:?}: {error}"),
                })?;
        }

        // board
        set_bool(
            &mut lookup,
            "SFB_BOARD_CLEAR_STALE_CELLS",
            &mut self.board.clear_stale_cells,
        )?;

        // http
        set_u64(&mut lookup, "SFB_HTTP_TIMEOUT_SECS", &mut self.http.timeout_secs)?;

        // paths
        if let Some(raw) = lookup("SFB_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Strip trailing slashes from base URLs that get paths appended.
    fn normalize_urls(&mut self) {
        for url in [
            &mut self.display.base_url,
            &mut self.sources.twitter_url,
            &mut self.sources.quotes_url,
        ] {
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }
    }

    fn validate(&self) -> Result<()> {
        let sched = &self.schedule;
        if sched.first_hour > 23 || sched.last_hour > 23 {
            return Err(SfbError::InvalidConfig {
                details: format!(
                    "schedule hours must be in [0, 23], got {}-{}",
                    sched.first_hour, sched.last_hour
                ),
            });
        }
        if sched.first_hour > sched.last_hour {
            return Err(SfbError::InvalidConfig {
                details: format!(
                    "schedule.first_hour ({}) must be <= schedule.last_hour ({})",
                    sched.first_hour, sched.last_hour
                ),
            });
        }
        if sched.enabled && sched.weekdays.is_empty() {
            return Err(SfbError::InvalidConfig {
                details: "schedule.weekdays must not be empty when the schedule is enabled"
                    .to_string(),
            });
        }
        if let Some(day) = sched.weekdays.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(SfbError::InvalidConfig {
                details: format!("schedule.weekdays entries must be in [1, 7], got {day}"),
            });
        }
        // FixedOffset accepts strictly less than one day either way.
        if sched.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(SfbError::InvalidConfig {
                details: format!(
                    "schedule.utc_offset_minutes must be within +/-1439, got {}",
                    sched.utc_offset_minutes
                ),
            });
        }

        if self.http.timeout_secs == 0 {
            return Err(SfbError::InvalidConfig {
                details: "http.timeout_secs must be > 0".to_string(),
            });
        }

        if self.feed.reconnect_initial_ms == 0
            || self.feed.reconnect_initial_ms > self.feed.reconnect_max_ms
        {
            return Err(SfbError::InvalidConfig {
                details: "feed reconnect delays must satisfy 0 < reconnect_initial_ms <= reconnect_max_ms"
                    .to_string(),
            });
        }

        if self.sources.primary_quote_id == self.sources.secondary_quote_id {
            return Err(SfbError::InvalidConfig {
                details: "sources.primary_quote_id and secondary_quote_id must differ".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_string<F>(lookup: &mut F, name: &str, slot: &mut String)
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw;
    }
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<u64>().map_err(|error| SfbError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<bool>().map_err(|error| SfbError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

/// Parse `"7-15"` (or a single hour `"9"`) into an inclusive range.
fn parse_hour_range(name: &str, raw: &str) -> Result<(u32, u32)> {
    let parse = |part: &str| {
        part.trim().parse::<u32>().map_err(|error| SfbError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
    };
    match raw.split_once('-') {
        Some((first, last)) => Ok((parse(first)?, parse(last)?)),
        None => {
            let hour = parse(raw)?;
            Ok((hour, hour))
        }
    }
}

/// Parse `"1,3,5"` into ISO weekday numbers.
fn parse_weekday_list(name: &str, raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.trim().parse::<u32>().map_err(|error| SfbError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })
        })
        .collect()
}
