use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const LOCAL_API_URL: &str = "http://localhost:8004";
const PRODUCTION_API_URL: &str = "https://taxibarsnz24.ru";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Host the client is served from; `localhost` selects the local backend.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_geocode_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_bid_window")]
    pub bid_window_secs: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_retry")]
    pub poll_retry_ms: u64,
    #[serde(default)]
    pub cancel_on_expiry: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_initial_check")]
    pub initial_check_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_max")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Offline backend used when `system.dry_run` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_bid_rate")]
    pub bid_rate: f64,
    #[serde(default = "default_max_bids")]
    pub max_bids: usize,
    #[serde(default = "default_accept_rate")]
    pub accept_rate: f64,
}

fn default_database_path() -> String { "taxi_client.db".to_string() }
fn default_host() -> String { "taxibarsnz24.ru".to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_geocoder_url() -> String { "https://nominatim.openstreetmap.org".to_string() }
fn default_user_agent() -> String { "TaxiOrderClient/0.1".to_string() }
fn default_geocode_ttl() -> u64 { 600 }
fn default_bid_window() -> u32 { 120 }
fn default_poll_interval() -> u64 { 2000 }
fn default_poll_retry() -> u64 { 3000 }
fn default_debounce() -> u64 { 100 }
fn default_heartbeat() -> u64 { 5000 }
fn default_initial_check() -> u64 { 300 }
fn default_history_max() -> usize { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_bid_rate() -> f64 { 0.35 }
fn default_max_bids() -> usize { 3 }
fn default_accept_rate() -> f64 { 0.90 }

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            database_path: default_database_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            cache_ttl_secs: default_geocode_ttl(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            bid_window_secs: default_bid_window(),
            poll_interval_ms: default_poll_interval(),
            poll_retry_ms: default_poll_retry(),
            cancel_on_expiry: false,
        }
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            heartbeat_ms: default_heartbeat(),
            initial_check_ms: default_initial_check(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: default_history_max() }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bid_rate: default_bid_rate(),
            max_bids: default_max_bids(),
            accept_rate: default_accept_rate(),
        }
    }
}

impl ApiConfig {
    /// Explicit override wins; otherwise the backend is picked by host.
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        if self.host == "localhost" {
            LOCAL_API_URL.to_string()
        } else {
            PRODUCTION_API_URL.to_string()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LifecycleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_retry(&self) -> Duration {
        Duration::from_millis(self.poll_retry_ms)
    }
}

impl FormConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn initial_check(&self) -> Duration {
        Duration::from_millis(self.initial_check_ms)
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub api_url: Option<String>,
    pub dry_run: Option<bool>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.api_url {
            self.api.base_url = Some(url.clone());
        }
        if let Some(dry_run) = env.dry_run {
            self.system.dry_run = dry_run;
        }
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let client_id = match std::env::var("TAXI_CLIENT_ID") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<i64>()
                    .with_context(|| format!("TAXI_CLIENT_ID is not a number: {}", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            client_id,
            client_name: std::env::var("TAXI_CLIENT_NAME").ok(),
            api_url: std::env::var("TAXI_API_URL").ok(),
            dry_run: std::env::var("DRY_RUN").ok().and_then(|v| v.parse().ok()),
        })
    }
}
