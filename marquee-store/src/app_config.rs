use serde::Deserialize;
use std::env;

use marquee_catalog::PricingConfig;
use marquee_core::rewards::RewardPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub holds: HoldRules,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub rewards: RewardPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldRules {
    #[serde(default = "default_hold_ttl")]
    pub hold_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for HoldRules {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: default_hold_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
            currency: default_currency(),
        }
    }
}

fn default_hold_ttl() -> u64 { 900 }
fn default_sweep_interval() -> u64 { 30 }
fn default_currency() -> String { "USD".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a URL the service keeps holds in memory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default)]
    pub run_migrations: bool,
}

/// Without a URL rate limiting is disabled.
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub requests_per_minute: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: None, requests_per_minute: default_rate_limit() }
    }
}

fn default_rate_limit() -> i64 { 100 }

/// Without brokers lifecycle events stay in-process.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// JSON array of resources upserted at start-up.
    pub seed_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReminderConfig {
    /// Reminders are mirrored here when set.
    pub snapshot_path: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `MARQUEE__HOLDS__HOLD_TTL_SECONDS=600`
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
