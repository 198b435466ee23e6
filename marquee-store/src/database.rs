use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use serde_json::Value;

use crate::app_config::HoldRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlays hold rules stored in `business_rules` on top of the file config.
    pub async fn fetch_hold_rules(&self, defaults: HoldRules) -> Result<HoldRules, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        Ok(apply_rule_overrides(defaults, rows))
    }
}

/// Expected row format: `{"value": <number/string>}`.
fn apply_rule_overrides(defaults: HoldRules, rows: Vec<(String, Value)>) -> HoldRules {
    let mut rules = defaults;

    for (key, value) in rows {
        let Some(v) = value.get("value") else {
            warn!("Ignoring business rule {} without a value", key);
            continue;
        };

        match key.as_str() {
            "hold_ttl_seconds" => {
                // Zero would produce holds that are born expired.
                if let Some(u) = v.as_u64().filter(|u| *u > 0) {
                    rules.hold_ttl_seconds = u;
                }
            }
            "sweep_interval_seconds" => {
                if let Some(u) = v.as_u64().filter(|u| *u > 0) {
                    rules.sweep_interval_seconds = u;
                }
            }
            "currency" => {
                if let Some(s) = v.as_str() {
                    rules.currency = s.to_string();
                }
            }
            _ => {}
        }
    }

    rules
}
