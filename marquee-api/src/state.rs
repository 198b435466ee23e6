use std::sync::Arc;

use marquee_core::reminder::ReminderStore;
use marquee_core::rewards::RewardPolicy;
use marquee_core::HoldError;
use marquee_hold::HoldManager;
use marquee_store::RedisClient;

use crate::error::AppError;
use crate::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub requests_per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<HoldManager>,
    pub reminders: Arc<dyn ReminderStore>,
    /// Absent when no Redis is configured; requests are then never throttled.
    pub rate_limit: Option<RateLimit>,
    pub metrics: Arc<ApiMetrics>,
    pub auth: AuthConfig,
    pub rewards: RewardPolicy,
}

impl AppState {
    /// Counts the refusal before handing it to the response mapper.
    pub fn refuse(&self, err: HoldError) -> AppError {
        self.metrics.record_rejection(err.code());
        AppError::from(err)
    }
}
