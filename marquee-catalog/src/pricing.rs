use serde::{Deserialize, Serialize};

use marquee_core::{PricingPolicy, Resource, TimeWindow};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Hourly resources are billed in whole increments of this many minutes.
    pub billing_increment_minutes: i64,

    /// Quotes are rounded half-up to a multiple of this (in cents).
    pub rounding_cents: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            billing_increment_minutes: 60,
            rounding_cents: 1,
        }
    }
}

/// Prices a window on a resource according to its policy.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Result<Self, PricingError> {
        if config.billing_increment_minutes <= 0 {
            return Err(PricingError::InvalidConfig(format!(
                "billing_increment_minutes must be positive, got {}",
                config.billing_increment_minutes
            )));
        }
        if config.rounding_cents <= 0 {
            return Err(PricingError::InvalidConfig(format!(
                "rounding_cents must be positive, got {}",
                config.rounding_cents
            )));
        }
        Ok(Self { config })
    }

    /// Number of billing increments charged for `window`, never below one.
    pub fn billed_increments(&self, window: &TimeWindow) -> i64 {
        let seconds = window.duration().num_seconds();
        let increment_seconds = self.config.billing_increment_minutes * 60;
        ((seconds + increment_seconds - 1) / increment_seconds).max(1)
    }

    /// Price of `window` on `resource` in the smallest currency unit.
    pub fn quote(&self, resource: &Resource, window: &TimeWindow) -> i64 {
        let raw = match resource.pricing {
            PricingPolicy::Flat { cents } => cents,
            PricingPolicy::Hourly { base_cents, hourly_cents } => {
                let billed_minutes = self.billed_increments(window) * self.config.billing_increment_minutes;
                // Integer half-up on the per-minute share of the hourly rate.
                base_cents + (hourly_cents * billed_minutes + 30) / 60
            }
        };
        self.round(raw.max(0))
    }

    fn round(&self, cents: i64) -> i64 {
        let step = self.config.rounding_cents;
        let remainder = cents % step;
        if remainder * 2 >= step {
            cents + (step - remainder)
        } else {
            cents - remainder
        }
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self { config: PricingConfig::default() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid pricing configuration: {0}")]
    InvalidConfig(String),
}

/// Formats cents as a decimal amount, e.g. `800` as `"8.00"`.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
