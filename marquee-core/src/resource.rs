use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TimeWindow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceCategory {
    Parking,
    Seat,
}

impl ResourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Parking => "PARKING",
            ResourceCategory::Seat => "SEAT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PARKING" => Some(ResourceCategory::Parking),
            "SEAT" => Some(ResourceCategory::Seat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatTier {
    #[default]
    Standard,
    Premium,
}

/// How a window on a resource is priced, in the smallest currency unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingPolicy {
    /// One price for the whole window (a seat for a showtime).
    Flat { cents: i64 },
    /// Entry fee plus a rate per billed hour (a parking spot).
    Hourly { base_cents: i64, hourly_cents: i64 },
}

/// A bookable unit subject to the no-double-booking rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub location: String,
    pub category: ResourceCategory,
    #[serde(default)]
    pub showtime_id: Option<Uuid>,
    #[serde(default)]
    pub tier: SeatTier,
    /// Holds must fall entirely inside this window.
    pub horizon: TimeWindow,
    pub pricing: PricingPolicy,
}

/// Catalog listing entry for a requested window.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResourceSummary {
    pub id: String,
    pub name: String,
    pub location: String,
    pub category: ResourceCategory,
    pub showtime_id: Option<Uuid>,
    pub tier: SeatTier,
    pub available: bool,
    /// Absent when the window lies outside the resource's horizon.
    pub quoted_price_cents: Option<i64>,
}

impl ResourceSummary {
    pub fn new(resource: &Resource, available: bool, quoted_price_cents: Option<i64>) -> Self {
        Self {
            id: resource.id.clone(),
            name: resource.name.clone(),
            location: resource.location.clone(),
            category: resource.category,
            showtime_id: resource.showtime_id,
            tier: resource.tier,
            available,
            quoted_price_cents,
        }
    }
}
