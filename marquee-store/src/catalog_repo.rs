use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use marquee_core::repository::ResourceRepository;
use marquee_core::{
    HoldError, HoldResult, PricingPolicy, Resource, ResourceCategory, SeatTier, TimeWindow,
};

pub struct StoreResourceRepository {
    pool: PgPool,
}

impl StoreResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RESOURCE_COLUMNS: &str = "id, name, location, category, showtime_id, tier, \
     horizon_start, horizon_end, pricing_type, base_cents, rate_cents";

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: String,
    name: String,
    location: String,
    category: String,
    showtime_id: Option<Uuid>,
    tier: String,
    horizon_start: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
    pricing_type: String,
    base_cents: i64,
    rate_cents: i64,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = HoldError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        let category = ResourceCategory::parse(&row.category).ok_or_else(|| {
            HoldError::Internal(format!("resource {} has unknown category {}", row.id, row.category))
        })?;
        let tier = match row.tier.as_str() {
            "STANDARD" => SeatTier::Standard,
            "PREMIUM" => SeatTier::Premium,
            other => {
                return Err(HoldError::Internal(format!("resource {} has unknown tier {}", row.id, other)))
            }
        };
        let pricing = match row.pricing_type.as_str() {
            "FLAT" => PricingPolicy::Flat { cents: row.base_cents },
            "HOURLY" => PricingPolicy::Hourly {
                base_cents: row.base_cents,
                hourly_cents: row.rate_cents,
            },
            other => {
                return Err(HoldError::Internal(format!("resource {} has unknown pricing {}", row.id, other)))
            }
        };
        let horizon = TimeWindow::new(row.horizon_start, row.horizon_end)
            .map_err(|e| HoldError::Internal(format!("resource {} has corrupt horizon: {}", row.id, e)))?;

        Ok(Resource {
            id: row.id,
            name: row.name,
            location: row.location,
            category,
            showtime_id: row.showtime_id,
            tier,
            horizon,
            pricing,
        })
    }
}

fn pricing_columns(pricing: &PricingPolicy) -> (&'static str, i64, i64) {
    match *pricing {
        PricingPolicy::Flat { cents } => ("FLAT", cents, 0),
        PricingPolicy::Hourly { base_cents, hourly_cents } => ("HOURLY", base_cents, hourly_cents),
    }
}

fn tier_column(tier: SeatTier) -> &'static str {
    match tier {
        SeatTier::Standard => "STANDARD",
        SeatTier::Premium => "PREMIUM",
    }
}

fn internal(e: sqlx::Error) -> HoldError {
    HoldError::Internal(e.to_string())
}

#[async_trait]
impl ResourceRepository for StoreResourceRepository {
    async fn get_resource(&self, id: &str) -> HoldResult<Option<Resource>> {
        let row: Option<ResourceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM resources WHERE id = $1",
            RESOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.map(Resource::try_from).transpose()
    }

    async fn list_resources(
        &self,
        category: Option<ResourceCategory>,
    ) -> HoldResult<Vec<Resource>> {
        let rows: Vec<ResourceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM resources WHERE ($1::TEXT IS NULL OR category = $1) ORDER BY id",
            RESOURCE_COLUMNS
        ))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(Resource::try_from).collect()
    }

    async fn upsert_resource(&self, resource: &Resource) -> HoldResult<()> {
        let (pricing_type, base_cents, rate_cents) = pricing_columns(&resource.pricing);

        sqlx::query(
            r#"
            INSERT INTO resources
                (id, name, location, category, showtime_id, tier,
                 horizon_start, horizon_end, pricing_type, base_cents, rate_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                location = EXCLUDED.location,
                category = EXCLUDED.category,
                showtime_id = EXCLUDED.showtime_id,
                tier = EXCLUDED.tier,
                horizon_start = EXCLUDED.horizon_start,
                horizon_end = EXCLUDED.horizon_end,
                pricing_type = EXCLUDED.pricing_type,
                base_cents = EXCLUDED.base_cents,
                rate_cents = EXCLUDED.rate_cents
            "#,
        )
        .bind(&resource.id)
        .bind(&resource.name)
        .bind(&resource.location)
        .bind(resource.category.as_str())
        .bind(resource.showtime_id)
        .bind(tier_column(resource.tier))
        .bind(resource.horizon.start())
        .bind(resource.horizon.end())
        .bind(pricing_type)
        .bind(base_cents)
        .bind(rate_cents)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }
}
