use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use marquee_core::repository::{HoldRepository, TransitionOutcome};
use marquee_core::{
    Clock, HoldError, HoldResult, HoldState, HoldTransition, ReservationHold, TimeWindow,
};

/// Postgres-backed holds.
///
/// Every mutation first takes `SELECT ... FOR UPDATE` on the resource row,
/// which serializes all writers of one resource for the length of the
/// transaction. Holds on different resources lock different rows.
pub struct StoreHoldRepository {
    pool: PgPool,
}

impl StoreHoldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const HOLD_COLUMNS: &str = "id, resource_id, owner_ref, window_start, window_end, price_cents, \
     currency, hold_expires_at, state, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    resource_id: String,
    owner_ref: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    price_cents: i64,
    currency: String,
    hold_expires_at: DateTime<Utc>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HoldRow> for ReservationHold {
    type Error = HoldError;

    fn try_from(row: HoldRow) -> Result<Self, Self::Error> {
        let state = HoldState::parse(&row.state).ok_or_else(|| {
            HoldError::Internal(format!("hold {} has unknown state {}", row.id, row.state))
        })?;
        let window = TimeWindow::new(row.window_start, row.window_end)
            .map_err(|e| HoldError::Internal(format!("hold {} has corrupt window: {}", row.id, e)))?;

        Ok(ReservationHold {
            hold_id: row.id,
            resource_id: row.resource_id,
            owner_ref: row.owner_ref,
            window,
            price_cents: row.price_cents,
            currency: row.currency,
            hold_expires_at: row.hold_expires_at,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn internal(e: sqlx::Error) -> HoldError {
    HoldError::Internal(e.to_string())
}

async fn lock_resource(tx: &mut Transaction<'_, Postgres>, resource_id: &str) -> HoldResult<bool> {
    let locked: Option<(String,)> =
        sqlx::query_as("SELECT id FROM resources WHERE id = $1 FOR UPDATE")
            .bind(resource_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(internal)?;
    Ok(locked.is_some())
}

#[async_trait]
impl HoldRepository for StoreHoldRepository {
    async fn insert_if_available(
        &self,
        hold: ReservationHold,
        now: DateTime<Utc>,
    ) -> HoldResult<ReservationHold> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        if !lock_resource(&mut tx, &hold.resource_id).await? {
            return Err(HoldError::ResourceNotFound(hold.resource_id.clone()));
        }

        // Same predicate as ReservationHold::blocks.
        let blocking: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM reservation_holds
            WHERE resource_id = $1
              AND window_start < $3
              AND $2 < window_end
              AND (state = 'CONFIRMED' OR (state = 'HELD' AND hold_expires_at > $4))
            LIMIT 1
            "#,
        )
        .bind(&hold.resource_id)
        .bind(hold.window.start())
        .bind(hold.window.end())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal)?;

        if let Some((blocking_id,)) = blocking {
            tracing::debug!("Hold on {} rejected, overlaps {}", hold.resource_id, blocking_id);
            return Err(HoldError::ResourceUnavailable(hold.resource_id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO reservation_holds
                (id, resource_id, owner_ref, window_start, window_end, price_cents,
                 currency, hold_expires_at, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(hold.hold_id)
        .bind(&hold.resource_id)
        .bind(&hold.owner_ref)
        .bind(hold.window.start())
        .bind(hold.window.end())
        .bind(hold.price_cents)
        .bind(&hold.currency)
        .bind(hold.hold_expires_at)
        .bind(hold.state.as_str())
        .bind(hold.created_at)
        .bind(hold.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;
        Ok(hold)
    }

    async fn get_hold(&self, hold_id: Uuid) -> HoldResult<Option<ReservationHold>> {
        let row: Option<HoldRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservation_holds WHERE id = $1",
            HOLD_COLUMNS
        ))
        .bind(hold_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.map(ReservationHold::try_from).transpose()
    }

    async fn apply_transition(
        &self,
        hold_id: Uuid,
        transition: HoldTransition,
        owner_ref: &str,
        clock: &dyn Clock,
    ) -> HoldResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let resource: Option<(String,)> =
            sqlx::query_as("SELECT resource_id FROM reservation_holds WHERE id = $1")
                .bind(hold_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?;
        let (resource_id,) = resource.ok_or_else(|| HoldError::HoldNotFound(hold_id.to_string()))?;

        lock_resource(&mut tx, &resource_id).await?;

        let row: HoldRow = sqlx::query_as(&format!(
            "SELECT {} FROM reservation_holds WHERE id = $1 FOR UPDATE",
            HOLD_COLUMNS
        ))
        .bind(hold_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(internal)?;

        // Read after both locks are held; the wait may have crossed the deadline.
        let outcome = TransitionOutcome::apply(row.try_into()?, transition, owner_ref, clock.now());

        if outcome.changed() {
            sqlx::query("UPDATE reservation_holds SET state = $2, updated_at = $3 WHERE id = $1")
                .bind(hold_id)
                .bind(outcome.hold.state.as_str())
                .bind(outcome.hold.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
        }

        tx.commit().await.map_err(internal)?;
        Ok(outcome)
    }

    async fn list_for_resource(&self, resource_id: &str) -> HoldResult<Vec<ReservationHold>> {
        let rows: Vec<HoldRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservation_holds WHERE resource_id = $1 ORDER BY window_start",
            HOLD_COLUMNS
        ))
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(ReservationHold::try_from).collect()
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> HoldResult<Vec<ReservationHold>> {
        // The row lock taken by UPDATE orders this against a concurrent
        // confirm; the state predicate is re-checked after the wait.
        let rows: Vec<HoldRow> = sqlx::query_as(&format!(
            "UPDATE reservation_holds SET state = 'EXPIRED', updated_at = $1 \
             WHERE state = 'HELD' AND hold_expires_at <= $1 RETURNING {}",
            HOLD_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(ReservationHold::try_from).collect()
    }
}
