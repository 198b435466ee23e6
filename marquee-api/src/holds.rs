use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use marquee_catalog::format_amount;
use marquee_core::countdown::{remaining_time, RemainingTime};
use marquee_core::{HoldState, ReservationHold, Resource, TimeWindow};

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, Claims};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Client-facing hold. Field names follow the booking app's JSON.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldView {
    pub reservation_id: Uuid,
    pub resource_id: String,
    pub resource_name: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: String,
    pub price_cents: i64,
    pub currency: String,
    pub hold_expires_at: DateTime<Utc>,
    pub state: HoldState,
}

impl HoldView {
    pub fn new(hold: &ReservationHold, resource: &Resource) -> Self {
        Self {
            reservation_id: hold.hold_id,
            resource_id: hold.resource_id.clone(),
            resource_name: resource.name.clone(),
            location: resource.location.clone(),
            start_time: hold.window.start(),
            end_time: hold.window.end(),
            price: format_amount(hold.price_cents),
            price_cents: hold.price_cents,
            currency: hold.currency.clone(),
            hold_expires_at: hold.hold_expires_at,
            state: hold.state,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Countdown {
    #[serde(flatten)]
    pub remaining: RemainingTime,
    pub display: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldDetail {
    #[serde(flatten)]
    pub hold: HoldView,
    /// Time left to confirm; only meaningful while `state` is `HELD`.
    pub expires_in: Countdown,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(create_hold))
        .route("/v1/holds/{id}", get(get_hold))
        .route("/v1/holds/{id}/confirm", post(confirm_hold))
        .route("/v1/holds/{id}/release", post(release_hold))
        .route_layer(axum::middleware::from_fn_with_state(state, customer_auth_middleware))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/holds
async fn create_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<HoldView>), AppError> {
    let window = TimeWindow::new(req.start_time, req.end_time).map_err(|e| state.refuse(e))?;

    let hold = state
        .manager
        .create_hold(&req.resource_id, window, &claims.sub)
        .await
        .map_err(|e| state.refuse(e))?;
    let resource = state.manager.get_resource(&hold.resource_id).await?;

    info!("Hold {} created on {} for {}", hold.hold_id, hold.resource_id, claims.sub);
    Ok((StatusCode::CREATED, Json(HoldView::new(&hold, &resource))))
}

/// GET /v1/holds/{id}
async fn get_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(hold_id): Path<Uuid>,
) -> Result<Json<HoldDetail>, AppError> {
    let hold = state
        .manager
        .get_hold(hold_id, &claims.sub)
        .await
        .map_err(|e| state.refuse(e))?;
    let resource = state.manager.get_resource(&hold.resource_id).await?;

    let remaining = remaining_time(state.manager.now(), hold.hold_expires_at);
    Ok(Json(HoldDetail {
        hold: HoldView::new(&hold, &resource),
        expires_in: Countdown {
            display: remaining.display(),
            remaining,
        },
    }))
}

/// POST /v1/holds/{id}/confirm
async fn confirm_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(hold_id): Path<Uuid>,
) -> Result<Json<HoldView>, AppError> {
    let hold = state
        .manager
        .confirm_hold(hold_id, &claims.sub)
        .await
        .map_err(|e| state.refuse(e))?;
    let resource = state.manager.get_resource(&hold.resource_id).await?;

    info!("Hold {} confirmed by {}", hold_id, claims.sub);
    Ok(Json(HoldView::new(&hold, &resource)))
}

/// POST /v1/holds/{id}/release
async fn release_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(hold_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .manager
        .release_hold(hold_id, &claims.sub)
        .await
        .map_err(|e| state.refuse(e))?;

    info!("Hold {} released by {}", hold_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
