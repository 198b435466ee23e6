use std::collections::HashSet;

use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use marquee_core::{HoldState, ResourceCategory, SeatTier};

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SpinEligibilityRequest {
    /// Holds that make up one booking.
    pub reservation_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinEligibilityResponse {
    pub eligible: bool,
    pub premium_seats: usize,
    pub required_premium_seats: usize,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/rewards/spin-eligibility", post(spin_eligibility))
        .route_layer(axum::middleware::from_fn_with_state(state, customer_auth_middleware))
}

/// POST /v1/rewards/spin-eligibility
///
/// Only confirmed seat holds of the caller count towards the reward, and each
/// hold counts once however often it is listed.
async fn spin_eligibility(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SpinEligibilityRequest>,
) -> Result<Json<SpinEligibilityResponse>, AppError> {
    let mut seats = Vec::with_capacity(req.reservation_ids.len());
    let mut seen = HashSet::with_capacity(req.reservation_ids.len());

    for hold_id in req.reservation_ids {
        if !seen.insert(hold_id) {
            continue;
        }
        let hold = state
            .manager
            .get_hold(hold_id, &claims.sub)
            .await
            .map_err(|e| state.refuse(e))?;
        if hold.state != HoldState::Confirmed {
            continue;
        }

        let resource = state.manager.get_resource(&hold.resource_id).await?;
        if resource.category == ResourceCategory::Seat {
            seats.push(resource.tier);
        }
    }

    let premium_seats = seats.iter().filter(|tier| **tier == SeatTier::Premium).count();
    Ok(Json(SpinEligibilityResponse {
        eligible: state.rewards.spin_eligible(&seats),
        premium_seats,
        required_premium_seats: state.rewards.premium_seats_for_spin,
    }))
}
