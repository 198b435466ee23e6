use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::holds::HoldView;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminHoldView {
    #[serde(flatten)]
    pub hold: HoldView,
    pub owner_ref: String,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub expired: usize,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/resources/{id}/holds", get(list_resource_holds))
        .route("/v1/admin/holds/sweep", post(sweep_holds))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

// ============================================================================
// Moderation Handlers
// ============================================================================

/// GET /v1/admin/resources/{id}/holds
pub async fn list_resource_holds(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Json<Vec<AdminHoldView>>, AppError> {
    let resource = state.manager.get_resource(&resource_id).await?;
    let holds = state.manager.list_resource_holds(&resource_id).await?;

    Ok(Json(
        holds
            .iter()
            .map(|hold| AdminHoldView {
                hold: HoldView::new(hold, &resource),
                owner_ref: hold.owner_ref.clone(),
            })
            .collect(),
    ))
}

/// POST /v1/admin/holds/sweep
pub async fn sweep_holds(State(state): State<AppState>) -> Result<Json<SweepResponse>, AppError> {
    let expired = state.manager.sweep_expired().await?;
    info!("Manual sweep expired {} holds", expired);
    Ok(Json(SweepResponse { expired }))
}
