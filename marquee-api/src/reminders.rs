use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use uuid::Uuid;

use marquee_core::reminder::{NewReminder, Reminder};

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/reminders", get(list_reminders).post(add_reminder))
        .route("/v1/reminders/{id}", delete(remove_reminder))
        .route_layer(axum::middleware::from_fn_with_state(state, customer_auth_middleware))
}

async fn list_reminders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    Ok(Json(state.reminders.list(&claims.sub).await?))
}

async fn add_reminder(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewReminder>,
) -> Result<(StatusCode, Json<Reminder>), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::ValidationError("Reminder title must not be empty".to_string()));
    }

    let reminder = state.reminders.add(&claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

async fn remove_reminder(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reminder_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reminders.remove(&claims.sub, reminder_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
