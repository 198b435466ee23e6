use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::auth::{Claims, ROLE_CUSTOMER};
use crate::{error::AppError, state::AppState, state::AuthConfig};

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    owner_ref: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/guest", post(login_guest))
}

/// HS256 token for `sub` valid for the configured lifetime.
pub fn issue_token(auth: &AuthConfig, sub: &str, role: &str) -> Result<String, AppError> {
    let claims = Claims {
        sub: sub.to_owned(),
        role: role.to_owned(),
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let owner_ref = format!("guest-{}", Uuid::new_v4());
    let token = issue_token(&state.auth, &owner_ref, ROLE_CUSTOMER)?;

    tracing::debug!("Issued guest token for {}", owner_ref);
    Ok(Json(AuthResponse { token, owner_ref }))
}
