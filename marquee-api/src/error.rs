use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use marquee_core::reminder::ReminderError;
use marquee_core::HoldError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Hold(#[from] HoldError),
    #[error("{0}")]
    Reminder(#[from] ReminderError),
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    InternalServerError(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Hold(e) => match e {
                HoldError::ResourceUnavailable(_) => StatusCode::CONFLICT,
                HoldError::InvalidWindow(_) => StatusCode::UNPROCESSABLE_ENTITY,
                HoldError::ResourceNotFound(_) | HoldError::HoldNotFound(_) => StatusCode::NOT_FOUND,
                HoldError::HoldExpired(_) => StatusCode::GONE,
                HoldError::HoldNotOwned(_) => StatusCode::FORBIDDEN,
                HoldError::HoldAlreadyTerminal(..) => StatusCode::CONFLICT,
                HoldError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Reminder(ReminderError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Reminder(ReminderError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InternalServerError(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Hold(e) => e.code(),
            AppError::Reminder(ReminderError::NotFound(_)) => "REMINDER_NOT_FOUND",
            AppError::AuthenticationError(_) => "UNAUTHORIZED",
            AppError::AuthorizationError(_) => "FORBIDDEN",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Reminder(ReminderError::Persistence(_))
            | AppError::InternalServerError(_)
            | AppError::Anyhow(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
