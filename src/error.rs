use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::usage::UsageSnapshot;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{reason}")]
    QuotaExceeded {
        reason: String,
        usage: Box<UsageSnapshot>,
    },
    #[error("{0}")]
    Message(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(?self);
        match self {
            AppError::QuotaExceeded { reason, usage } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": reason,
                    "usage": *usage,
                    "upgrade": true,
                })),
            )
                .into_response(),
            other => {
                let status = match &other {
                    AppError::NotFound => StatusCode::NOT_FOUND,
                    AppError::Unauthorized => StatusCode::UNAUTHORIZED,
                    AppError::Forbidden => StatusCode::FORBIDDEN,
                    AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    AppError::Provider(_) => StatusCode::BAD_GATEWAY,
                    AppError::Db(_) | AppError::Message(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    AppError::QuotaExceeded { .. } => unreachable!(),
                };
                (status, Json(json!({ "error": other.to_string() }))).into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exceeded_maps_to_429() {
        let err = AppError::QuotaExceeded {
            reason: "Daily limit reached".into(),
            usage: Box::new(UsageSnapshot::no_plan()),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn provider_failure_maps_to_502() {
        let err = AppError::Provider("analysis timed out".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
