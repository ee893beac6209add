//! HTTP mapping of [`AppError`]. Every failure leaves as a status code and a
//! JSON `{ "error": … }` body.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tb_core::error::AppError;

#[derive(Debug)]
pub struct ApiError(pub AppError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::ValidationFailed(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(AppError::ValidationFailed(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::ValidationFailed(rejection.body_text()))
    }
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(..) => StatusCode::NOT_FOUND,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::Conflict(_) | AppError::AlreadyTriggered { .. } => StatusCode::CONFLICT,
        AppError::InvalidCredentials
        | AppError::InvalidToken
        | AppError::Expired
        | AppError::UnknownAccount => StatusCode::UNAUTHORIZED,
        AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::VoteNotMirrored { .. } | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                "internal error".to_string()
            }
            other if status.is_server_error() => {
                tracing::error!(error = %other, "request failed");
                other.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn statuses() {
        let id = Uuid::nil();
        let cases = [
            (AppError::ValidationFailed("x".into()), 400),
            (AppError::post_not_found(id), 404),
            (AppError::Forbidden("x".into()), 403),
            (AppError::Conflict("x".into()), 409),
            (AppError::AlreadyTriggered { post_id: id, threshold: 10 }, 409),
            (AppError::InvalidCredentials, 401),
            (AppError::Expired, 401),
            (AppError::UnknownAccount, 401),
            (AppError::StoreUnavailable("x".into()), 503),
            (
                AppError::VoteNotMirrored {
                    post_id: id,
                    account_id: id,
                    reason: "x".into(),
                },
                500,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(status_for(&err).as_u16(), code, "{err}");
        }
    }
}
