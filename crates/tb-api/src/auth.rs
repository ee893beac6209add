//! Bearer-token helpers called at the top of handlers.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use tb_core::error::AppError;
use tb_core::models::Account;

use crate::error::ApiResult;
use crate::state::AppState;

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The live account behind the request's token.
pub async fn require_auth(state: &AppState, headers: &HeaderMap) -> ApiResult<Account> {
    let token = bearer(headers).ok_or(AppError::InvalidToken)?;
    Ok(state.services.auth.authenticate(token).await?)
}

/// Like [`require_auth`], but any failure just means anonymous.
pub async fn optional_auth(state: &AppState, headers: &HeaderMap) -> Option<Account> {
    state
        .services
        .auth
        .authenticate_optional(bearer(headers))
        .await
}
