//! # tb-api Handlers
//!
//! Thin adapters: authenticate, validate, call one service, serialize.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tb_core::error::AppError;
use tb_core::models::AccountSummary;
use tb_services::{
    DeletionReport, MilestoneRow, PostPage, PostView, PublicProfile, Session, TriggeredAction,
    VoteResult,
};
use uuid::Uuid;

use crate::auth::{optional_auth, require_auth};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation::{
    CreatePostRequest, ListParams, LoginRequest, RegisterRequest, TriggerRequest, VoteRequest,
};

type JsonBody<T> = Result<Json<T>, JsonRejection>;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => ApiError(AppError::Internal(format!("metrics encoding: {e}"))).into_response(),
    }
}

// ── Accounts ────────────────────────────────────────────────────────────────

pub async fn register(
    State(state): State<AppState>,
    payload: JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let Json(req) = payload?;
    let session = state.services.accounts.register(req.into_new_account()?).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: JsonBody<LoginRequest>,
) -> ApiResult<Json<Session>> {
    let Json(req) = payload?;
    let (handle, secret) = req.into_credentials()?;
    Ok(Json(state.services.accounts.login(&handle, &secret).await?))
}

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<AccountSummary>> {
    let account = require_auth(&state, &headers).await?;
    Ok(Json(AccountSummary::from(&account)))
}

pub async fn delete_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<DeletionReport>> {
    let account = require_auth(&state, &headers).await?;
    Ok(Json(state.services.accounts.delete_self(account.id).await?))
}

pub async fn profile(
    State(state): State<AppState>,
    handle: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<PublicProfile>> {
    let Path(handle) = handle?;
    let handle = crate::validation::handle(&handle)?;
    Ok(Json(state.services.accounts.profile(&handle).await?))
}

pub async fn delete_all_accounts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<DeletionReport>> {
    let caller = require_auth(&state, &headers).await?;
    Ok(Json(state.services.accounts.delete_all(&caller).await?))
}

// ── Posts ───────────────────────────────────────────────────────────────────

pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    let author = require_auth(&state, &headers).await?;
    let Json(req) = payload?;
    let post = state.services.posts.create(&author, req.into_new_post()?).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<PostPage>> {
    let Query(params) = params?;
    let viewer = optional_auth(&state, &headers).await;
    Ok(Json(
        state
            .services
            .posts
            .list(params.into(), viewer.as_ref())
            .await?,
    ))
}

pub async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PostView>> {
    let Path(id) = id?;
    let viewer = optional_auth(&state, &headers).await;
    Ok(Json(state.services.posts.get(id, viewer.as_ref()).await?))
}

// ── Votes & milestones ──────────────────────────────────────────────────────

pub async fn vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<VoteRequest>,
) -> ApiResult<Json<VoteResult>> {
    let voter = require_auth(&state, &headers).await?;
    let Json(req) = payload?;
    let (post_id, direction) = req.into_vote()?;
    let result = state
        .services
        .votes
        .apply_vote(voter.id, post_id, direction)
        .await?;
    state.metrics.record_vote(&result);
    Ok(Json(result))
}

pub async fn list_milestones(State(state): State<AppState>) -> ApiResult<Json<Vec<MilestoneRow>>> {
    Ok(Json(state.services.milestones.list().await?))
}

pub async fn trigger_milestone(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<TriggerRequest>,
) -> ApiResult<Json<TriggeredAction>> {
    let caller = require_auth(&state, &headers).await?;
    let Json(req) = payload?;
    let action = state
        .services
        .dispatcher
        .trigger(req.post_id, req.threshold, caller.is_admin())
        .await?;
    state.metrics.record_trigger();
    Ok(Json(action))
}
