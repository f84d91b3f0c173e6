//! Route handlers. Each builds a [`RequestContext`] and calls one
//! orchestrator operation.

use super::AppState;
use super::error::ApiError;
use crate::context::RequestContext;
use crate::service::LoginResponse;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

type ApiResult<T> = Result<T, ApiError>;

/// Context for one inbound request.
fn context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let ctx = match headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        Some(id) => RequestContext::with_request_id(id),
        None => RequestContext::new(),
    };
    ctx.with_timeout(state.request_timeout)
        .with_cancellation(state.shutdown.child_token())
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ServiceTokenRequest {
    #[serde(default)]
    pub service_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct AccountIdResponse {
    pub account_id: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifiedResponse {
    pub verified: bool,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    state
        .service
        .register(&ctx, &req.username, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({}))))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    let login = state
        .service
        .login(&ctx, &req.username, &req.password)
        .await?;
    Ok(Json(login))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    state.service.logout(&ctx, &req.token).await?;
    Ok(Json(json!({})))
}

pub async fn check_access_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<AccountIdResponse>> {
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    let account_id = state.service.check_access_token(&ctx, &req.token).await?;
    Ok(Json(AccountIdResponse { account_id }))
}

pub async fn generate_service_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ServiceTokenRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    let token = state
        .service
        .generate_service_token(&ctx, &req.service_name)
        .await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn check_service_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<ValidResponse>> {
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    let valid = state.service.check_service_token(&ctx, &req.token).await?;
    Ok(Json(ValidResponse { valid }))
}

pub async fn get_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<RoleResponse>> {
    let Path(account_id) = path?;
    let ctx = context(&state, &headers);
    let role = state.service.get_role(&ctx, account_id).await?;
    Ok(Json(RoleResponse { role }))
}

pub async fn set_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<RoleRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Path(account_id) = path?;
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    state.service.set_role(&ctx, account_id, &req.role).await?;
    Ok(Json(json!({})))
}

/// Issue a code for a secondary identity.
///
/// The path id is the secondary identity the code vouches for, not an
/// account; an account redeems the code through `/accounts/:id/verify`.
pub async fn generate_auth_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<CodeResponse>> {
    let Path(identity_id) = path?;
    let ctx = context(&state, &headers);
    let code = state.service.generate_auth_code(&ctx, identity_id).await?;
    Ok(Json(CodeResponse { code }))
}

pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CodeRequest>, JsonRejection>,
) -> ApiResult<Json<VerifiedResponse>> {
    let Path(account_id) = path?;
    let Json(req) = body?;
    let ctx = context(&state, &headers);
    let verified = state.service.verify(&ctx, account_id, &req.code).await?;
    Ok(Json(VerifiedResponse { verified }))
}

/// Liveness plus an account store round trip.
pub async fn healthz(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = context(&state, &headers);
    let span = ctx.span().clone();
    match state.service.health(&ctx).instrument(span).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        ),
    }
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
pub async fn metrics() -> String {
    crate::metrics::gather_metrics()
}
