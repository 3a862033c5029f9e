//! Authentication middleware and account handlers
//!
//! Bearer tokens are opaque session keys stored in the database; the
//! middleware resolves the `Authorization` header on every protected
//! request. Token issuance happens at login.

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use imt_common::auth::{generate_password, GENERATED_PASSWORD_LEN};

use crate::db::users::{self, UserPatch};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Authentication middleware for protected routes
///
/// Returns 401 when the bearer token is missing, unknown, expired, or
/// belongs to a deactivated account.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let user = users::session_user(&state.db, &token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    if !user.is_active {
        warn!(user_id = user.id, "deactivated account presented a valid token");
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let (user, token) = users::login(
        &state.db,
        &body.email,
        &body.password,
        state.config.session_ttl_secs,
    )
    .await
    .map_err(|e| match e {
        imt_common::Error::InvalidInput(msg) => ApiError::Unauthorized(msg),
        other => other.into(),
    })?;

    Ok(Json(json!({
        "access": token,
        "user": user,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
}

/// POST /auth/signup
///
/// Creates the account with a generated password. Credential mail is out
/// of scope, so the password is returned once in the response.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let password = generate_password(GENERATED_PASSWORD_LEN);
    let user = users::create(
        &state.db,
        &body.email,
        &password,
        body.full_name.as_deref(),
        body.role.as_deref(),
        body.department.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": user,
            "generated_password": password,
        })),
    ))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
    users::revoke_session(&state.db, &token).await?;

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// GET /auth/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let all = users::list_all(&state.db).await?;
    Ok(Json(json!(all)))
}

/// PUT /auth/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<UserPatch>,
) -> ApiResult<Json<Value>> {
    let user = users::update(&state.db, id, &patch).await?;
    Ok(Json(json!({
        "message": "User updated successfully",
        "user": user,
    })))
}

/// DELETE /auth/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    users::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub id: i64,
}

/// POST /auth/update_status
pub async fn toggle_user_status(
    State(state): State<AppState>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<Json<Value>> {
    let user = users::toggle_active(&state.db, body.id).await?;
    let verb = if user.is_active { "activated" } else { "deactivated" };

    Ok(Json(json!({
        "message": format!("User {} successfully", verb),
        "is_active": user.is_active,
    })))
}

/// GET /auth/statistics
pub async fn user_statistics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = users::statistics(&state.db).await?;
    Ok(Json(json!(stats)))
}
