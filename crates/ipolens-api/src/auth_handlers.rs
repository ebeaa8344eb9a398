use axum::{extract::State, Json};
use ipolens_core::{IpoLensError, LogAction, User};
use ipolens_store::NewLogEntry;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{self, AuthUser},
    error::{ApiError, ApiResult},
    AppState,
};

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let hash = auth::hash_password(&request.password)?;
    let user = state.store.create_user(username, &hash).await?;
    let token = auth::issue_token(&state.auth, &user)?;

    info!(username, "account registered");

    Ok(Json(SessionResponse { user, token }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let stored_hash = state.store.password_hash(&request.username).await?;

    let valid = stored_hash
        .map(|hash| auth::verify_password(&request.password, &hash))
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let user = state
        .store
        .find_user(&request.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))?;
    let token = auth::issue_token(&state.auth, &user)?;

    state
        .store
        .append_log(NewLogEntry {
            username: user.username.clone(),
            action: LogAction::Login,
            details: format!("{} logged in", user.username),
            metadata: None,
        })
        .await?;

    Ok(Json(SessionResponse { user, token }))
}

pub async fn me(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<User>> {
    let user = state
        .store
        .find_user(&caller.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("user no longer exists".to_string()))?;
    Ok(Json(user))
}

/// Flip the caller to premium after the (simulated) payment succeeds.
pub async fn upgrade(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<User>> {
    // A live token whose account is gone is a session problem, not a 404.
    let user = match state.store.set_premium(&caller.username).await {
        Err(IpoLensError::NotFound(_)) => {
            return Err(ApiError::Unauthorized("user no longer exists".to_string()))
        }
        other => other?,
    };

    state
        .store
        .append_log(NewLogEntry {
            username: user.username.clone(),
            action: LogAction::UpgradeSuccess,
            details: format!("{} upgraded to premium", user.username),
            metadata: None,
        })
        .await?;

    info!(username = %user.username, "account upgraded to premium");

    Ok(Json(user))
}
