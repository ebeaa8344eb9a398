use axum::{extract::State, http::StatusCode, Json};
use ipolens_core::{LogAction, LogEntry};
use ipolens_store::NewLogEntry;
use serde::Deserialize;

use crate::{auth::AuthUser, error::ApiResult, AppState};

/// Last 1000 audit entries, newest first.
pub async fn list_logs(State(state): State<AppState>) -> ApiResult<Json<Vec<LogEntry>>> {
    let logs = state.store.recent_logs(1000).await?;
    Ok(Json(logs))
}

#[derive(Deserialize)]
pub struct AppendLogRequest {
    /// Clients may log before a session exists (e.g. LOGOUT after the
    /// token is dropped), so the username rides in the body.
    #[serde(default)]
    pub username: Option<String>,
    pub action: LogAction,
    pub details: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

pub async fn append_log(
    State(state): State<AppState>,
    Json(request): Json<AppendLogRequest>,
) -> ApiResult<(StatusCode, Json<LogEntry>)> {
    let entry = state
        .store
        .append_log(NewLogEntry {
            username: request
                .username
                .unwrap_or_else(|| "anonymous".to_string()),
            action: request.action,
            details: request.details,
            metadata: request.metadata,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Wipe the audit trail. Admin only.
pub async fn clear_logs(State(state): State<AppState>, caller: AuthUser) -> ApiResult<StatusCode> {
    if !caller.admin {
        return Err(crate::error::ApiError::Unauthorized(
            "admin access required".to_string(),
        ));
    }
    state.store.clear_logs().await?;
    Ok(StatusCode::NO_CONTENT)
}
