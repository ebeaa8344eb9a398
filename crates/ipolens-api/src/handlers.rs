use axum::{extract::State, Json};
use chrono::Utc;
use ipolens_ai::{AnalysisRequest, AssistantRequest, ChatTurn};
use ipolens_core::{IpoAnalysis, IpoLensError, Language, LogAction};
use ipolens_store::NewLogEntry;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    AppState,
};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: option_env!("CARGO_PKG_VERSION")
            .unwrap_or("0.1.0")
            .to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub company_name: String,
    #[serde(default)]
    pub subscription_multiple: Option<String>,
    #[serde(default)]
    pub language: Language,
}

/// Run a full report synthesis for the caller. Enforces the free-tier
/// limit, persists the result, bumps the usage counter and writes the
/// audit trail.
pub async fn analyze(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<IpoAnalysis>> {
    if request.company_name.trim().is_empty() {
        return Err(ApiError::Validation("companyName is required".to_string()));
    }

    let user = state
        .store
        .find_user(&caller.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("user no longer exists".to_string()))?;

    if !user.is_premium && user.usage_count >= state.auth.free_analysis_limit {
        return Err(IpoLensError::UsageLimit.into());
    }

    state
        .store
        .append_log(NewLogEntry {
            username: user.username.clone(),
            action: LogAction::SearchAttempt,
            details: format!("Analysis requested for {}", request.company_name),
            metadata: request
                .subscription_multiple
                .as_ref()
                .map(|m| serde_json::json!({ "subscriptionMultiple": m })),
        })
        .await?;

    let engine_request = AnalysisRequest {
        company_name: request.company_name.clone(),
        subscription_multiple: request.subscription_multiple.clone(),
        language: request.language,
    };

    match state.engine.analyze(&engine_request).await {
        Ok(report) => {
            state
                .store
                .save_analysis(
                    &user.username,
                    &report,
                    request.subscription_multiple.as_deref(),
                )
                .await?;
            state.store.increment_usage(&user.username).await?;
            state
                .store
                .append_log(NewLogEntry {
                    username: user.username.clone(),
                    action: LogAction::SearchSuccess,
                    details: format!("Successfully analyzed {}", report.company_name),
                    metadata: None,
                })
                .await?;

            info!(
                username = %user.username,
                company = %report.company_name,
                "analysis complete"
            );

            Ok(Json(report))
        }
        Err(e) => {
            error!(username = %user.username, error = %e, "analysis failed");
            state
                .store
                .append_log(NewLogEntry {
                    username: user.username.clone(),
                    action: LogAction::SearchFailure,
                    details: format!("Analysis of {} failed: {}", request.company_name, e),
                    metadata: None,
                })
                .await?;
            Err(e.into())
        }
    }
}

/// Last 20 saved reports for the caller, newest first.
pub async fn history(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<IpoAnalysis>>> {
    let reports = state.store.history(&caller.username, 20).await?;
    Ok(Json(reports))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantApiRequest {
    pub company_name: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    pub message: String,
    #[serde(default)]
    pub language: Language,
}

#[derive(Serialize)]
pub struct AssistantResponse {
    pub reply: String,
}

/// Follow-up Q&A about a previously generated report.
pub async fn assistant(
    State(state): State<AppState>,
    _caller: AuthUser,
    Json(request): Json<AssistantApiRequest>,
) -> ApiResult<Json<AssistantResponse>> {
    let reply = state
        .engine
        .ask_assistant(&AssistantRequest {
            company_name: request.company_name,
            history: request.history,
            message: request.message,
            language: request.language,
        })
        .await?;

    Ok(Json(AssistantResponse { reply }))
}
