//! REST handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::AppState;
use crate::core::{ExecutionRequest, ExecutionResult, PermissionProfile};
use crate::error::ScriptError;
use crate::languages::LanguageEntry;

/// Body of `GET /api/script/engine`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    pub languages: Vec<LanguageEntry>,
}

pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> (StatusCode, Json<ExecutionResult>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected execute request: {}", rejection.body_text());
            let result = ExecutionResult::error(rejection.body_text(), String::new(), 0);
            return (StatusCode::BAD_REQUEST, Json(result));
        }
    };

    let catalog = state.runner.catalog();
    if !catalog.is_available(&request.language) {
        let err = ScriptError::UnsupportedLanguage {
            language: request.language.clone(),
            available: catalog.languages(),
        };
        warn!("{}", err);
        let result = ExecutionResult::error(err.to_string(), String::new(), 0);
        return (StatusCode::BAD_REQUEST, Json(result));
    }

    info!(
        "Received execute request: language={}, entry_function={:?}",
        request.language,
        request.entry_function()
    );

    match state.runner.execute_async(request, None).await {
        Ok(result) => {
            info!(
                "Execute request completed: success={}, time_ms={}",
                result.success, result.execution_time_ms
            );
            (StatusCode::OK, Json(result))
        }
        Err(e) => {
            error!("Execute request failed: {}", e);
            let result = ExecutionResult::error(format!("Unexpected error: {}", e), String::new(), 0);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(result))
        }
    }
}

pub async fn languages(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.runner.catalog().languages())
}

pub async fn sandbox_permissions() -> Json<PermissionProfile> {
    Json(PermissionProfile::sandbox())
}

pub async fn permissive_permissions() -> Json<PermissionProfile> {
    Json(PermissionProfile::permissive())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP", "service": "script-execution" }))
}

pub async fn engine(State(state): State<AppState>) -> Json<EngineInfo> {
    let runner = &state.runner;
    Json(EngineInfo {
        name: runner.engine_name().to_string(),
        version: runner.engine_version().to_string(),
        languages: runner.catalog().entries(),
    })
}
