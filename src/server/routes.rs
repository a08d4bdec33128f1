use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::builtins;
use crate::models::{ModuleType, ProductionSummary};
use crate::server::AppState;
use crate::store::{AddOutcome, QueryFilter};

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
pub struct DependencyParams {
    #[serde(rename = "type")]
    pub module_type: Option<String>,
    #[serde(rename = "includeBuiltins")]
    pub include_builtins: Option<String>,
}

/// POST /monitor/dependency — external reporters (browser scripts, test
/// runners) submit an observed identifier. 201 when a new record landed,
/// 200 when it deduplicated or was filtered as a non-package path.
pub async fn report_dependency(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<ErrorResponse>)> {
    let parsed: Option<Value> = serde_json::from_slice(&body).ok();
    let package_name = parsed
        .as_ref()
        .and_then(|v| v.get("packageName"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let Some(package_name) = package_name else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid package name".to_string(),
            }),
        ));
    };

    let outcome = state.interceptor.observe(&package_name, "client-report").await;
    let status = match outcome {
        Some(AddOutcome::Added) => StatusCode::CREATED,
        _ => StatusCode::OK,
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "message": format!("Processed dependency: {package_name}"),
        })),
    ))
}

/// GET /monitor/health — in-memory tracking state, not a file read.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.interceptor.store().lock().await;
    Json(json!({
        "status": "running",
        "dependencies": store.tracked_names(),
        "count": store.tracked_count(),
        "builtinCount": builtins::NODE_BUILTINS.len(),
    }))
}

/// GET /monitor/dependencies — full or filtered inventory, grouped by type.
/// An unrecognized `type` value matches nothing, mirroring the equality
/// filter it maps to.
pub async fn dependencies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DependencyParams>,
) -> Json<Value> {
    let exclude_builtins = params.include_builtins.as_deref() == Some("false");

    let module_type = match params.module_type.as_deref() {
        Some(raw) => match ModuleType::from_str(raw) {
            Ok(module_type) => Some(module_type),
            Err(_) => {
                return Json(json!({
                    "total": 0,
                    "grouped": { "built_in": [], "third_party": [], "unresolved": [] },
                    "dependencies": [],
                }));
            }
        },
        None => None,
    };

    let store = state.interceptor.store().lock().await;
    let result = store.query(&QueryFilter {
        module_type,
        exclude_builtins,
    });
    Json(json!({
        "total": result.total,
        "grouped": result.grouped,
        "dependencies": result.dependencies,
    }))
}

/// GET /monitor/dependencies/context — inventory grouped by the
/// `detected_by` observation source.
pub async fn dependencies_by_context(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.interceptor.store().lock().await;
    let contexts = store.query_by_context();
    let total: usize = contexts.values().map(Vec::len).sum();
    Json(json!({
        "total": total,
        "contexts": contexts,
    }))
}

/// GET /monitor/production-dependencies — 404 until a production scan has
/// written its files.
pub async fn production_dependencies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    let modules_path = state.config.production_modules_path(&state.project_path);
    let summary_path = state.config.production_summary_path(&state.project_path);

    if !modules_path.exists() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Production scan has not been run yet".to_string(),
            }),
        ));
    }

    let read = |path: &std::path::Path| -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    };

    let modules = read(&modules_path).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to read production dependencies: {e}"),
            }),
        )
    })?;
    let summary: Option<ProductionSummary> = std::fs::read_to_string(&summary_path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok());

    Ok(Json(json!({
        "modules": modules,
        "summary": summary,
    })))
}

/// POST /monitor/run-tests — fire the configured out-of-process test script
/// and acknowledge immediately; the script's own requires are what the
/// monitor observes.
pub async fn run_tests(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    let command = state.config.test_command.clone();
    let Some((program, args)) = command.split_first() else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "No test command configured".to_string(),
            }),
        ));
    };

    let child = tokio::process::Command::new(program)
        .args(args)
        .current_dir(&state.project_path)
        .spawn()
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to start test runner: {e}"),
                }),
            )
        })?;

    let joined = command.join(" ");
    tokio::spawn(async move {
        let mut child = child;
        match child.wait().await {
            Ok(status) => tracing::info!("test runner `{joined}` exited with {status}"),
            Err(e) => tracing::warn!("test runner `{joined}` failed: {e}"),
        }
    });

    Ok(Json(json!({
        "success": true,
        "message": "Test runner started",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::config::Config;
    use crate::interceptor::Interceptor;
    use crate::store::DependencyStore;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    fn state_in(tmp: &TempDir) -> Arc<AppState> {
        let config = Config::default();
        let store = DependencyStore::initialize(config.store_path(tmp.path()));
        Arc::new(AppState {
            interceptor: Interceptor::new(
                Classifier::new(tmp.path(), Some("v20.0.0".to_string())),
                Arc::new(Mutex::new(store)),
            ),
            config,
            project_path: tmp.path().to_path_buf(),
        })
    }

    fn body_of(value: Value) -> axum::body::Bytes {
        axum::body::Bytes::from(serde_json::to_vec(&value).unwrap())
    }

    #[tokio::test]
    async fn test_report_dependency_status_codes() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);

        // Empty body → 400
        let err = report_dependency(State(state.clone()), axum::body::Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        // Non-string packageName → 400
        let err = report_dependency(State(state.clone()), body_of(json!({"packageName": 42})))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        // New name → 201
        let (status, _) =
            report_dependency(State(state.clone()), body_of(json!({"packageName": "axios"})))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        // Duplicate → 200
        let (status, _) =
            report_dependency(State(state.clone()), body_of(json!({"packageName": "axios"})))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::OK);

        // Relative path is filtered but handled → 200
        let (status, _) =
            report_dependency(State(state), body_of(json!({"packageName": "./local"})))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reflects_tracking_state() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);
        state.interceptor.observe("fs", "builtin-scan").await;
        state.interceptor.observe("lodash", "client-report").await;

        let Json(body) = health(State(state)).await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["count"], 2);
        assert_eq!(body["builtinCount"], builtins::NODE_BUILTINS.len());
        let names: Vec<&str> = body["dependencies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(names.contains(&"fs") && names.contains(&"lodash"));
    }

    #[tokio::test]
    async fn test_dependencies_filtering() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);
        state.interceptor.observe("fs", "builtin-scan").await;
        state.interceptor.observe("left-pad", "client-report").await;

        let Json(all) = dependencies(
            State(state.clone()),
            Query(DependencyParams {
                module_type: None,
                include_builtins: None,
            }),
        )
        .await;
        assert_eq!(all["total"], 2);

        let Json(builtins_only) = dependencies(
            State(state.clone()),
            Query(DependencyParams {
                module_type: Some("builtin".to_string()),
                include_builtins: None,
            }),
        )
        .await;
        assert_eq!(builtins_only["total"], 1);
        assert_eq!(builtins_only["dependencies"][0]["name"], "fs");

        let Json(no_builtins) = dependencies(
            State(state.clone()),
            Query(DependencyParams {
                module_type: None,
                include_builtins: Some("false".to_string()),
            }),
        )
        .await;
        assert_eq!(no_builtins["total"], 1);
        assert_eq!(no_builtins["grouped"]["built_in"].as_array().unwrap().len(), 0);

        // Unknown type matches nothing
        let Json(unknown) = dependencies(
            State(state),
            Query(DependencyParams {
                module_type: Some("native".to_string()),
                include_builtins: None,
            }),
        )
        .await;
        assert_eq!(unknown["total"], 0);
    }

    #[tokio::test]
    async fn test_dependencies_by_context() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);
        state.interceptor.observe("fs", "builtin-scan").await;
        state.interceptor.observe("axios", "client-report").await;

        let Json(body) = dependencies_by_context(State(state)).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["contexts"]["client-report"][0]["name"], "axios");
    }

    #[tokio::test]
    async fn test_production_dependencies_404_before_scan() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);
        let err = production_dependencies(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_production_dependencies_served_after_scan() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);
        std::fs::write(
            state.config.production_modules_path(tmp.path()),
            r#"[{"name": "./node_modules/react/index.js", "size": 6518}]"#,
        )
        .unwrap();

        let Json(body) = production_dependencies(State(state)).await.unwrap();
        assert_eq!(body["modules"][0]["size"], 6518);
        assert!(body["summary"].is_null());
    }
}
