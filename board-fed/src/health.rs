//! Health and readiness handlers.

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Liveness probe response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub fqdn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness probe response, with the storage pool's status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub fqdn: String,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Always 200 if the process is running; used as a Kubernetes liveness probe.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        fqdn: state.config().service.fqdn.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };
    (StatusCode::OK, Json(response))
}

/// 200 if the storage pool is connected and answers a trivial query, 503 otherwise.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let mut dependencies = HashMap::new();
    let mut ready = true;

    match state.pool().await {
        Some(pool) => match sqlx::query("SELECT 1").fetch_one(&pool).await {
            Ok(_) => {
                dependencies.insert(
                    "storage".to_string(),
                    DependencyStatus { healthy: true, message: Some("connected".to_string()) },
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "storage health check failed");
                ready = false;
                dependencies.insert(
                    "storage".to_string(),
                    DependencyStatus { healthy: false, message: Some(format!("query failed: {e}")) },
                );
            }
        },
        None => {
            ready = false;
            dependencies.insert(
                "storage".to_string(),
                DependencyStatus { healthy: false, message: Some("not connected yet".to_string()) },
            );
        }
    }

    let response = ReadinessResponse { ready, fqdn: state.config().service.fqdn.clone(), dependencies };
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(response))
}
