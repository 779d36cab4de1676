//! Health and status handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use crate::scheduler::SchedulerStats;
use axum::{extract::State, Json};
use box_controller::ParentStore;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub scheduler_running: bool,
    pub stats: DaemonStats,
}

/// Daemon statistics
#[derive(Debug, Serialize)]
pub struct DaemonStats {
    pub total_boxcontrollers: usize,
    pub desired_boxes: u64,
    pub tracked_boxes: usize,
    #[serde(flatten)]
    pub scheduler: SchedulerStats,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> ApiResult<Json<DaemonStatusResponse>> {
    let parents = state.cluster.list_parents().await?;
    let desired_boxes = parents.iter().map(|p| u64::from(p.replicas())).sum();
    let tracked_boxes = parents.iter().map(|p| p.status.pods.len()).sum();
    let scheduler_running = state.scheduler.is_running().await;

    Ok(Json(DaemonStatusResponse {
        status: if scheduler_running { "healthy" } else { "idle" }.to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        scheduler_running,
        stats: DaemonStats {
            total_boxcontrollers: parents.len(),
            desired_boxes,
            tracked_boxes,
            scheduler: state.scheduler.stats(),
        },
    }))
}
