//! BoxController handlers

use super::validate_name;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::scheduler::TriggerReason;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use box_controller::{Action, ParentStore};
use box_types::{BoxController, Identity, ObjectKey};
use serde::{Deserialize, Serialize};

/// Create or update request
#[derive(Debug, Deserialize)]
pub struct ApplyBoxControllerRequest {
    pub replicas: u32,
}

/// Result of a manual reconcile
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub key: String,
    pub desired: u32,
    pub live: usize,
    pub created: Vec<Identity>,
    pub removed: Vec<String>,
    pub failed_creates: usize,
    pub failed_removes: usize,
    pub status_persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requeue_after_secs: Option<u64>,
}

impl ReconcileResponse {
    fn from_action(key: &ObjectKey, action: Action) -> Self {
        let summary = action.summary;
        Self {
            key: key.to_string(),
            desired: summary.desired,
            live: summary.live,
            created: summary.created,
            removed: summary.removed,
            failed_creates: summary.failed_creates,
            failed_removes: summary.failed_removes,
            status_persisted: summary.status_persisted,
            requeue_after_secs: action.requeue_after.map(|d| d.as_secs()),
        }
    }
}

fn parse_key(namespace: &str, name: &str) -> ApiResult<ObjectKey> {
    validate_name("namespace", namespace)?;
    validate_name("name", name)?;
    Ok(ObjectKey::new(namespace, name))
}

/// List all BoxControllers
pub async fn list_boxcontrollers(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<BoxController>>> {
    let parents = state.cluster.list_parents().await?;
    Ok(Json(parents))
}

/// Get a BoxController with its status
pub async fn get_boxcontroller(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<BoxController>> {
    let key = parse_key(&namespace, &name)?;
    let parent = state
        .cluster
        .get_parent(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("BoxController {}", key)))?;

    Ok(Json(parent))
}

/// Create a BoxController or change its replica count
pub async fn apply_boxcontroller(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    payload: Result<Json<ApplyBoxControllerRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BoxController>)> {
    let key = parse_key(&namespace, &name)?;
    let Json(request) = payload?;
    if request.replicas > state.max_replicas {
        return Err(ApiError::Validation(format!(
            "replicas {} exceeds the limit of {}",
            request.replicas, state.max_replicas
        )));
    }
    let existed = state.cluster.get_parent(&key).await?.is_some();

    let stored = state
        .cluster
        .apply_parent(BoxController::new(namespace, name, request.replicas))
        .await;

    tracing::info!(key = %key, replicas = request.replicas, "BoxController applied");

    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(stored)))
}

/// Delete a BoxController and the boxes it owns
pub async fn delete_boxcontroller(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let key = parse_key(&namespace, &name)?;

    if !state.cluster.delete_parent(&key).await {
        return Err(ApiError::NotFound(format!("BoxController {}", key)));
    }

    tracing::info!(key = %key, "BoxController deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Run a reconcile pass now and report what it did
pub async fn reconcile_boxcontroller(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<ReconcileResponse>> {
    let key = parse_key(&namespace, &name)?;

    if state.cluster.get_parent(&key).await?.is_none() {
        return Err(ApiError::NotFound(format!("BoxController {}", key)));
    }

    tracing::debug!(key = %key, reason = ?TriggerReason::Manual, "Manual reconcile requested");
    let action = state.scheduler.reconcile_now(&key).await?;

    Ok(Json(ReconcileResponse::from_action(&key, action)))
}
